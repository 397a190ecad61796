//! Layer capability interface consumed from the rendering collaborator.
//!
//! A [`FeatureLayer`] is anything that can answer feature queries and,
//! when editing is enabled, accept server-side edits. The HTTP-backed
//! implementation lives in `infra-client`; tests use in-memory layers.
//!
//! Async methods are declared with `impl Future` return types, so layers
//! are used through generics rather than trait objects.

use std::future::Future;

use infra_types::{FeatureCollection, FeatureRecord, Geometry, LayerId, LayerMetadata};
use serde::{Deserialize, Serialize};

use crate::error::LayerError;

/// A feature query against one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Attribute predicate.
    pub where_clause: String,
    /// Fields to return; `*` for all.
    pub out_fields: Vec<String>,
    /// Whether geometries are returned.
    pub return_geometry: bool,
    /// Spatial filter geometry.
    pub geometry: Option<Geometry>,
    /// Buffer distance around `geometry`, in meters. Features that
    /// intersect the buffered geometry match.
    pub distance: Option<f64>,
    /// Restrict to these object ids.
    pub object_ids: Vec<i64>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            where_clause: String::from("1=1"),
            out_fields: vec![String::from("*")],
            return_geometry: true,
            geometry: None,
            distance: None,
            object_ids: Vec::new(),
        }
    }
}

/// A server-side edit submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditBatch {
    /// Features to add.
    pub add_features: Vec<FeatureRecord>,
}

/// Outcome of a server-side edit submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditResult {
    /// Features the service accepted.
    pub added: usize,
    /// Features the service rejected.
    pub failed: usize,
}

/// Capabilities of a target or source layer.
pub trait FeatureLayer: Send + Sync {
    /// Layer id in the map configuration.
    fn id(&self) -> &LayerId;

    /// Display title.
    fn title(&self) -> &str;

    /// Whether the service accepts direct edits.
    fn editing_enabled(&self) -> bool;

    /// Rendering metadata copied into synthetic overlays.
    fn metadata(&self) -> &LayerMetadata;

    /// A query pre-populated with the layer's defaults.
    fn create_query(&self) -> QuerySpec {
        QuerySpec::default()
    }

    /// Run a feature query.
    fn query_features(
        &self,
        query: &QuerySpec,
    ) -> impl Future<Output = Result<FeatureCollection, LayerError>> + Send;

    /// Submit server-side edits.
    fn apply_edits(
        &self,
        edits: &EditBatch,
    ) -> impl Future<Output = Result<EditResult, LayerError>> + Send;
}
