//! Radius-based spatial queries fanned out over reference geometries.
//!
//! One query is issued per reference geometry (or per layer for
//! [`ProximityQueryEngine::query_layers`]). Requests run concurrently up to
//! a configured limit, each under its own timeout and retry policy. The
//! batch is all-or-nothing: the first failure fails the call and no
//! partial collection is returned.

use std::time::Duration;

use futures::future::try_join_all;
use futures::{StreamExt, TryStreamExt, stream};
use infra_types::{FeatureCollection, Geometry};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{LayerError, QueryBatchError};
use crate::layer::{FeatureLayer, QuerySpec};
use crate::retry::RetryPolicy;

/// Radius of a location query when the caller does not supply one.
pub const DEFAULT_LOCATION_RADIUS_METERS: f64 = 100.0;

/// Proximity query settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProximityConfig {
    /// Upper bound on in-flight queries per batch.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    /// Deadline for a single query attempt, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retry policy for transient query failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

const fn default_max_concurrent_queries() -> usize {
    8
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: default_max_concurrent_queries(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Executes bounded, fail-fast proximity query batches.
#[derive(Debug, Clone, Copy)]
pub struct ProximityQueryEngine {
    max_concurrency: usize,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl Default for ProximityQueryEngine {
    fn default() -> Self {
        Self::new(&ProximityConfig::default())
    }
}

impl ProximityQueryEngine {
    /// Create an engine from configuration. A concurrency limit of zero is
    /// treated as one.
    pub fn new(config: &ProximityConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrent_queries.max(1),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            retry: config.retry,
        }
    }

    /// The query issued for one reference geometry: intersection within
    /// `radius_meters`, all fields, geometry included.
    pub fn proximity_query<L: FeatureLayer>(
        layer: &L,
        geometry: &Geometry,
        radius_meters: f64,
    ) -> QuerySpec {
        QuerySpec {
            geometry: Some(geometry.clone()),
            distance: Some(radius_meters),
            out_fields: vec![String::from("*")],
            return_geometry: true,
            ..layer.create_query()
        }
    }

    /// Features of `layer` within `radius_meters` of each reference
    /// geometry, concatenated in reference order.
    ///
    /// Matches are not deduplicated: a feature near two references appears
    /// twice.
    pub async fn query_near<L: FeatureLayer>(
        &self,
        references: &[Geometry],
        layer: &L,
        radius_meters: f64,
    ) -> Result<FeatureCollection, QueryBatchError> {
        debug!(
            layer = %layer.id(),
            references = references.len(),
            radius_meters,
            "proximity batch"
        );
        let queries: Vec<_> = references
            .iter()
            .enumerate()
            .map(|(index, geometry)| {
                let query = Self::proximity_query(layer, geometry, radius_meters);
                self.query_one(index, layer, query)
            })
            .collect();
        let parts: Vec<FeatureCollection> = stream::iter(queries)
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;
        let matches = FeatureCollection::concat(parts);
        if matches.exceeded_transfer_limit {
            warn!(
                layer = %layer.id(),
                matched = matches.len(),
                "proximity matches truncated by the service record limit"
            );
        }
        Ok(matches)
    }

    /// Query several layers around one point, one collection per layer in
    /// input order.
    pub async fn query_layers<L: FeatureLayer>(
        &self,
        point: &Geometry,
        layers: &[&L],
        radius_meters: Option<f64>,
    ) -> Result<Vec<FeatureCollection>, QueryBatchError> {
        let radius = radius_meters.unwrap_or(DEFAULT_LOCATION_RADIUS_METERS);
        try_join_all(layers.iter().enumerate().map(|(index, layer)| {
            let query = Self::proximity_query(*layer, point, radius);
            self.query_one(index, *layer, query)
        }))
        .await
    }

    async fn query_one<L: FeatureLayer>(
        &self,
        index: usize,
        layer: &L,
        query: QuerySpec,
    ) -> Result<FeatureCollection, QueryBatchError> {
        // An empty spatial filter would degrade into an unconditional query.
        if query.geometry.as_ref().is_some_and(Geometry::is_empty) {
            return Err(QueryBatchError {
                index,
                layer_id: layer.id().clone(),
                source: LayerError::InvalidQuery(String::from("empty reference geometry")),
            });
        }
        let timeout = self.request_timeout;
        let query = &query;
        self.retry
            .run(layer.id().as_str(), move || async move {
                tokio::time::timeout(timeout, layer.query_features(query))
                    .await
                    .map_err(|_elapsed| LayerError::Timeout(timeout))?
            })
            .await
            .map_err(|source| QueryBatchError {
                index,
                layer_id: layer.id().clone(),
                source,
            })
    }
}
