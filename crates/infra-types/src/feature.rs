//! Feature records and feature collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::geometry::Geometry;

/// A single feature: geometry, attribute map and identity.
///
/// Deserializes both GeoJSON features (`properties`) and Esri JSON
/// features (`attributes`); always serializes as `properties`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FeatureRecord {
    /// Feature id as reported by the service, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The feature geometry (`null` for attribute-only rows).
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Field name to value.
    #[serde(default, rename = "properties", alias = "attributes")]
    pub attributes: BTreeMap<String, Value>,
}

impl FeatureRecord {
    /// Create a feature with a geometry and no attributes.
    pub fn with_geometry(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            attributes: BTreeMap::new(),
        }
    }

    /// Identity of the feature under the given object id field.
    ///
    /// Falls back to the GeoJSON feature `id` when the attribute is absent.
    pub fn object_id(&self, object_id_field: &str) -> Option<i64> {
        self.attributes
            .get(object_id_field)
            .and_then(Value::as_i64)
            .or(self.id)
    }

    /// Set (or replace) one attribute.
    pub fn set_attribute(&mut self, field: &str, value: Value) {
        self.attributes.insert(field.to_owned(), value);
    }
}

/// An ordered snapshot of features produced by one extraction or query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FeatureCollection {
    /// The features, in service order.
    pub features: Vec<FeatureRecord>,
    /// True when the service cut the result short and more records
    /// remain at a higher offset.
    #[serde(default, rename = "exceededTransferLimit")]
    pub exceeded_transfer_limit: bool,
}

impl FeatureCollection {
    /// Create a complete (non-truncated) collection.
    pub const fn new(features: Vec<FeatureRecord>) -> Self {
        Self {
            features,
            exceeded_transfer_limit: false,
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true when the collection holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Concatenate several collections, preserving their order.
    ///
    /// The result is truncated when any part is.
    pub fn concat(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut joined = Self::default();
        for part in parts {
            joined.exceeded_transfer_limit |= part.exceeded_transfer_limit;
            joined.features.extend(part.features);
        }
        joined
    }

    /// Render as a GeoJSON `FeatureCollection` document.
    pub fn to_geojson(&self) -> Result<Value, serde_json::Error> {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let mut value = serde_json::to_value(feature)?;
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("type".to_owned(), Value::from("Feature"));
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        Ok(serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
        }))
    }
}
