//! GeoJSON geometries and their Esri JSON request encoding.
//!
//! Feature services answer `f=geojson` queries with GeoJSON geometries,
//! but the `geometry` request parameter of a spatial query must be an
//! Esri JSON geometry with an explicit `geometryType`. [`Geometry::to_esri`]
//! performs that translation.

use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;

/// A coordinate tuple: `[x, y]` or `[x, y, z]`.
pub type Position = Vec<f64>;

/// A GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "bindings/")]
pub enum Geometry {
    /// A single position.
    Point {
        /// The position.
        coordinates: Position,
    },
    /// A set of positions.
    MultiPoint {
        /// The positions.
        coordinates: Vec<Position>,
    },
    /// A connected line.
    LineString {
        /// Vertices of the line.
        coordinates: Vec<Position>,
    },
    /// Several independent lines.
    MultiLineString {
        /// One vertex list per line.
        coordinates: Vec<Vec<Position>>,
    },
    /// A polygon made of an outer ring and optional holes.
    Polygon {
        /// Linear rings, outer ring first.
        coordinates: Vec<Vec<Position>>,
    },
    /// Several polygons.
    MultiPolygon {
        /// Rings per polygon.
        coordinates: Vec<Vec<Vec<Position>>>,
    },
}

/// An Esri JSON geometry ready to be sent as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct EsriGeometry {
    /// Value for the `geometryType` request parameter.
    pub geometry_type: &'static str,
    /// Value for the `geometry` request parameter.
    pub json: serde_json::Value,
}

impl Geometry {
    /// Convenience constructor for a 2D point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point {
            coordinates: vec![x, y],
        }
    }

    /// Returns true when the geometry carries no coordinates.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point { coordinates } => coordinates.len() < 2,
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                coordinates.is_empty()
            }
            Self::MultiLineString { coordinates } | Self::Polygon { coordinates } => {
                coordinates.iter().all(Vec::is_empty)
            }
            Self::MultiPolygon { coordinates } => coordinates
                .iter()
                .all(|polygon| polygon.iter().all(Vec::is_empty)),
        }
    }

    /// Encode the geometry as Esri JSON.
    ///
    /// Returns `None` for empty geometries, which cannot be used as a
    /// spatial filter.
    pub fn to_esri(&self) -> Option<EsriGeometry> {
        if self.is_empty() {
            return None;
        }
        let encoded = match self {
            Self::Point { coordinates } => {
                let x = coordinates.first()?;
                let y = coordinates.get(1)?;
                let mut point = json!({ "x": x, "y": y });
                if let (Some(z), Some(obj)) = (coordinates.get(2), point.as_object_mut()) {
                    obj.insert("z".to_owned(), json!(z));
                }
                EsriGeometry {
                    geometry_type: "esriGeometryPoint",
                    json: point,
                }
            }
            Self::MultiPoint { coordinates } => EsriGeometry {
                geometry_type: "esriGeometryMultipoint",
                json: json!({ "points": coordinates }),
            },
            Self::LineString { coordinates } => EsriGeometry {
                geometry_type: "esriGeometryPolyline",
                json: json!({ "paths": [coordinates] }),
            },
            Self::MultiLineString { coordinates } => EsriGeometry {
                geometry_type: "esriGeometryPolyline",
                json: json!({ "paths": coordinates }),
            },
            Self::Polygon { coordinates } => EsriGeometry {
                geometry_type: "esriGeometryPolygon",
                json: json!({ "rings": coordinates }),
            },
            // Esri polygons have no multi-part type; every ring of every
            // part goes into one flat ring list.
            Self::MultiPolygon { coordinates } => {
                let rings: Vec<&Vec<Position>> = coordinates.iter().flatten().collect();
                EsriGeometry {
                    geometry_type: "esriGeometryPolygon",
                    json: json!({ "rings": rings }),
                }
            }
        };
        Some(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_encodes_as_xy() {
        let esri = Geometry::point(190_694.9, 443_397.5).to_esri();
        let esri = esri.unwrap_or_else(|| EsriGeometry {
            geometry_type: "none",
            json: serde_json::Value::Null,
        });
        assert_eq!(esri.geometry_type, "esriGeometryPoint");
        assert_eq!(esri.json["x"], 190_694.9);
        assert_eq!(esri.json["y"], 443_397.5);
        assert!(esri.json.get("z").is_none());
    }

    #[test]
    fn point_keeps_elevation() {
        let geometry = Geometry::Point {
            coordinates: vec![1.0, 2.0, 3.5],
        };
        let esri = geometry.to_esri().map(|e| e.json).unwrap_or_default();
        assert_eq!(esri["z"], 3.5);
    }

    #[test]
    fn multipolygon_flattens_rings() {
        let square = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ];
        let geometry = Geometry::MultiPolygon {
            coordinates: vec![vec![square.clone()], vec![square]],
        };
        let esri = geometry.to_esri();
        assert_eq!(esri.as_ref().map(|e| e.geometry_type), Some("esriGeometryPolygon"));
        let rings = esri
            .and_then(|e| e.json["rings"].as_array().map(Vec::len))
            .unwrap_or_default();
        assert_eq!(rings, 2);
    }

    #[test]
    fn empty_geometry_has_no_encoding() {
        let geometry = Geometry::LineString {
            coordinates: Vec::new(),
        };
        assert!(geometry.is_empty());
        assert!(geometry.to_esri().is_none());
    }

    #[test]
    fn geojson_tag_roundtrip() {
        let raw = r#"{"type":"LineString","coordinates":[[0.0,0.0],[2.0,1.0]]}"#;
        let parsed: Result<Geometry, _> = serde_json::from_str(raw);
        assert!(matches!(parsed, Ok(Geometry::LineString { .. })));
    }
}
