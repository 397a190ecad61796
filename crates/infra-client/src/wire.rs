//! Request parameters and response decoding for the feature service REST
//! protocol.
//!
//! Everything here is pure: no I/O, so the protocol details can be tested
//! without a server.

use infra_core::{EditResult, QuerySpec};
use infra_types::{FeatureCollection, FeatureRecord, FieldInfo, LayerDescriptor, LayerMetadata};
use serde_json::{Value, json};

use crate::error::ClientError;

/// Spatial reference of GeoJSON coordinates.
pub const WGS84_WKID: u32 = 4326;

/// Fallback identity field when a layer does not report one.
const DEFAULT_OBJECT_ID_FIELD: &str = "OBJECTID";

/// Append `/query` to a layer URL unless it already ends with it.
pub fn query_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/query") {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/query")
    }
}

/// Strip a trailing `/query` to get the layer URL.
pub fn layer_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix("/query")
        .unwrap_or(trimmed)
        .to_owned()
}

/// Parameters of one extraction page: all fields, unconditional
/// predicate, GeoJSON output.
pub fn page_params(offset: u64) -> Vec<(&'static str, String)> {
    vec![
        ("outFields", String::from("*")),
        ("where", String::from("1=1")),
        ("f", String::from("geojson")),
        ("resultOffset", offset.to_string()),
    ]
}

/// Spatial relationship of every proximity query.
const SPATIAL_REL_INTERSECTS: &str = "esriSpatialRelIntersects";

/// Unit of every buffer distance.
const UNITS_METERS: &str = "esriSRUnit_Meter";

/// Parameters of a feature query. Output is always GeoJSON.
///
/// A spatial filter whose geometry cannot be encoded is an error, so a
/// query never silently widens to the whole layer.
pub fn query_params(url: &str, query: &QuerySpec) -> Result<Vec<(&'static str, String)>, ClientError> {
    let mut params = vec![
        ("where", query.where_clause.clone()),
        ("outFields", query.out_fields.join(",")),
        ("returnGeometry", query.return_geometry.to_string()),
        ("f", String::from("geojson")),
    ];

    if let Some(geometry) = &query.geometry {
        let esri = geometry.to_esri().ok_or_else(|| ClientError::InvalidQuery {
            url: url.to_owned(),
            message: String::from("spatial filter geometry is empty"),
        })?;
        params.push(("geometry", esri.json.to_string()));
        params.push(("geometryType", esri.geometry_type.to_owned()));
        params.push(("inSR", WGS84_WKID.to_string()));
        params.push(("spatialRel", SPATIAL_REL_INTERSECTS.to_owned()));
        if let Some(distance) = query.distance {
            params.push(("distance", distance.to_string()));
            params.push(("units", UNITS_METERS.to_owned()));
        }
    }

    if !query.object_ids.is_empty() {
        let ids: Vec<String> = query.object_ids.iter().map(ToString::to_string).collect();
        params.push(("objectIds", ids.join(",")));
    }

    Ok(params)
}

/// Fail when the body carries a non-empty `error` object.
fn check_embedded_error(url: &str, body: &Value) -> Result<(), ClientError> {
    match body.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Object(map)) if map.is_empty() => Ok(()),
        Some(error) => Err(ClientError::Upstream {
            url: url.to_owned(),
            payload: error.to_string(),
        }),
    }
}

/// Decode a GeoJSON query response.
///
/// The truncation flag is read from the top level or from `properties`,
/// where some servers put it.
pub fn parse_query_response(url: &str, body: Value) -> Result<FeatureCollection, ClientError> {
    check_embedded_error(url, &body)?;

    let truncated = body
        .get("exceededTransferLimit")
        .or_else(|| body.pointer("/properties/exceededTransferLimit"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let Some(Value::Array(raw)) = body.get("features") else {
        return Err(ClientError::Decode {
            url: url.to_owned(),
            message: String::from("missing features array"),
        });
    };

    let features = raw
        .iter()
        .cloned()
        .map(serde_json::from_value::<FeatureRecord>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::Decode {
            url: url.to_owned(),
            message: format!("invalid feature: {e}"),
        })?;

    Ok(FeatureCollection {
        features,
        exceeded_transfer_limit: truncated,
    })
}

/// Encode a feature as an Esri JSON feature for `applyEdits`.
pub fn esri_feature(feature: &FeatureRecord) -> Value {
    let geometry = feature
        .geometry
        .as_ref()
        .and_then(|g| g.to_esri())
        .map(|esri| {
            let mut json = esri.json;
            if let Some(obj) = json.as_object_mut() {
                obj.insert(
                    String::from("spatialReference"),
                    json!({ "wkid": WGS84_WKID }),
                );
            }
            json
        });
    json!({
        "geometry": geometry,
        "attributes": feature.attributes,
    })
}

/// Decode an `applyEdits` response into accepted and rejected counts.
pub fn parse_edit_response(url: &str, body: &Value) -> Result<EditResult, ClientError> {
    check_embedded_error(url, body)?;
    let Some(results) = body.get("addResults").and_then(Value::as_array) else {
        return Err(ClientError::Decode {
            url: url.to_owned(),
            message: String::from("missing addResults array"),
        });
    };
    let added = results
        .iter()
        .filter(|r| r.get("success").and_then(Value::as_bool) == Some(true))
        .count();
    Ok(EditResult {
        added,
        failed: results.len().saturating_sub(added),
    })
}

/// Decode the `layers` list of a map-image service info document.
pub fn parse_service_info(url: &str, body: &Value) -> Result<Vec<LayerDescriptor>, ClientError> {
    check_embedded_error(url, body)?;
    let Some(layers) = body.get("layers") else {
        return Err(ClientError::Decode {
            url: url.to_owned(),
            message: String::from("missing layers array"),
        });
    };
    serde_json::from_value(layers.clone()).map_err(|e| ClientError::Decode {
        url: url.to_owned(),
        message: format!("invalid sublayer descriptor: {e}"),
    })
}

/// Decode the rendering metadata of a feature layer info document.
pub fn parse_layer_metadata(url: &str, body: &Value) -> Result<LayerMetadata, ClientError> {
    check_embedded_error(url, body)?;
    let fields: Vec<FieldInfo> = match body.get("fields") {
        Some(raw) if !raw.is_null() => {
            serde_json::from_value(raw.clone()).map_err(|e| ClientError::Decode {
                url: url.to_owned(),
                message: format!("invalid field list: {e}"),
            })?
        }
        _ => Vec::new(),
    };
    let object_id_field = body
        .get("objectIdField")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| {
            fields
                .iter()
                .find(|f| f.field_type == "esriFieldTypeOID")
                .map(|f| f.name.clone())
        })
        .unwrap_or_else(|| String::from(DEFAULT_OBJECT_ID_FIELD));

    Ok(LayerMetadata {
        popup_template: body.get("popupInfo").filter(|v| !v.is_null()).cloned(),
        renderer: body.pointer("/drawingInfo/renderer").cloned(),
        object_id_field,
        fields,
        elevation_info: body
            .get("elevationInfo")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use infra_core::LayerError;
    use infra_types::Geometry;

    use super::*;

    const URL: &str = "https://example.org/arcgis/rest/services/Meldingen/FeatureServer/0/query";

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn query_suffix_is_appended_once() {
        let base = "https://example.org/arcgis/rest/services/Meldingen/FeatureServer/0";
        assert_eq!(query_url(base), format!("{base}/query"));
        assert_eq!(query_url(&format!("{base}/")), format!("{base}/query"));
        assert_eq!(query_url(&format!("{base}/query")), format!("{base}/query"));
        assert_eq!(layer_url(&format!("{base}/query")), base);
    }

    #[test]
    fn page_params_request_everything() {
        let params = page_params(2000);
        assert_eq!(param(&params, "outFields"), Some("*"));
        assert_eq!(param(&params, "where"), Some("1=1"));
        assert_eq!(param(&params, "f"), Some("geojson"));
        assert_eq!(param(&params, "resultOffset"), Some("2000"));
    }

    #[test]
    fn proximity_params_carry_esri_geometry() {
        let query = QuerySpec {
            geometry: Some(Geometry::point(5.9, 51.98)),
            distance: Some(20.0),
            ..QuerySpec::default()
        };
        let params = query_params(URL, &query).unwrap();
        assert_eq!(param(&params, "geometryType"), Some("esriGeometryPoint"));
        assert_eq!(param(&params, "spatialRel"), Some("esriSpatialRelIntersects"));
        assert_eq!(param(&params, "units"), Some("esriSRUnit_Meter"));
        assert_eq!(param(&params, "distance"), Some("20"));
        assert_eq!(param(&params, "returnGeometry"), Some("true"));
        let geometry: Value = serde_json::from_str(param(&params, "geometry").unwrap_or("null"))
            .unwrap_or(Value::Null);
        assert_eq!(geometry["x"], json!(5.9));
    }

    #[test]
    fn object_id_params() {
        let query = QuerySpec {
            object_ids: vec![3, 9],
            ..QuerySpec::default()
        };
        let params = query_params(URL, &query).unwrap();
        assert_eq!(param(&params, "objectIds"), Some("3,9"));
        assert_eq!(param(&params, "geometry"), None);
    }

    #[test]
    fn empty_spatial_filter_is_rejected() {
        let query = QuerySpec {
            geometry: Some(Geometry::Point { coordinates: vec![] }),
            distance: Some(20.0),
            ..QuerySpec::default()
        };
        let err = query_params(URL, &query).unwrap_err();
        assert!(matches!(err, ClientError::InvalidQuery { .. }));
        assert!(!LayerError::from(err).is_transient());
    }

    #[test]
    fn truncation_flag_top_level_or_properties() {
        let top = json!({"type": "FeatureCollection", "features": [], "exceededTransferLimit": true});
        let nested = json!({"features": [], "properties": {"exceededTransferLimit": true}});
        let absent = json!({"features": []});
        assert!(parse_query_response(URL, top).is_ok_and(|c| c.exceeded_transfer_limit));
        assert!(parse_query_response(URL, nested).is_ok_and(|c| c.exceeded_transfer_limit));
        assert!(parse_query_response(URL, absent).is_ok_and(|c| !c.exceeded_transfer_limit));
    }

    #[test]
    fn embedded_error_fails_the_page() {
        let body = json!({"error": {"code": 498, "message": "Invalid token."}});
        let err = parse_query_response(URL, body);
        assert!(matches!(&err, Err(ClientError::Upstream { payload, .. }) if payload.contains("Invalid token")));
    }

    #[test]
    fn empty_error_object_is_not_a_failure() {
        let body = json!({"error": {}, "features": []});
        assert!(parse_query_response(URL, body).is_ok());
    }

    #[test]
    fn decodes_geojson_features() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 1, "geometry": {"type": "Point", "coordinates": [5.9, 51.9]},
                 "properties": {"OBJECTID": 1, "status": "open"}},
                {"type": "Feature", "id": 2, "geometry": null, "properties": {"OBJECTID": 2}}
            ]
        });
        let collection = parse_query_response(URL, body).unwrap_or_default();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features[1].object_id("OBJECTID"), Some(2));
    }

    #[test]
    fn esri_feature_uses_attributes_and_wgs84() {
        let mut feature = FeatureRecord::with_geometry(Geometry::point(1.0, 2.0));
        feature.set_attribute("TOTAAL_SCORE", json!(10));
        let encoded = esri_feature(&feature);
        assert_eq!(encoded["attributes"]["TOTAAL_SCORE"], json!(10));
        assert_eq!(encoded["geometry"]["spatialReference"]["wkid"], json!(4326));
        assert_eq!(encoded["geometry"]["y"], json!(2.0));
    }

    #[test]
    fn edit_response_counts_successes() {
        let body = json!({"addResults": [
            {"objectId": 10, "success": true},
            {"success": false, "error": {"code": 1000}},
            {"objectId": 11, "success": true}
        ]});
        let result = parse_edit_response(URL, &body).unwrap_or_default();
        assert_eq!(result, EditResult { added: 2, failed: 1 });
    }

    #[test]
    fn service_info_descriptors() {
        let body = json!({"layers": [
            {"id": 0, "name": "Kabels", "parentLayerId": -1, "type": "Group Layer", "defaultVisibility": true},
            {"id": 1, "name": "Laagspanning", "parentLayerId": 0, "type": "Feature Layer",
             "geometryType": "esriGeometryPolyline", "defaultVisibility": false}
        ]});
        let layers = parse_service_info(URL, &body).unwrap_or_default();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1].parent(), Some(0));
        assert!(!layers[1].visible);
    }

    #[test]
    fn layer_metadata_falls_back_to_oid_field_type() {
        let body = json!({
            "fields": [{"name": "FID", "type": "esriFieldTypeOID", "alias": "FID"}],
            "drawingInfo": {"renderer": {"type": "simple"}}
        });
        let metadata = parse_layer_metadata(URL, &body).unwrap_or_default();
        assert_eq!(metadata.object_id_field, "FID");
        assert_eq!(metadata.renderer, Some(json!({"type": "simple"})));
        assert!(metadata.popup_template.is_none());
    }
}
