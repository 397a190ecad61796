//! Integration tests for the infra API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Every request exercised here is answered
//! without contacting the configured feature services.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use infra_api::router::build_router;
use infra_api::state::AppState;
use infra_core::config::InfraConfig;
use serde_json::{Value, json};
use tower::ServiceExt;

const CONFIG: &str = r#"
layers:
  - id: editable-trees
    title: Bomen
    url: "http://127.0.0.1:9/arcgis/rest/services/Bomen/FeatureServer/0"
    editing_enabled: true
  - id: buurten
    title: BUURTEN
    url: "http://127.0.0.1:9/arcgis/rest/services/Buurten/FeatureServer/0"

reactions:
  bindings:
    - source_layer_id: editable-trees
      targets:
        - layer_id: buurten
          strategy: "300Rule"
        - layer_id: not-registered
          strategy: "300Rule"
        - layer_id: buurten
          strategy: "geen"
"#;

fn make_state() -> Arc<AppState> {
    let config = InfraConfig::parse(CONFIG).unwrap();
    Arc::new(AppState::from_config(&config))
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = build_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(state: Arc<AppState>, uri: &str, payload: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ---------------------------------------------------------------------------
// Status and configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_returns_html() {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(make_state(), request).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Infra Sync"));
    assert!(html.contains("/api/overlays"));
}

#[tokio::test]
async fn configuration_lists_layers_bindings_and_strategies() {
    let (status, json) = get_json(make_state(), "/api/system/configuration").await;
    assert_eq!(status, StatusCode::OK);

    let layers = json["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0]["id"], "editable-trees");
    assert_eq!(layers[0]["editing_enabled"], true);
    assert_eq!(layers[1]["editing_enabled"], false);

    assert_eq!(json["bindings"][0]["source_layer_id"], "editable-trees");
    let strategies: Vec<&str> = json["strategies"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(strategies.contains(&"300Rule"));
    assert!(strategies.contains(&"energielabels"));
}

// ---------------------------------------------------------------------------
// Service tree
// ---------------------------------------------------------------------------

#[tokio::test]
async fn service_tree_from_descriptors() {
    let payload = json!({
        "root_title": "Riolering",
        "descriptors": [
            { "id": 0, "name": "Leidingen", "type": "Group Layer" },
            { "id": 1, "name": "Vrijverval", "type": "Feature Layer", "parentLayerId": 0 },
            { "id": 2, "name": "Putten", "type": "Feature Layer", "parentLayerId": -1 },
            { "id": 3, "name": "Legenda", "type": "Mystery Layer" }
        ],
        "overrides": { "2": { "visible": false } }
    });
    let (status, json) = post_json(make_state(), "/api/service-tree", &payload).await;
    assert_eq!(status, StatusCode::OK);

    let root = &json["root"];
    assert_eq!(root["key"], "Riolering");
    assert_eq!(root["kind"]["kind"], "root");
    let children = root["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["key"], "Riolering - 0");
    assert_eq!(children[0]["children"][0]["key"], "Riolering - 1");
    assert_eq!(children[1]["key"], "Riolering - 2");

    let warnings = json["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["warning"], "unknown_type");
    assert_eq!(warnings[0]["id"], 3);
}

#[tokio::test]
async fn service_tree_without_source_is_bad_request() {
    let payload = json!({ "root_title": "Leeg" });
    let (status, json) = post_json(make_state(), "/api/service-tree", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("descriptors"));
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_edit_invokes_nothing() {
    let payload = json!({ "source_layer_id": "editable-trees" });
    let (status, json) = post_json(make_state(), "/api/edits", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["source_layer_id"], "editable-trees");
    assert_eq!(json["invocations"].as_array().unwrap().len(), 0);
    assert_eq!(json["skipped"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn edit_on_unbound_layer_invokes_nothing() {
    let payload = json!({
        "source_layer_id": "buurten",
        "added_features": [
            { "geometry": { "type": "Point", "coordinates": [5.9, 51.98] }, "properties": {} }
        ]
    });
    let (status, json) = post_json(make_state(), "/api/edits", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["invocations"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn edit_reports_skipped_targets() {
    // Drop the reachable target so only skipped ones remain.
    let config = InfraConfig::parse(&CONFIG.replace(
        "        - layer_id: buurten\n          strategy: \"300Rule\"\n",
        "",
    ))
    .unwrap();
    assert_eq!(config.reactions.bindings[0].targets.len(), 2);
    let state = Arc::new(AppState::from_config(&config));

    let payload = json!({
        "source_layer_id": "editable-trees",
        "added_features": [
            { "geometry": { "type": "Point", "coordinates": [5.9, 51.98] }, "properties": {} }
        ]
    });
    let (status, json) = post_json(state, "/api/edits", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["invocations"].as_array().unwrap().len(), 0);

    let skipped = json["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0]["layer_id"], "not-registered");
    assert_eq!(skipped[0]["reason"], "unknown_layer");
    assert_eq!(skipped[1]["strategy"], "geen");
    assert_eq!(skipped[1]["reason"], "unknown_strategy");
}

#[tokio::test]
async fn malformed_edit_is_rejected() {
    let payload = json!({ "added_features": [] });
    let request = Request::builder()
        .method("POST")
        .uri("/api/edits")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let (status, _) = send(make_state(), request).await;
    assert!(status.is_client_error());
}

// ---------------------------------------------------------------------------
// Overlays and location queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlays_start_empty() {
    let (status, json) = get_json(make_state(), "/api/overlays").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn missing_overlay_is_not_found() {
    let (status, json) = get_json(make_state(), "/api/overlays/buurten").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("buurten"));
}

#[tokio::test]
async fn location_query_on_unknown_layer_is_not_found() {
    let payload = json!({ "x": 5.9, "y": 51.98, "layer_ids": ["onbekend"] });
    let (status, json) = post_json(make_state(), "/api/location-query", &payload).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}
