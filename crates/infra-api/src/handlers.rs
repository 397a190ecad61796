//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/system/configuration` | Configured layers, bindings and strategies |
//! | `POST` | `/api/service-tree` | Build a layer tree from sublayer descriptors |
//! | `POST` | `/api/edits` | Dispatch an edit event |
//! | `POST` | `/api/location-query` | Query layers around a point |
//! | `GET` | `/api/overlays` | List synthetic overlays |
//! | `GET` | `/api/overlays/{layer_id}` | One overlay as GeoJSON |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use infra_client::RemoteFeatureLayer;
use infra_core::{DispatchReport, FeatureLayer, ServiceTreeBuilder, TreeBuild};
use infra_types::{EditEvent, Geometry, LayerDescriptor, LayerId, LeafOverride, OverlaySummary};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/service-tree`.
///
/// Either `descriptors` or `url` must be given; with `url`, descriptors
/// are read from the map service's info document.
#[derive(Debug, Deserialize)]
pub struct ServiceTreeRequest {
    /// Title of the root node and key namespace.
    pub root_title: String,
    /// Flat sublayer descriptors.
    #[serde(default)]
    pub descriptors: Option<Vec<LayerDescriptor>>,
    /// Map service URL to read descriptors from.
    #[serde(default)]
    pub url: Option<String>,
    /// Per-sublayer overrides keyed by sublayer id.
    #[serde(default)]
    pub overrides: BTreeMap<i64, LeafOverride>,
}

/// Body of `POST /api/location-query`.
#[derive(Debug, Deserialize)]
pub struct LocationQueryRequest {
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
    /// Search radius; defaults to 100 meters.
    #[serde(default)]
    pub radius_meters: Option<f64>,
    /// Layers to query; all registered layers when absent.
    #[serde(default)]
    pub layer_ids: Option<Vec<LayerId>>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let overlays = state.dispatcher.overlays().summaries().await;
    let overlay_features: usize = overlays.iter().map(|o| o.feature_count).sum();
    let layer_count = state.layers.len();
    let binding_count = state.bindings.len();
    let started = state.started_at.format("%Y-%m-%d %H:%M:%S UTC");

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Infra Sync</title>
    <style>
        body {{ font-family: monospace; padding: 2rem; max-width: 800px; }}
        td {{ padding: 0.2rem 1rem 0.2rem 0; }}
    </style>
</head>
<body>
    <h1>Infra Sync</h1>
    <table>
        <tr><td>Started</td><td>{started}</td></tr>
        <tr><td>Layers</td><td>{layer_count}</td></tr>
        <tr><td>Bindings</td><td>{binding_count}</td></tr>
        <tr><td>Overlays</td><td>{overlay_count}</td></tr>
        <tr><td>Overlay features</td><td>{overlay_features}</td></tr>
    </table>
    <h2>API</h2>
    <ul>
        <li><a href="/api/system/configuration">/api/system/configuration</a></li>
        <li><a href="/api/overlays">/api/overlays</a></li>
        <li>POST /api/edits</li>
        <li>POST /api/service-tree</li>
        <li>POST /api/location-query</li>
        <li>/ws/overlays (WebSocket)</li>
    </ul>
</body>
</html>"#,
        overlay_count = overlays.len(),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/system/configuration
// ---------------------------------------------------------------------------

/// Configured layers, bindings and registered strategy names.
pub async fn get_configuration(State(state): State<Arc<AppState>>) -> Json<Value> {
    let layers: Vec<Value> = state
        .layers
        .iter()
        .map(|layer| {
            json!({
                "id": layer.id,
                "title": layer.title,
                "url": layer.url,
                "editing_enabled": layer.editing_enabled,
            })
        })
        .collect();
    Json(json!({
        "layers": layers,
        "bindings": state.bindings,
        "strategies": state.dispatcher.strategies().names().collect::<Vec<_>>(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/service-tree
// ---------------------------------------------------------------------------

/// Build a layer tree from descriptors or from a map service URL.
pub async fn build_service_tree(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ServiceTreeRequest>,
) -> Result<Json<TreeBuild>, ApiError> {
    let descriptors = match (request.descriptors, request.url) {
        (Some(descriptors), _) => descriptors,
        (None, Some(url)) => state.client.fetch_service_info(&url).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(String::from(
                "either descriptors or url is required",
            )));
        }
    };
    let build = ServiceTreeBuilder::build(&request.root_title, &descriptors, &request.overrides);
    Ok(Json(build))
}

// ---------------------------------------------------------------------------
// POST /api/edits
// ---------------------------------------------------------------------------

/// Dispatch one edit event against the configured bindings.
pub async fn post_edit(
    State(state): State<Arc<AppState>>,
    Json(event): Json<EditEvent>,
) -> Result<Json<DispatchReport>, ApiError> {
    let report = state.dispatcher.dispatch(&event, &state.bindings).await?;
    info!(
        event = %report.event_id,
        invocations = report.invocations.len(),
        "edit event handled"
    );
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// POST /api/location-query
// ---------------------------------------------------------------------------

/// Query registered layers around a point, one GeoJSON collection per layer.
pub async fn location_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LocationQueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let layers: Vec<&RemoteFeatureLayer> = match &request.layer_ids {
        Some(ids) => ids
            .iter()
            .map(|id| {
                state
                    .dispatcher
                    .layer(id)
                    .map(Arc::as_ref)
                    .ok_or_else(|| ApiError::NotFound(format!("layer {id}")))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => state.dispatcher.layers().map(Arc::as_ref).collect(),
    };

    let point = Geometry::point(request.x, request.y);
    let results = state
        .dispatcher
        .proximity()
        .query_layers(&point, &layers, request.radius_meters)
        .await?;

    let mut body = serde_json::Map::new();
    for (layer, collection) in layers.iter().zip(results) {
        body.insert(layer.id().to_string(), collection.to_geojson()?);
    }
    Ok(Json(Value::Object(body)))
}

// ---------------------------------------------------------------------------
// GET /api/overlays, GET /api/overlays/{layer_id}
// ---------------------------------------------------------------------------

/// Summaries of every synthetic overlay.
pub async fn list_overlays(State(state): State<Arc<AppState>>) -> Json<Vec<OverlaySummary>> {
    Json(state.dispatcher.overlays().summaries().await)
}

/// The overlay of one target layer as a GeoJSON `FeatureCollection`, with
/// its summary and cloned rendering metadata as foreign members.
pub async fn get_overlay(
    State(state): State<Arc<AppState>>,
    Path(layer_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let layer_id = LayerId::new(layer_id);
    let overlay = state
        .dispatcher
        .overlays()
        .snapshot(&layer_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no overlay for layer {layer_id}")))?;

    let mut doc = overlay.to_collection().to_geojson()?;
    if let Some(obj) = doc.as_object_mut() {
        obj.insert(String::from("overlay"), serde_json::to_value(overlay.summary())?);
        obj.insert(String::from("metadata"), serde_json::to_value(&overlay.metadata)?);
    }
    Ok(Json(doc))
}
