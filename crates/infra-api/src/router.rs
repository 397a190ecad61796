//! Axum router construction for the infra API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/overlays` -- `WebSocket` overlay event stream
/// - `GET /api/system/configuration` -- layers, bindings, strategies
/// - `POST /api/service-tree` -- layer tree from sublayer descriptors
/// - `POST /api/edits` -- dispatch an edit event
/// - `POST /api/location-query` -- layers around a point
/// - `GET /api/overlays` -- overlay summaries
/// - `GET /api/overlays/{layer_id}` -- one overlay as GeoJSON
///
/// CORS allows any origin so a map client on another host can call in.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/overlays", get(ws::ws_overlays))
        .route("/api/system/configuration", get(handlers::get_configuration))
        .route("/api/service-tree", post(handlers::build_service_tree))
        .route("/api/edits", post(handlers::post_edit))
        .route("/api/location-query", post(handlers::location_query))
        .route("/api/overlays", get(handlers::list_overlays))
        .route("/api/overlays/{layer_id}", get(handlers::get_overlay))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
