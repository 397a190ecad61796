//! HTTP API of the infra sync service.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Edit reactions** (`POST /api/edits`): an edit event on a source
//!   layer is dispatched to the strategies of its affected layers
//! - **Service trees** (`POST /api/service-tree`): a map service's flat
//!   sublayer list assembled into a group/leaf hierarchy
//! - **Location queries** (`POST /api/location-query`)
//! - **Overlays** (`GET /api/overlays`, `/ws/overlays`): the synthetic
//!   overlays of non-editable targets, as listings, GeoJSON and a live
//!   [`tokio::sync::broadcast`] event stream
//!
//! # Architecture
//!
//! One [`AppState`] is built at startup and shared by every handler. It
//! owns the edit reaction dispatcher, and through it the overlay registry,
//! so overlays live exactly as long as the server process.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
