//! HTTP clients for remote feature and map services.
//!
//! Implements the collaborator traits of `infra-core` over the feature
//! service REST protocol with `reqwest`:
//!
//! - [`QueryEndpoint`] is a [`PageSource`] for bulk extraction.
//! - [`RemoteFeatureLayer`] is a [`FeatureLayer`] for proximity queries
//!   and server-side edits.
//! - [`FeatureServiceClient::fetch_service_info`] reads the sublayer
//!   descriptors of a map-image service.
//!
//! [`PageSource`]: infra_core::PageSource
//! [`FeatureLayer`]: infra_core::FeatureLayer

pub mod client;
pub mod endpoint;
pub mod error;
pub mod layer;
pub mod wire;

pub use client::FeatureServiceClient;
pub use endpoint::QueryEndpoint;
pub use error::ClientError;
pub use layer::RemoteFeatureLayer;
