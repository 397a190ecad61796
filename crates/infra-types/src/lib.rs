//! Shared data model for infra-sync.
//!
//! This crate is the single source of truth for the types exchanged
//! between the sync engine and the rendering collaborator. Types flow
//! downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Layer ids and UUID-backed event/overlay ids
//! - [`geometry`] -- GeoJSON geometries and their Esri JSON encoding
//! - [`feature`] -- Feature records and feature collections
//! - [`layer`] -- Sublayer descriptors, layer trees, layer metadata
//! - [`edit`] -- Edit events, affected-layer bindings, overlay notifications

pub mod edit;
pub mod feature;
pub mod geometry;
pub mod ids;
pub mod layer;

// Re-export all public types at crate root for convenience.
pub use edit::{AffectedLayerBinding, BindingTarget, EditEvent, OverlayEvent, OverlaySummary};
pub use feature::{FeatureCollection, FeatureRecord};
pub use geometry::{EsriGeometry, Geometry, Position};
pub use ids::{EditEventId, LayerId, OverlayId};
pub use layer::{
    DescriptorKind, ElevationInfo, FieldInfo, LayerDescriptor, LayerKind, LayerMetadata,
    LayerNode, LeafConfig, LeafOverride, NodeKind,
};
