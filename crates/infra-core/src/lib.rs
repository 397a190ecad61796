//! Sync engine for remote map and feature services.
//!
//! This crate owns the three core capabilities of infra-sync: building
//! layer trees from map-image sublayer lists, draining paginated query
//! endpoints, and reacting to feature edits with proximity queries whose
//! results are reconciled as server edits or synthetic overlays.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `infra-config.yaml` into
//!   strongly-typed structs.
//! - [`dispatch`] -- [`EditReactionDispatcher`], the session object that
//!   routes edit events to strategies.
//! - [`error`] -- Error types shared by every operation.
//! - [`extract`] -- [`PageSource`] trait and [`PaginatedExtractor`].
//! - [`layer`] -- [`FeatureLayer`] capability trait and query types.
//! - [`overlay`] -- [`OverlayRegistry`] of synthetic overlays.
//! - [`proximity`] -- [`ProximityQueryEngine`] for radius queries.
//! - [`retry`] -- Exponential backoff for transient failures.
//! - [`strategy`] -- Score and label strategies and their registry.
//! - [`tree`] -- [`ServiceTreeBuilder`].
//!
//! [`EditReactionDispatcher`]: dispatch::EditReactionDispatcher
//! [`PageSource`]: extract::PageSource
//! [`PaginatedExtractor`]: extract::PaginatedExtractor
//! [`FeatureLayer`]: layer::FeatureLayer
//! [`OverlayRegistry`]: overlay::OverlayRegistry
//! [`ProximityQueryEngine`]: proximity::ProximityQueryEngine
//! [`ServiceTreeBuilder`]: tree::ServiceTreeBuilder

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod layer;
pub mod overlay;
pub mod proximity;
pub mod retry;
pub mod strategy;
pub mod tree;

pub use dispatch::{DispatchReport, EditReactionDispatcher, SkipReason, SkippedTarget};
pub use error::{DispatchError, ExtractionError, LayerError, QueryBatchError};
pub use extract::{PageSource, PaginatedExtractor};
pub use layer::{EditBatch, EditResult, FeatureLayer, QuerySpec};
pub use overlay::{OverlayRegistry, ReconcileOutcome, SyntheticOverlay};
pub use proximity::{ProximityConfig, ProximityQueryEngine};
pub use retry::RetryPolicy;
pub use strategy::{
    LabelStrategy, ReactionContext, ReactionOutcome, Reconciliation, ScoreStrategy, Strategy,
    StrategyRegistry,
};
pub use tree::{ServiceTreeBuilder, TreeBuild, TreeBuildWarning};
