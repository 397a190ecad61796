//! Error types for the sync engine.
//!
//! [`LayerError`] is what a collaborator (remote endpoint or feature layer)
//! reports. The engine wraps it with the context of the operation that
//! failed: [`ExtractionError`] for backfills, [`QueryBatchError`] for
//! proximity fan-out and [`DispatchError`] for edit reactions.

use std::time::Duration;

use infra_types::LayerId;

/// Failure reported by a feature layer or query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    /// The request never produced a response (connect, DNS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("upstream returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The service answered 200 but embedded an error object.
    #[error("upstream error payload: {0}")]
    Upstream(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The request exceeded its deadline.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The layer cannot perform the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The query cannot be expressed as a request, e.g. a spatial filter
    /// on an empty geometry.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl LayerError {
    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Upstream(_)
            | Self::Decode(_)
            | Self::Unsupported(_)
            | Self::InvalidQuery(_) => false,
        }
    }
}

/// A bulk extraction of one endpoint failed; its partial results were discarded.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// A page request failed.
    #[error("extraction of {endpoint} failed at offset {offset}: {source}")]
    Upstream {
        /// Logical name of the endpoint.
        endpoint: String,
        /// Offset of the failing page.
        offset: u64,
        /// What the endpoint reported.
        source: LayerError,
    },

    /// The endpoint reported truncation but returned no records, so the
    /// offset could never advance.
    #[error("extraction of {endpoint} stalled at offset {offset}: truncated page without records")]
    Stalled {
        /// Logical name of the endpoint.
        endpoint: String,
        /// Offset of the empty page.
        offset: u64,
    },
}

impl ExtractionError {
    /// Logical name of the endpoint that failed.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Upstream { endpoint, .. } | Self::Stalled { endpoint, .. } => endpoint,
        }
    }
}

/// One query of a proximity batch failed, failing the whole batch.
#[derive(Debug, thiserror::Error)]
#[error("proximity query {index} against {layer_id} failed: {source}")]
pub struct QueryBatchError {
    /// Position of the failing reference geometry (or layer) in the input.
    pub index: usize,
    /// The layer being queried.
    pub layer_id: LayerId,
    /// What the layer reported.
    pub source: LayerError,
}

/// An edit reaction failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A proximity batch failed; nothing was reconciled for that target.
    #[error(transparent)]
    Query(#[from] QueryBatchError),

    /// Resolving the edited records from the source layer failed.
    #[error("could not resolve edited features of {layer_id}: {source}")]
    Source {
        /// The edited layer.
        layer_id: LayerId,
        /// What the layer reported.
        source: LayerError,
    },

    /// Submitting the server-side edit failed.
    #[error("applying edits to {layer_id} failed: {source}")]
    Edit {
        /// The affected layer.
        layer_id: LayerId,
        /// What the layer reported.
        source: LayerError,
    },
}
