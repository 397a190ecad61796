//! Error types for the feature service clients.

use infra_core::LayerError;

/// Errors raised while talking to a feature service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL without query string.
        url: String,
        /// Underlying error message.
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{url} returned {status}: {body}")]
    Status {
        /// Request URL without query string.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The response carried an embedded `error` object.
    #[error("{url} reported an error: {payload}")]
    Upstream {
        /// Request URL without query string.
        url: String,
        /// The embedded error object, serialized.
        payload: String,
    },

    /// The query could not be encoded as request parameters.
    #[error("cannot query {url}: {message}")]
    InvalidQuery {
        /// Request URL without query string.
        url: String,
        /// Why the query was rejected.
        message: String,
    },

    /// The response body was not in the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// Request URL without query string.
        url: String,
        /// What was wrong with it.
        message: String,
    },
}

impl ClientError {
    /// Classify a `reqwest` failure.
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                url: url.to_owned(),
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            }
        }
    }
}

impl From<ClientError> for LayerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport { url, message } => Self::Transport(format!("{url}: {message}")),
            ClientError::Status { status, body, .. } => Self::Status { status, body },
            ClientError::Upstream { payload, .. } => Self::Upstream(payload),
            ClientError::Decode { url, message } => Self::Decode(format!("{url}: {message}")),
            ClientError::InvalidQuery { url, message } => {
                Self::InvalidQuery(format!("{url}: {message}"))
            }
        }
    }
}
