//! Shared HTTP plumbing for feature service requests.
//!
//! [`FeatureServiceClient`] wraps one `reqwest::Client` (connection pool)
//! and turns every response into JSON or a [`ClientError`]: transport
//! failures, non-success statuses and embedded `error` objects are all
//! surfaced as errors.

use std::time::Duration;

use infra_types::{LayerDescriptor, LayerMetadata};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::wire;

/// Request timeout applied to every call made through the client.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A pooled HTTP client for feature and map services.
#[derive(Debug, Clone)]
pub struct FeatureServiceClient {
    http: reqwest::Client,
}

impl Default for FeatureServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureServiceClient {
    /// Create a client with the default request timeout.
    pub fn new() -> Self {
        Self::from_builder(reqwest::Client::builder().timeout(DEFAULT_TIMEOUT))
    }

    /// Build the pooled client, falling back to reqwest's defaults when the
    /// configured builder is rejected.
    fn from_builder(builder: reqwest::ClientBuilder) -> Self {
        let http = match builder.build() {
            Ok(http) => http,
            Err(e) => {
                warn!(error = %e, "failed to build HTTP client, using defaults without timeout");
                reqwest::Client::new()
            }
        };
        Self { http }
    }

    /// GET `url` with query parameters and return the JSON body.
    pub async fn get_json<P: Serialize + ?Sized>(
        &self,
        url: &str,
        params: &P,
    ) -> Result<Value, ClientError> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(url, &e))?;
        Self::read_json(url, response).await
    }

    /// POST `url` as a form and return the JSON body.
    pub async fn post_form<P: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &P,
    ) -> Result<Value, ClientError> {
        debug!(url, "POST");
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(url, &e))?;
        Self::read_json(url, response).await
    }

    async fn read_json(url: &str, response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ClientError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode {
                url: url.to_owned(),
                message: format!("response parse failed: {e}"),
            })
    }

    /// Fetch the sublayer descriptors of a map-image service.
    pub async fn fetch_service_info(&self, url: &str) -> Result<Vec<LayerDescriptor>, ClientError> {
        let url = url.trim_end_matches('/');
        let body = self.get_json(url, &[("f", "json")]).await?;
        let layers = wire::parse_service_info(url, &body)?;
        debug!(url, sublayers = layers.len(), "fetched service info");
        Ok(layers)
    }

    /// Fetch the rendering metadata of a feature layer.
    pub async fn fetch_layer_metadata(&self, url: &str) -> Result<LayerMetadata, ClientError> {
        let url = wire::layer_url(url);
        let body = self.get_json(&url, &[("f", "json")]).await?;
        wire::parse_layer_metadata(&url, &body)
    }
}
