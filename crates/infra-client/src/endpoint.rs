//! Query endpoints drained by the paginated extractor.

use infra_core::{LayerError, PageSource};
use infra_types::FeatureCollection;

use crate::client::FeatureServiceClient;
use crate::wire;

/// A named feature-query endpoint.
#[derive(Debug, Clone)]
pub struct QueryEndpoint {
    client: FeatureServiceClient,
    name: String,
    url: String,
}

impl QueryEndpoint {
    /// Create an endpoint. `url` may be a layer URL or its `/query` URL.
    pub fn new(client: FeatureServiceClient, name: &str, url: &str) -> Self {
        Self {
            client,
            name: name.to_owned(),
            url: wire::query_url(url),
        }
    }

    /// The normalized `/query` URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PageSource for QueryEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(&self, offset: u64) -> Result<FeatureCollection, LayerError> {
        let body = self
            .client
            .get_json(&self.url, &wire::page_params(offset))
            .await?;
        Ok(wire::parse_query_response(&self.url, body)?)
    }
}
