//! Remote feature layers backed by a feature service.

use infra_core::{EditBatch, EditResult, FeatureLayer, LayerError, QuerySpec};
use infra_types::{FeatureCollection, LayerId, LayerMetadata};
use serde_json::Value;
use tracing::info;

use crate::client::FeatureServiceClient;
use crate::error::ClientError;
use crate::wire;

/// A feature layer served over the feature service REST protocol.
#[derive(Debug, Clone)]
pub struct RemoteFeatureLayer {
    client: FeatureServiceClient,
    id: LayerId,
    title: String,
    url: String,
    editing_enabled: bool,
    metadata: LayerMetadata,
}

impl RemoteFeatureLayer {
    /// Create a layer with known metadata. No request is made.
    pub fn new(
        client: FeatureServiceClient,
        id: impl Into<LayerId>,
        title: &str,
        url: &str,
        editing_enabled: bool,
        metadata: LayerMetadata,
    ) -> Self {
        Self {
            client,
            id: id.into(),
            title: title.to_owned(),
            url: wire::layer_url(url),
            editing_enabled,
            metadata,
        }
    }

    /// Create a layer, fetching its rendering metadata from the service.
    pub async fn connect(
        client: FeatureServiceClient,
        id: impl Into<LayerId>,
        title: &str,
        url: &str,
        editing_enabled: bool,
    ) -> Result<Self, ClientError> {
        let metadata = client.fetch_layer_metadata(url).await?;
        let layer = Self::new(client, id, title, url, editing_enabled, metadata);
        info!(
            layer = %layer.id,
            url = %layer.url,
            editing_enabled,
            fields = layer.metadata.fields.len(),
            "connected feature layer"
        );
        Ok(layer)
    }

    /// The layer URL (without `/query`).
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeatureLayer for RemoteFeatureLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn editing_enabled(&self) -> bool {
        self.editing_enabled
    }

    fn metadata(&self) -> &LayerMetadata {
        &self.metadata
    }

    async fn query_features(&self, query: &QuerySpec) -> Result<FeatureCollection, LayerError> {
        let url = wire::query_url(&self.url);
        let params = wire::query_params(&url, query)?;
        let body = self.client.get_json(&url, &params).await?;
        Ok(wire::parse_query_response(&url, body)?)
    }

    async fn apply_edits(&self, edits: &EditBatch) -> Result<EditResult, LayerError> {
        if !self.editing_enabled {
            return Err(LayerError::Unsupported(format!(
                "editing is disabled for {}",
                self.id
            )));
        }
        let adds: Vec<Value> = edits.add_features.iter().map(wire::esri_feature).collect();
        let adds = Value::Array(adds).to_string();
        let url = format!("{}/applyEdits", self.url);
        let body = self
            .client
            .post_form(&url, &[("f", "json"), ("adds", adds.as_str())])
            .await?;
        Ok(wire::parse_edit_response(&url, &body)?)
    }
}
