//! Shared application state for the API server.
//!
//! [`AppState`] is the session handle of the running service. It owns the
//! [`EditReactionDispatcher`] (and through it the overlay registry), the
//! static affected-layer bindings, and the feature service client used
//! for service info lookups.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use infra_client::{FeatureServiceClient, RemoteFeatureLayer};
use infra_core::config::{InfraConfig, LayerConfig};
use infra_core::{EditReactionDispatcher, FeatureLayer, OverlayRegistry, ProximityQueryEngine};
use infra_types::{AffectedLayerBinding, LayerMetadata, OverlayEvent};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    /// Edit reaction session over the configured remote layers.
    pub dispatcher: EditReactionDispatcher<RemoteFeatureLayer>,
    /// Which targets react to edits of which source layers.
    pub bindings: Vec<AffectedLayerBinding>,
    /// Configured layers, as listed by the configuration endpoint.
    pub layers: Vec<LayerConfig>,
    /// Client for map service lookups.
    pub client: FeatureServiceClient,
    /// When the server started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state from configuration without contacting any service.
    ///
    /// Layers start with empty rendering metadata.
    pub fn from_config(config: &InfraConfig) -> Self {
        let client = FeatureServiceClient::new();
        let layers = config
            .layers
            .iter()
            .map(|layer| {
                RemoteFeatureLayer::new(
                    client.clone(),
                    layer.id.as_str(),
                    &layer.title,
                    &layer.url,
                    layer.editing_enabled,
                    LayerMetadata::default(),
                )
            })
            .collect();
        Self::assemble(config, client, layers)
    }

    /// Build state from configuration, fetching each layer's rendering
    /// metadata. A layer whose metadata cannot be fetched is kept with
    /// empty metadata.
    pub async fn connect(config: &InfraConfig) -> Self {
        let client = FeatureServiceClient::new();
        let mut layers = Vec::with_capacity(config.layers.len());
        for layer in &config.layers {
            let connected = RemoteFeatureLayer::connect(
                client.clone(),
                layer.id.as_str(),
                &layer.title,
                &layer.url,
                layer.editing_enabled,
            )
            .await;
            match connected {
                Ok(remote) => layers.push(remote),
                Err(e) => {
                    warn!(layer = %layer.id, error = %e, "layer metadata unavailable, using defaults");
                    layers.push(RemoteFeatureLayer::new(
                        client.clone(),
                        layer.id.as_str(),
                        &layer.title,
                        &layer.url,
                        layer.editing_enabled,
                        LayerMetadata::default(),
                    ));
                }
            }
        }
        Self::assemble(config, client, layers)
    }

    fn assemble(
        config: &InfraConfig,
        client: FeatureServiceClient,
        layers: Vec<RemoteFeatureLayer>,
    ) -> Self {
        let mut dispatcher = EditReactionDispatcher::new(
            config.reactions.strategies(),
            ProximityQueryEngine::new(&config.proximity),
            Arc::new(OverlayRegistry::new(&config.reactions.overlay_title_suffix)),
        );
        for layer in layers {
            info!(
                layer = %layer.id(),
                editing_enabled = layer.editing_enabled(),
                "registered layer"
            );
            dispatcher.register_layer(layer);
        }
        Self {
            dispatcher,
            bindings: config.reactions.bindings.clone(),
            layers: config.layers.clone(),
            client,
            started_at: Utc::now(),
        }
    }

    /// Subscribe to overlay change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEvent> {
        self.dispatcher.overlays().subscribe()
    }
}
