//! Synthetic overlays for targets that refuse server-side edits.
//!
//! [`OverlayRegistry`] holds at most one [`SyntheticOverlay`] per target
//! layer id. The first reconciliation for a target clones the target's
//! rendering metadata and creates the overlay; later reconciliations
//! append to it. The registry is owned by the dispatcher's session rather
//! than living in a global.
//!
//! Every change is published as an [`OverlayEvent`] on a broadcast
//! channel, which is how the rendering collaborator learns that an
//! overlay should be attached or refreshed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use infra_types::{
    FeatureCollection, FeatureRecord, LayerId, LayerMetadata, OverlayEvent, OverlayId,
    OverlaySummary,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::layer::FeatureLayer;

/// Capacity of the overlay event channel.
///
/// A subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
const EVENT_CAPACITY: usize = 256;

/// Default marker appended to a target's title to name its overlay.
pub const DEFAULT_TITLE_SUFFIX: &str = " (aangepast)";

/// Client-held mirror of one non-editable target layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticOverlay {
    /// Overlay identity.
    pub id: OverlayId,
    /// The target layer this overlay mirrors.
    pub target_layer_id: LayerId,
    /// Target title plus suffix marker.
    pub title: String,
    /// Rendering metadata cloned from the target at creation.
    pub metadata: LayerMetadata,
    /// Accumulated features, in reconciliation order.
    pub features: Vec<FeatureRecord>,
    /// When the overlay was created.
    pub created_at: DateTime<Utc>,
}

impl SyntheticOverlay {
    /// Listing view of this overlay.
    pub fn summary(&self) -> OverlaySummary {
        OverlaySummary {
            id: self.id,
            target_layer_id: self.target_layer_id.clone(),
            title: self.title.clone(),
            feature_count: self.features.len(),
            created_at: self.created_at,
        }
    }

    /// The accumulated features as a collection.
    pub fn to_collection(&self) -> FeatureCollection {
        FeatureCollection::new(self.features.clone())
    }
}

/// What a reconciliation did to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// A new overlay was created for the target.
    Created {
        /// State after creation.
        overlay: OverlaySummary,
    },
    /// Features were appended to the target's existing overlay.
    Appended {
        /// State after the append.
        overlay: OverlaySummary,
        /// Number of features appended.
        added: usize,
    },
}

impl ReconcileOutcome {
    /// The overlay after the reconciliation.
    pub const fn overlay(&self) -> &OverlaySummary {
        match self {
            Self::Created { overlay } | Self::Appended { overlay, .. } => overlay,
        }
    }
}

/// Registry of synthetic overlays keyed by target layer id.
#[derive(Debug)]
pub struct OverlayRegistry {
    overlays: Mutex<BTreeMap<LayerId, SyntheticOverlay>>,
    title_suffix: String,
    events: broadcast::Sender<OverlayEvent>,
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_SUFFIX)
    }
}

impl OverlayRegistry {
    /// Create an empty registry naming overlays `<target title><suffix>`.
    pub fn new(title_suffix: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            overlays: Mutex::new(BTreeMap::new()),
            title_suffix: title_suffix.to_owned(),
            events,
        }
    }

    /// Subscribe to overlay change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEvent> {
        self.events.subscribe()
    }

    /// Add `matched` to the overlay of `target`, creating it on first use.
    ///
    /// The lookup and the insert happen under one lock, so concurrent first
    /// reconciliations for the same target create exactly one overlay.
    /// Features are appended without identity deduplication.
    pub async fn reconcile<L: FeatureLayer>(
        &self,
        target: &L,
        matched: Vec<FeatureRecord>,
    ) -> ReconcileOutcome {
        let added = matched.len();
        let mut overlays = self.overlays.lock().await;

        let outcome = if let Some(overlay) = overlays.get_mut(target.id()) {
            overlay.features.extend(matched);
            debug!(
                target = %target.id(),
                added,
                total = overlay.features.len(),
                "appended to overlay"
            );
            ReconcileOutcome::Appended {
                overlay: overlay.summary(),
                added,
            }
        } else {
            let overlay = SyntheticOverlay {
                id: OverlayId::new(),
                target_layer_id: target.id().clone(),
                title: format!("{}{}", target.title(), self.title_suffix),
                metadata: target.metadata().clone(),
                features: matched,
                created_at: Utc::now(),
            };
            info!(
                target = %target.id(),
                overlay = %overlay.id,
                features = added,
                "created synthetic overlay"
            );
            let summary = overlay.summary();
            overlays.insert(target.id().clone(), overlay);
            ReconcileOutcome::Created { overlay: summary }
        };
        drop(overlays);

        let event = match &outcome {
            ReconcileOutcome::Created { overlay } => OverlayEvent::Attached {
                overlay: overlay.clone(),
            },
            ReconcileOutcome::Appended { overlay, added } => OverlayEvent::Appended {
                overlay: overlay.clone(),
                added: *added,
            },
        };
        // No subscribers is fine.
        let _ = self.events.send(event);

        outcome
    }

    /// Summaries of every overlay, ordered by target layer id.
    pub async fn summaries(&self) -> Vec<OverlaySummary> {
        self.overlays
            .lock()
            .await
            .values()
            .map(SyntheticOverlay::summary)
            .collect()
    }

    /// A copy of the overlay mirroring `target_layer_id`, if any.
    pub async fn snapshot(&self, target_layer_id: &LayerId) -> Option<SyntheticOverlay> {
        self.overlays.lock().await.get(target_layer_id).cloned()
    }

    /// Number of overlays.
    pub async fn len(&self) -> usize {
        self.overlays.lock().await.len()
    }

    /// Returns true when no overlay has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.overlays.lock().await.is_empty()
    }
}
