//! Edit events, affected-layer bindings and overlay notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::feature::FeatureRecord;
use crate::ids::{EditEventId, LayerId, OverlayId};

/// Edits applied to one source layer, as reported by the editing client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EditEvent {
    /// Event identity, minted on receipt when the client omits it.
    #[serde(default)]
    pub id: EditEventId,
    /// The layer that was edited.
    pub source_layer_id: LayerId,
    /// Newly created features.
    #[serde(default)]
    pub added_features: Option<Vec<FeatureRecord>>,
    /// Modified features.
    #[serde(default)]
    pub updated_features: Option<Vec<FeatureRecord>>,
    /// Removed features.
    #[serde(default)]
    pub deleted_features: Option<Vec<FeatureRecord>>,
}

impl EditEvent {
    /// Create an event with no edits for the given layer.
    pub fn new(source_layer_id: impl Into<LayerId>) -> Self {
        Self {
            id: EditEventId::new(),
            source_layer_id: source_layer_id.into(),
            added_features: None,
            updated_features: None,
            deleted_features: None,
        }
    }

    /// Returns true when the event carries no added, updated or deleted records.
    pub fn is_empty(&self) -> bool {
        [
            &self.added_features,
            &self.updated_features,
            &self.deleted_features,
        ]
        .into_iter()
        .all(|records| records.as_ref().is_none_or(Vec::is_empty))
    }

    /// Added then updated records; deleted records are not references
    /// for proximity reactions.
    pub fn reference_records(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.added_features
            .iter()
            .chain(self.updated_features.iter())
            .flatten()
    }
}

/// One target of a binding: a layer and the strategy that updates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BindingTarget {
    /// The affected layer.
    pub layer_id: LayerId,
    /// Registered strategy name, e.g. `300Rule`.
    pub strategy: String,
}

/// Static configuration: edits on `source_layer_id` affect `targets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AffectedLayerBinding {
    /// The edited layer.
    pub source_layer_id: LayerId,
    /// Affected layers in reaction order.
    pub targets: Vec<BindingTarget>,
}

/// Lightweight view of a synthetic overlay for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OverlaySummary {
    /// Overlay identity.
    pub id: OverlayId,
    /// The non-editable layer this overlay mirrors.
    pub target_layer_id: LayerId,
    /// Display title (target title plus suffix marker).
    pub title: String,
    /// Number of accumulated features.
    pub feature_count: usize,
    /// When the overlay was first created.
    pub created_at: DateTime<Utc>,
}

/// Change notification published by the overlay registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum OverlayEvent {
    /// A new overlay was created and should be added to the map.
    Attached {
        /// The new overlay.
        overlay: OverlaySummary,
    },
    /// Features were appended to an existing overlay.
    Appended {
        /// The overlay after the append.
        overlay: OverlaySummary,
        /// How many features were appended.
        added: usize,
    },
}
