//! Edit reaction strategies.
//!
//! A strategy finds the target features near the edited reference
//! geometries, writes its attribute update onto every match and hands the
//! mutated features to reconciliation. Strategies form a closed set of
//! variants selected by name from a [`StrategyRegistry`] built at startup.
//!
//! The score and label values are fixed sentinels until real formulas are
//! agreed on.

use std::collections::BTreeMap;

use infra_types::{FeatureRecord, Geometry, LayerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::layer::{EditBatch, FeatureLayer};
use crate::overlay::{OverlayRegistry, ReconcileOutcome};
use crate::proximity::ProximityQueryEngine;

/// Registered name of the score strategy.
pub const SCORE_STRATEGY: &str = "300Rule";

/// Registered name of the label strategy.
pub const LABEL_STRATEGY: &str = "energielabels";

/// Writes a fixed numeric score onto nearby features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStrategy {
    /// Attribute receiving the score.
    #[serde(default = "default_score_field")]
    pub field: String,
    /// The score written.
    #[serde(default = "default_score_value")]
    pub value: i64,
    /// Search radius around each reference geometry.
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,
}

/// Writes a fixed label onto nearby features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelStrategy {
    /// Attribute receiving the label.
    #[serde(default = "default_label_field")]
    pub field: String,
    /// The label written.
    #[serde(default = "default_label_value")]
    pub value: String,
    /// Search radius around each reference geometry.
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,
}

fn default_score_field() -> String {
    String::from("TOTAAL_SCORE")
}

const fn default_score_value() -> i64 {
    10
}

fn default_label_field() -> String {
    String::from("Meest_voorkomende_label")
}

fn default_label_value() -> String {
    String::from("A")
}

const fn default_radius_meters() -> f64 {
    20.0
}

impl Default for ScoreStrategy {
    fn default() -> Self {
        Self {
            field: default_score_field(),
            value: default_score_value(),
            radius_meters: default_radius_meters(),
        }
    }
}

impl Default for LabelStrategy {
    fn default() -> Self {
        Self {
            field: default_label_field(),
            value: default_label_value(),
            radius_meters: default_radius_meters(),
        }
    }
}

/// Collaborators a strategy needs while executing.
#[derive(Debug, Clone, Copy)]
pub struct ReactionContext<'a> {
    /// Proximity query engine.
    pub proximity: &'a ProximityQueryEngine,
    /// Overlay registry for non-editable targets.
    pub overlays: &'a OverlayRegistry,
}

/// How a strategy's result was reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reconciled", rename_all = "snake_case")]
pub enum Reconciliation {
    /// No target feature was near any reference; nothing was written.
    NoMatches,
    /// The matches were submitted as a server-side add edit.
    ServerEdit {
        /// Features the service accepted.
        added: usize,
        /// Features the service rejected.
        failed: usize,
    },
    /// The matches went into the target's synthetic overlay.
    Overlay(ReconcileOutcome),
}

/// One strategy invocation against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionOutcome {
    /// The target layer.
    pub target_layer_id: LayerId,
    /// The strategy that ran.
    pub strategy: String,
    /// Number of matched (and mutated) features.
    pub matched: usize,
    /// What reconciliation did.
    pub reconciliation: Reconciliation,
}

/// The closed set of reaction strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Numeric score update.
    Score(ScoreStrategy),
    /// Label update.
    Label(LabelStrategy),
}

impl Strategy {
    /// Search radius in meters.
    pub const fn radius_meters(&self) -> f64 {
        match self {
            Self::Score(s) => s.radius_meters,
            Self::Label(s) => s.radius_meters,
        }
    }

    /// Write this strategy's attribute update onto one feature.
    pub fn apply(&self, feature: &mut FeatureRecord) {
        match self {
            Self::Score(s) => feature.set_attribute(&s.field, Value::from(s.value)),
            Self::Label(s) => feature.set_attribute(&s.field, Value::from(s.value.as_str())),
        }
    }

    /// Run the strategy for one target.
    ///
    /// `name` is the registered name, echoed in the outcome. A failing
    /// proximity batch fails the invocation before anything is reconciled.
    pub async fn execute<L: FeatureLayer>(
        &self,
        name: &str,
        references: &[Geometry],
        target: &L,
        ctx: ReactionContext<'_>,
    ) -> Result<ReactionOutcome, DispatchError> {
        let matched = ctx
            .proximity
            .query_near(references, target, self.radius_meters())
            .await?;

        let mut features = matched.features;
        for feature in &mut features {
            self.apply(feature);
        }
        debug!(
            strategy = name,
            target = %target.id(),
            matched = features.len(),
            "strategy computed updates"
        );

        let count = features.len();
        let reconciliation = reconcile(target, features, ctx.overlays).await?;
        Ok(ReactionOutcome {
            target_layer_id: target.id().clone(),
            strategy: name.to_owned(),
            matched: count,
            reconciliation,
        })
    }
}

/// Submit `features` to an editable target, or to its overlay otherwise.
async fn reconcile<L: FeatureLayer>(
    target: &L,
    features: Vec<FeatureRecord>,
    overlays: &OverlayRegistry,
) -> Result<Reconciliation, DispatchError> {
    if features.is_empty() {
        return Ok(Reconciliation::NoMatches);
    }

    if target.editing_enabled() {
        let batch = EditBatch {
            add_features: features,
        };
        let result = target
            .apply_edits(&batch)
            .await
            .map_err(|err| DispatchError::Edit {
                layer_id: target.id().clone(),
                source: err,
            })?;
        info!(
            target = %target.id(),
            added = result.added,
            failed = result.failed,
            "applied server-side edit"
        );
        return Ok(Reconciliation::ServerEdit {
            added: result.added,
            failed: result.failed,
        });
    }

    Ok(Reconciliation::Overlay(
        overlays.reconcile(target, features).await,
    ))
}

/// Strategies by registered name.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Strategy>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The two built-in strategies under their registered names.
    pub fn with_builtins(score: ScoreStrategy, label: LabelStrategy) -> Self {
        let mut registry = Self::new();
        registry.register(SCORE_STRATEGY, Strategy::Score(score));
        registry.register(LABEL_STRATEGY, Strategy::Label(label));
        registry
    }

    /// Register (or replace) a strategy.
    pub fn register(&mut self, name: &str, strategy: Strategy) {
        self.strategies.insert(name.to_owned(), strategy);
    }

    /// Look up a strategy by name.
    pub fn get(&self, name: &str) -> Option<&Strategy> {
        self.strategies.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_by_name() {
        let registry = StrategyRegistry::with_builtins(ScoreStrategy::default(), LabelStrategy::default());
        assert!(matches!(registry.get("300Rule"), Some(Strategy::Score(_))));
        assert!(matches!(registry.get("energielabels"), Some(Strategy::Label(_))));
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["300Rule", "energielabels"]);
    }

    #[test]
    fn score_writes_numeric_sentinel() {
        let mut feature = FeatureRecord::default();
        Strategy::Score(ScoreStrategy::default()).apply(&mut feature);
        assert_eq!(feature.attributes.get("TOTAAL_SCORE"), Some(&Value::from(10)));
    }

    #[test]
    fn label_writes_label_sentinel() {
        let mut feature = FeatureRecord::default();
        feature.set_attribute("Meest_voorkomende_label", Value::from("G"));
        Strategy::Label(LabelStrategy::default()).apply(&mut feature);
        assert_eq!(
            feature.attributes.get("Meest_voorkomende_label"),
            Some(&Value::from("A"))
        );
    }

    #[test]
    fn both_default_to_twenty_meters() {
        assert!((Strategy::Score(ScoreStrategy::default()).radius_meters() - 20.0).abs() < f64::EPSILON);
        assert!((Strategy::Label(LabelStrategy::default()).radius_meters() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn strategy_config_parses_with_defaults() {
        let parsed: Result<ScoreStrategy, _> = serde_json::from_str(r#"{"value": 42}"#);
        assert!(parsed.is_ok_and(|s| s.value == 42 && s.field == "TOTAAL_SCORE"));
    }
}
