//! Edit reaction dispatch.
//!
//! [`EditReactionDispatcher`] is the session object of the reaction
//! pipeline. It owns the known layers, the strategy registry, the
//! proximity engine and the overlay registry, and turns one
//! [`EditEvent`] into strategy invocations against every bound target.
//!
//! Dispatch steps:
//!
//! 1. Skip events without records and events no binding matches.
//! 2. Collect reference geometries from added and updated records,
//!    re-querying records without geometry from the source layer by
//!    object id.
//! 3. Run each bound target's strategy. Targets run concurrently and the
//!    first failure fails the dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use infra_types::{AffectedLayerBinding, EditEvent, EditEventId, Geometry, LayerId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::layer::{FeatureLayer, QuerySpec};
use crate::overlay::OverlayRegistry;
use crate::proximity::ProximityQueryEngine;
use crate::strategy::{ReactionContext, ReactionOutcome, StrategyRegistry};

/// Why a bound target was not invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The binding names a strategy that is not registered.
    UnknownStrategy,
    /// The binding names a layer the dispatcher does not know.
    UnknownLayer,
}

/// A bound target that was not invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTarget {
    /// The target layer.
    pub layer_id: LayerId,
    /// The strategy name from the binding.
    pub strategy: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// What one dispatch did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// The dispatched event.
    pub event_id: EditEventId,
    /// The edited layer.
    pub source_layer_id: LayerId,
    /// Strategy invocations, in binding order.
    pub invocations: Vec<ReactionOutcome>,
    /// Bound targets that were not invoked.
    pub skipped: Vec<SkippedTarget>,
}

impl DispatchReport {
    fn empty(event: &EditEvent) -> Self {
        Self {
            event_id: event.id,
            source_layer_id: event.source_layer_id.clone(),
            invocations: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Routes edit events to the strategies of their affected layers.
#[derive(Debug)]
pub struct EditReactionDispatcher<L> {
    layers: BTreeMap<LayerId, Arc<L>>,
    strategies: StrategyRegistry,
    proximity: ProximityQueryEngine,
    overlays: Arc<OverlayRegistry>,
}

impl<L: FeatureLayer> EditReactionDispatcher<L> {
    /// Create a dispatcher with no layers registered.
    pub fn new(
        strategies: StrategyRegistry,
        proximity: ProximityQueryEngine,
        overlays: Arc<OverlayRegistry>,
    ) -> Self {
        Self {
            layers: BTreeMap::new(),
            strategies,
            proximity,
            overlays,
        }
    }

    /// Make a layer available as a source or target.
    pub fn register_layer(&mut self, layer: L) {
        self.layers.insert(layer.id().clone(), Arc::new(layer));
    }

    /// Look up a registered layer.
    pub fn layer(&self, id: &LayerId) -> Option<&Arc<L>> {
        self.layers.get(id)
    }

    /// Registered layers ordered by id.
    pub fn layers(&self) -> impl Iterator<Item = &Arc<L>> {
        self.layers.values()
    }

    /// The overlay registry of this session.
    pub fn overlays(&self) -> &Arc<OverlayRegistry> {
        &self.overlays
    }

    /// The strategies this dispatcher can invoke.
    pub const fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// The proximity engine of this session.
    pub const fn proximity(&self) -> &ProximityQueryEngine {
        &self.proximity
    }

    /// React to one edit event.
    ///
    /// Empty events and events without a matching binding are no-ops that
    /// invoke no strategy and touch no overlay.
    pub async fn dispatch(
        &self,
        event: &EditEvent,
        bindings: &[AffectedLayerBinding],
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::empty(event);
        if event.is_empty() {
            debug!(event = %event.id, "edit event carries no records");
            return Ok(report);
        }

        let matching: Vec<&AffectedLayerBinding> = bindings
            .iter()
            .filter(|binding| binding.source_layer_id == event.source_layer_id)
            .collect();
        if matching.is_empty() {
            debug!(source = %event.source_layer_id, "no binding for edited layer");
            return Ok(report);
        }

        let references = self.reference_geometries(event).await?;

        let ctx = ReactionContext {
            proximity: &self.proximity,
            overlays: &self.overlays,
        };
        let mut invocations = Vec::new();
        for target in matching.iter().flat_map(|binding| binding.targets.iter()) {
            let Some(strategy) = self.strategies.get(&target.strategy) else {
                warn!(
                    target = %target.layer_id,
                    strategy = %target.strategy,
                    "skipping target with unknown strategy"
                );
                report.skipped.push(SkippedTarget {
                    layer_id: target.layer_id.clone(),
                    strategy: target.strategy.clone(),
                    reason: SkipReason::UnknownStrategy,
                });
                continue;
            };
            let Some(layer) = self.layers.get(&target.layer_id) else {
                warn!(target = %target.layer_id, "skipping unknown target layer");
                report.skipped.push(SkippedTarget {
                    layer_id: target.layer_id.clone(),
                    strategy: target.strategy.clone(),
                    reason: SkipReason::UnknownLayer,
                });
                continue;
            };
            invocations.push(strategy.execute(
                &target.strategy,
                &references,
                layer.as_ref(),
                ctx,
            ));
        }

        report.invocations = try_join_all(invocations).await?;
        info!(
            event = %event.id,
            source = %event.source_layer_id,
            references = references.len(),
            invocations = report.invocations.len(),
            skipped = report.skipped.len(),
            "edit event dispatched"
        );
        Ok(report)
    }

    /// Geometries of added and updated records, in event order.
    ///
    /// Records without geometry are resolved from the registered source
    /// layer by object id. Records that resolve to nothing, or to an empty
    /// geometry, are dropped.
    async fn reference_geometries(&self, event: &EditEvent) -> Result<Vec<Geometry>, DispatchError> {
        let mut geometries: Vec<Option<Geometry>> = Vec::new();
        let mut missing: Vec<(usize, i64)> = Vec::new();
        let source = self.layers.get(&event.source_layer_id);
        let id_field = source.map_or("OBJECTID", |layer| layer.metadata().object_id_field.as_str());

        for record in event.reference_records() {
            match (&record.geometry, record.object_id(id_field)) {
                (Some(geometry), _) if !geometry.is_empty() => geometries.push(Some(geometry.clone())),
                (_, Some(object_id)) => {
                    missing.push((geometries.len(), object_id));
                    geometries.push(None);
                }
                _ => {}
            }
        }

        if let (Some(layer), false) = (source, missing.is_empty()) {
            let query = QuerySpec {
                object_ids: missing.iter().map(|(_, id)| *id).collect(),
                ..layer.create_query()
            };
            let resolved = layer
                .query_features(&query)
                .await
                .map_err(|err| DispatchError::Source {
                    layer_id: event.source_layer_id.clone(),
                    source: err,
                })?;
            let by_id: BTreeMap<i64, Geometry> = resolved
                .features
                .into_iter()
                .filter_map(|f| Some((f.object_id(id_field)?, f.geometry?)))
                .filter(|(_, geometry)| !geometry.is_empty())
                .collect();
            for (slot, object_id) in &missing {
                if let Some(entry) = geometries.get_mut(*slot) {
                    *entry = by_id.get(object_id).cloned();
                }
            }
            debug!(
                source = %event.source_layer_id,
                requested = missing.len(),
                resolved = by_id.len(),
                "resolved edited features from source layer"
            );
        }

        Ok(geometries.into_iter().flatten().collect())
    }
}
