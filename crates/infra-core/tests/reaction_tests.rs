//! Integration tests for the edit reaction pipeline.
//!
//! Layers are in-memory: features are points in a planar meter grid and
//! a proximity query matches every feature within the requested distance
//! of the query point. This exercises dispatch, strategies, proximity
//! fan-out and both reconciliation paths without any network.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use infra_core::{
    DispatchError, EditBatch, EditReactionDispatcher, EditResult, FeatureLayer, LayerError,
    OverlayRegistry, ProximityQueryEngine, QuerySpec, Reconciliation, ReconcileOutcome,
    RetryPolicy, SkipReason, StrategyRegistry,
};
use infra_core::{LabelStrategy, ProximityConfig, ScoreStrategy};
use infra_types::{
    AffectedLayerBinding, BindingTarget, EditEvent, FeatureCollection, FeatureRecord, Geometry,
    LayerId, LayerMetadata, OverlayEvent,
};
use serde_json::Value;

struct MemoryLayer {
    id: LayerId,
    title: String,
    editable: bool,
    metadata: LayerMetadata,
    features: Vec<FeatureRecord>,
    queries: AtomicUsize,
    fail_queries: bool,
    applied: Mutex<Vec<EditBatch>>,
}

impl MemoryLayer {
    fn new(id: &str, editable: bool, points: &[(i64, f64, f64)]) -> Self {
        let features = points
            .iter()
            .map(|(oid, x, y)| {
                let mut feature = FeatureRecord::with_geometry(Geometry::point(*x, *y));
                feature.set_attribute("OBJECTID", Value::from(*oid));
                feature
            })
            .collect();
        Self {
            id: LayerId::new(id),
            title: id.to_uppercase(),
            editable,
            metadata: LayerMetadata {
                object_id_field: String::from("OBJECTID"),
                ..LayerMetadata::default()
            },
            features,
            queries: AtomicUsize::new(0),
            fail_queries: false,
            applied: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

fn xy(geometry: &Geometry) -> Option<(f64, f64)> {
    match geometry {
        Geometry::Point { coordinates } => Some((*coordinates.first()?, *coordinates.get(1)?)),
        _ => None,
    }
}

impl FeatureLayer for MemoryLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn editing_enabled(&self) -> bool {
        self.editable
    }

    fn metadata(&self) -> &LayerMetadata {
        &self.metadata
    }

    async fn query_features(&self, query: &QuerySpec) -> Result<FeatureCollection, LayerError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(LayerError::Upstream(String::from("query failed")));
        }
        let matches = self
            .features
            .iter()
            .filter(|feature| {
                if !query.object_ids.is_empty() {
                    return feature
                        .object_id("OBJECTID")
                        .is_some_and(|oid| query.object_ids.contains(&oid));
                }
                let (Some(center), Some(distance)) =
                    (query.geometry.as_ref().and_then(xy), query.distance)
                else {
                    return true;
                };
                feature
                    .geometry
                    .as_ref()
                    .and_then(xy)
                    .is_some_and(|(x, y)| (x - center.0).hypot(y - center.1) <= distance)
            })
            .cloned()
            .collect();
        Ok(FeatureCollection::new(matches))
    }

    async fn apply_edits(&self, edits: &EditBatch) -> Result<EditResult, LayerError> {
        if !self.editable {
            return Err(LayerError::Unsupported(String::from("editing disabled")));
        }
        self.applied.lock().unwrap().push(edits.clone());
        Ok(EditResult {
            added: edits.add_features.len(),
            failed: 0,
        })
    }
}

fn dispatcher(layers: Vec<MemoryLayer>) -> EditReactionDispatcher<MemoryLayer> {
    let mut dispatcher = EditReactionDispatcher::new(
        StrategyRegistry::with_builtins(ScoreStrategy::default(), LabelStrategy::default()),
        ProximityQueryEngine::new(&ProximityConfig {
            retry: RetryPolicy::none(),
            ..ProximityConfig::default()
        }),
        Arc::new(OverlayRegistry::default()),
    );
    for layer in layers {
        dispatcher.register_layer(layer);
    }
    dispatcher
}

fn binding(source: &str, targets: &[(&str, &str)]) -> AffectedLayerBinding {
    AffectedLayerBinding {
        source_layer_id: LayerId::new(source),
        targets: targets
            .iter()
            .map(|(layer, strategy)| BindingTarget {
                layer_id: LayerId::new(*layer),
                strategy: (*strategy).to_owned(),
            })
            .collect(),
    }
}

fn added_at(source: &str, points: &[(f64, f64)]) -> EditEvent {
    let mut event = EditEvent::new(source);
    event.added_features = Some(
        points
            .iter()
            .map(|(x, y)| FeatureRecord::with_geometry(Geometry::point(*x, *y)))
            .collect(),
    );
    event
}

fn standard_layers() -> Vec<MemoryLayer> {
    vec![
        MemoryLayer::new("trees", true, &[(1, 0.0, 0.0)]),
        // Read-only neighbourhood scores: two near the origin, one far away.
        MemoryLayer::new("buurten", false, &[(10, 5.0, 0.0), (11, 0.0, 15.0), (12, 500.0, 0.0)]),
        // Editable building labels.
        MemoryLayer::new("panden", true, &[(20, 3.0, 4.0), (21, 100.0, 100.0)]),
    ]
}

#[tokio::test]
async fn empty_event_invokes_nothing() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];
    let mut events = dispatcher.overlays().subscribe();

    let mut event = EditEvent::new("trees");
    event.added_features = Some(Vec::new());
    event.updated_features = Some(Vec::new());
    event.deleted_features = Some(Vec::new());

    let report = dispatcher.dispatch(&event, &bindings).await.unwrap();
    assert!(report.invocations.is_empty());
    assert!(dispatcher.overlays().is_empty().await);
    assert_eq!(dispatcher.layer(&LayerId::new("buurten")).unwrap().query_count(), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn unbound_source_is_a_no_op() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];
    let report = dispatcher
        .dispatch(&added_at("panden", &[(0.0, 0.0)]), &bindings)
        .await
        .unwrap();
    assert!(report.invocations.is_empty());
    assert!(dispatcher.overlays().is_empty().await);
}

#[tokio::test]
async fn non_editable_target_gets_overlay_with_score() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];

    let report = dispatcher
        .dispatch(&added_at("trees", &[(0.0, 0.0)]), &bindings)
        .await
        .unwrap();
    assert_eq!(report.invocations.len(), 1);
    let outcome = &report.invocations[0];
    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.strategy, "300Rule");
    assert!(matches!(
        outcome.reconciliation,
        Reconciliation::Overlay(ReconcileOutcome::Created { .. })
    ));

    let overlay = dispatcher
        .overlays()
        .snapshot(&LayerId::new("buurten"))
        .await
        .unwrap();
    assert_eq!(overlay.title, "BUURTEN (aangepast)");
    assert_eq!(overlay.features.len(), 2);
    assert!(
        overlay
            .features
            .iter()
            .all(|f| f.attributes.get("TOTAAL_SCORE") == Some(&Value::from(10)))
    );
}

#[tokio::test]
async fn editable_target_gets_server_edit_with_label() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("panden", "energielabels")])];

    let report = dispatcher
        .dispatch(&added_at("trees", &[(0.0, 0.0)]), &bindings)
        .await
        .unwrap();
    assert_eq!(
        report.invocations[0].reconciliation,
        Reconciliation::ServerEdit { added: 1, failed: 0 }
    );
    assert!(dispatcher.overlays().is_empty().await);

    let panden = dispatcher.layer(&LayerId::new("panden")).unwrap();
    let applied = panden.applied.lock().unwrap();
    assert_eq!(applied.len(), 1);
    let feature = &applied[0].add_features[0];
    assert_eq!(feature.object_id("OBJECTID"), Some(20));
    assert_eq!(
        feature.attributes.get("Meest_voorkomende_label"),
        Some(&Value::from("A"))
    );
}

#[tokio::test]
async fn repeated_edits_accumulate_in_overlay() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];

    dispatcher
        .dispatch(&added_at("trees", &[(0.0, 0.0)]), &bindings)
        .await
        .unwrap();
    dispatcher
        .dispatch(&added_at("trees", &[(1.0, 0.0)]), &bindings)
        .await
        .unwrap();

    let overlay = dispatcher
        .overlays()
        .snapshot(&LayerId::new("buurten"))
        .await
        .unwrap();
    // Same two neighbourhoods matched twice; no deduplication.
    assert_eq!(overlay.features.len(), 4);
    assert_eq!(dispatcher.overlays().len().await, 1);
}

#[tokio::test]
async fn one_query_per_reference_geometry() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];

    let report = dispatcher
        .dispatch(
            &added_at("trees", &[(0.0, 0.0), (500.0, 5.0), (9_000.0, 0.0)]),
            &bindings,
        )
        .await
        .unwrap();
    let buurten = dispatcher.layer(&LayerId::new("buurten")).unwrap();
    assert_eq!(buurten.query_count(), 3);
    assert_eq!(report.invocations[0].matched, 3);
}

#[tokio::test]
async fn no_matches_skips_reconciliation() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];
    let report = dispatcher
        .dispatch(&added_at("trees", &[(-9_000.0, -9_000.0)]), &bindings)
        .await
        .unwrap();
    assert_eq!(report.invocations[0].reconciliation, Reconciliation::NoMatches);
    assert!(dispatcher.overlays().is_empty().await);
}

#[tokio::test]
async fn failed_batch_reconciles_nothing() {
    let mut layers = standard_layers();
    layers.push(MemoryLayer::new("kapot", false, &[(30, 0.0, 0.0)]).failing());
    let dispatcher = dispatcher(layers);
    let bindings = vec![binding("trees", &[("kapot", "300Rule")])];

    let err = dispatcher
        .dispatch(&added_at("trees", &[(0.0, 0.0), (1.0, 1.0)]), &bindings)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Query(_)));
    assert!(dispatcher.overlays().is_empty().await);
}

#[tokio::test]
async fn unknown_strategy_and_layer_are_skipped() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding(
        "trees",
        &[("buurten", "nonsense"), ("ghost", "300Rule"), ("panden", "energielabels")],
    )];
    let report = dispatcher
        .dispatch(&added_at("trees", &[(0.0, 0.0)]), &bindings)
        .await
        .unwrap();
    assert_eq!(report.invocations.len(), 1);
    let reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![SkipReason::UnknownStrategy, SkipReason::UnknownLayer]);
}

#[tokio::test]
async fn geometry_less_edits_resolve_from_source_layer() {
    let dispatcher = dispatcher(standard_layers());
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];

    let mut event = EditEvent::new("trees");
    let mut updated = FeatureRecord::default();
    updated.set_attribute("OBJECTID", Value::from(1));
    event.updated_features = Some(vec![updated]);

    let report = dispatcher.dispatch(&event, &bindings).await.unwrap();
    let trees = dispatcher.layer(&LayerId::new("trees")).unwrap();
    assert_eq!(trees.query_count(), 1);
    assert_eq!(report.invocations[0].matched, 2);
}

#[tokio::test]
async fn empty_resolved_geometry_matches_nothing() {
    let mut layers = standard_layers();
    layers[0].features[0].geometry = Some(Geometry::Point { coordinates: vec![] });
    let dispatcher = dispatcher(layers);
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];

    let mut event = EditEvent::new("trees");
    let mut updated = FeatureRecord::default();
    updated.set_attribute("OBJECTID", Value::from(1));
    event.updated_features = Some(vec![updated]);

    let report = dispatcher.dispatch(&event, &bindings).await.unwrap();
    assert_eq!(report.invocations[0].matched, 0);
    assert_eq!(report.invocations[0].reconciliation, Reconciliation::NoMatches);
    assert_eq!(dispatcher.layer(&LayerId::new("buurten")).unwrap().query_count(), 0);
    assert!(dispatcher.overlays().is_empty().await);
}

#[tokio::test]
async fn overlay_creation_is_published() {
    let dispatcher = dispatcher(standard_layers());
    let mut events = dispatcher.overlays().subscribe();
    let bindings = vec![binding("trees", &[("buurten", "300Rule")])];
    dispatcher
        .dispatch(&added_at("trees", &[(0.0, 0.0)]), &bindings)
        .await
        .unwrap();
    match events.recv().await.unwrap() {
        OverlayEvent::Attached { overlay } => {
            assert_eq!(overlay.target_layer_id.as_str(), "buurten");
            assert_eq!(overlay.feature_count, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
}
