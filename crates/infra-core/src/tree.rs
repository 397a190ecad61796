//! Service tree builder.
//!
//! Expands the flat sublayer list of a map-image service into a rooted
//! [`LayerNode`] tree. The build runs in two passes so that the result
//! does not depend on descriptor order:
//!
//! 1. Index every recognized descriptor by id. Unknown types and
//!    duplicate ids are skipped with a [`TreeBuildWarning`].
//! 2. Resolve each descriptor's parent against the index and attach it.
//!    A parent that is missing, not a group, or part of a cycle falls
//!    back to the root.
//!
//! Leaves are placeholders carrying a merged [`LeafConfig`]; turning them
//! into renderable layers is left to the caller.

use std::collections::{BTreeMap, BTreeSet};

use infra_types::{DescriptorKind, LayerDescriptor, LayerNode, LeafConfig, LeafOverride, NodeKind};
use serde::Serialize;
use tracing::{info, warn};

/// A descriptor that was skipped or re-attached during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum TreeBuildWarning {
    /// The descriptor's type is not a known group or leaf type.
    #[error("sublayer {id} skipped: unknown type {layer_type:?}")]
    UnknownType {
        /// Sublayer id.
        id: i64,
        /// The unrecognized type string.
        layer_type: String,
    },

    /// A second descriptor reused an id; the first one was kept.
    #[error("sublayer {id} skipped: duplicate id")]
    DuplicateId {
        /// Sublayer id.
        id: i64,
    },

    /// Following parent links from this group led back to itself.
    #[error("sublayer {id} attached to root: parent chain forms a cycle")]
    ParentCycle {
        /// Sublayer id.
        id: i64,
    },
}

/// Result of a build: the tree plus every non-fatal warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeBuild {
    /// The rooted tree.
    pub root: LayerNode,
    /// Descriptors that were skipped or re-attached.
    pub warnings: Vec<TreeBuildWarning>,
}

/// Builds layer trees from flat sublayer descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceTreeBuilder;

impl ServiceTreeBuilder {
    /// Build the tree for one service.
    ///
    /// `overrides` is keyed by sublayer id and merged onto the generated
    /// default configuration of matching leaves. The build never fails;
    /// problems are reported in [`TreeBuild::warnings`].
    pub fn build(
        root_title: &str,
        descriptors: &[LayerDescriptor],
        overrides: &BTreeMap<i64, LeafOverride>,
    ) -> TreeBuild {
        let mut warnings = Vec::new();

        // Pass 1: index.
        let mut index: BTreeMap<i64, (&LayerDescriptor, DescriptorKind)> = BTreeMap::new();
        let mut order: Vec<i64> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let Some(kind) = descriptor.kind() else {
                warn!(
                    root = root_title,
                    id = descriptor.id,
                    layer_type = %descriptor.layer_type,
                    "skipping sublayer with unknown type"
                );
                warnings.push(TreeBuildWarning::UnknownType {
                    id: descriptor.id,
                    layer_type: descriptor.layer_type.clone(),
                });
                continue;
            };
            if index.contains_key(&descriptor.id) {
                warn!(root = root_title, id = descriptor.id, "skipping duplicate sublayer id");
                warnings.push(TreeBuildWarning::DuplicateId { id: descriptor.id });
                continue;
            }
            index.insert(descriptor.id, (descriptor, kind));
            order.push(descriptor.id);
        }

        // Resolve parents against groups only.
        let mut parents: BTreeMap<i64, Option<i64>> = order
            .iter()
            .filter_map(|id| index.get(id).map(|(descriptor, _)| (*id, descriptor.parent())))
            .map(|(id, parent)| {
                let parent = parent.filter(|pid| {
                    *pid != id
                        && index
                            .get(pid)
                            .is_some_and(|(_, kind)| *kind == DescriptorKind::Group)
                });
                (id, parent)
            })
            .collect();

        for id in &order {
            if reaches_itself(*id, &parents) {
                warn!(root = root_title, id = *id, "breaking parent cycle at sublayer");
                warnings.push(TreeBuildWarning::ParentCycle { id: *id });
                parents.insert(*id, None);
            }
        }

        // Pass 2: attach, preserving input order among siblings.
        let mut top_level: Vec<i64> = Vec::new();
        let mut children: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for id in &order {
            match parents.get(id).copied().flatten() {
                Some(parent) => children.entry(parent).or_default().push(*id),
                None => top_level.push(*id),
            }
        }

        let assembler = Assembler {
            root_title,
            index: &index,
            children: &children,
            overrides,
        };
        let mut root = LayerNode::root(root_title);
        root.children = top_level.iter().filter_map(|id| assembler.node(*id)).collect();

        info!(
            root = root_title,
            descriptors = descriptors.len(),
            groups = root.group_count(),
            leaves = root.leaf_count(),
            warnings = warnings.len(),
            "service tree built"
        );

        TreeBuild { root, warnings }
    }
}

/// Whether following parent links from `start` returns to `start`.
fn reaches_itself(start: i64, parents: &BTreeMap<i64, Option<i64>>) -> bool {
    let mut seen = BTreeSet::new();
    let mut current = parents.get(&start).copied().flatten();
    while let Some(id) = current {
        if id == start {
            return true;
        }
        if !seen.insert(id) {
            // A cycle further up that does not include `start`.
            return false;
        }
        current = parents.get(&id).copied().flatten();
    }
    false
}

struct Assembler<'a> {
    root_title: &'a str,
    index: &'a BTreeMap<i64, (&'a LayerDescriptor, DescriptorKind)>,
    children: &'a BTreeMap<i64, Vec<i64>>,
    overrides: &'a BTreeMap<i64, LeafOverride>,
}

impl Assembler<'_> {
    fn node(&self, id: i64) -> Option<LayerNode> {
        let (descriptor, kind) = self.index.get(&id)?;
        let key = format!("{} - {}", self.root_title, id);
        let node = match kind {
            DescriptorKind::Group => LayerNode {
                key,
                title: descriptor.name.clone(),
                kind: NodeKind::Group { id },
                children: self
                    .children
                    .get(&id)
                    .map(|ids| ids.iter().filter_map(|child| self.node(*child)).collect())
                    .unwrap_or_default(),
            },
            DescriptorKind::Leaf => {
                let mut config = LeafConfig::default_for(descriptor);
                if let Some(over) = self.overrides.get(&id) {
                    over.apply_to(&mut config);
                }
                LayerNode {
                    key,
                    title: config.title.clone(),
                    kind: NodeKind::Leaf { config },
                    children: Vec::new(),
                }
            }
        };
        Some(node)
    }
}
