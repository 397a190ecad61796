//! Sublayer descriptors, layer trees and layer metadata.
//!
//! A map-image service reports its sublayers as a flat list of
//! [`LayerDescriptor`]s. The tree builder in `infra-core` turns that list
//! into a rooted [`LayerNode`] tree which the rendering collaborator
//! hydrates into renderable layers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// One sublayer as reported by a map-image service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LayerDescriptor {
    /// Sublayer id, unique within the service.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Parent sublayer id. `None` or a negative id means top level.
    #[serde(default, rename = "parentLayerId", alias = "parentId")]
    pub parent_id: Option<i64>,
    /// Raw service type string (`Group Layer`, `Feature Layer`, ...).
    #[serde(rename = "type")]
    pub layer_type: String,
    /// Esri geometry type of a leaf, if any.
    #[serde(default, rename = "geometryType")]
    pub geometry_type: Option<String>,
    /// Whether the sublayer is visible by default.
    #[serde(default = "default_visibility", rename = "defaultVisibility", alias = "visibility")]
    pub visible: bool,
}

const fn default_visibility() -> bool {
    true
}

/// Structural role of a descriptor in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// A container for other sublayers.
    Group,
    /// A sublayer that renders data.
    Leaf,
}

impl DescriptorKind {
    /// Classify a raw service type string.
    ///
    /// Returns `None` for types the tree builder does not know about.
    pub fn classify(layer_type: &str) -> Option<Self> {
        match layer_type.trim().to_ascii_lowercase().as_str() {
            "group" | "group layer" => Some(Self::Group),
            "leaf" | "feature layer" | "raster layer" | "annotation layer"
            | "annotation sublayer" | "dimension layer" => Some(Self::Leaf),
            _ => None,
        }
    }
}

impl LayerDescriptor {
    /// Structural role of this descriptor, if its type is recognized.
    pub fn kind(&self) -> Option<DescriptorKind> {
        DescriptorKind::classify(&self.layer_type)
    }

    /// Parent id, with negative ids normalized to `None`.
    pub fn parent(&self) -> Option<i64> {
        self.parent_id.filter(|id| *id >= 0)
    }
}

/// Kind of renderable layer a leaf hydrates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum LayerKind {
    /// A queryable feature layer.
    Feature,
    /// A ground elevation layer.
    Elevation,
    /// A 3D scene layer.
    Scene,
    /// A map-image layer with its own sublayers.
    MapImage,
}

impl LayerKind {
    /// Classify a service item by its title and service type.
    ///
    /// Elevation services are image services like any other, so the
    /// title is checked before the type.
    pub fn classify(title: &str, service_type: &str) -> Self {
        if title.to_uppercase().contains("ELEVATION") {
            return Self::Elevation;
        }
        match service_type {
            "Scene Service" => Self::Scene,
            "Map Service" => Self::MapImage,
            _ => Self::Feature,
        }
    }
}

/// How a layer is placed relative to the ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ElevationInfo {
    /// Placement mode, e.g. `on-the-ground` or `relative-to-ground`.
    pub mode: String,
    /// Unit of `offset`.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Vertical offset.
    #[serde(default)]
    pub offset: f64,
}

fn default_unit() -> String {
    String::from("meters")
}

impl Default for ElevationInfo {
    fn default() -> Self {
        Self {
            mode: String::from("on-the-ground"),
            unit: default_unit(),
            offset: 0.0,
        }
    }
}

/// Configuration a leaf placeholder carries until it is hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeafConfig {
    /// Sublayer id in the service.
    pub id: i64,
    /// Kind of layer to hydrate into.
    pub kind: LayerKind,
    /// Display title.
    pub title: String,
    /// Initial visibility.
    pub visible: bool,
    /// Ground placement.
    pub elevation_info: ElevationInfo,
    /// Renderer definition, passed through untouched.
    #[serde(default)]
    pub renderer: Option<Value>,
    /// Whether popups are enabled.
    pub popup_enabled: bool,
}

impl LeafConfig {
    /// The generated default configuration for a leaf descriptor.
    pub fn default_for(descriptor: &LayerDescriptor) -> Self {
        Self {
            id: descriptor.id,
            kind: LayerKind::classify(&descriptor.name, &descriptor.layer_type),
            title: descriptor.name.clone(),
            visible: descriptor.visible,
            elevation_info: ElevationInfo::default(),
            renderer: None,
            popup_enabled: true,
        }
    }
}

/// Per-sublayer configuration override. Every `Some` field wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeafOverride {
    /// Replacement layer kind.
    #[serde(default)]
    pub kind: Option<LayerKind>,
    /// Replacement title.
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement visibility.
    #[serde(default)]
    pub visible: Option<bool>,
    /// Replacement ground placement.
    #[serde(default)]
    pub elevation_info: Option<ElevationInfo>,
    /// Replacement renderer.
    #[serde(default)]
    pub renderer: Option<Value>,
    /// Replacement popup flag.
    #[serde(default)]
    pub popup_enabled: Option<bool>,
}

impl LeafOverride {
    /// Merge this override onto a leaf configuration.
    pub fn apply_to(&self, config: &mut LeafConfig) {
        if let Some(kind) = self.kind {
            config.kind = kind;
        }
        if let Some(title) = &self.title {
            config.title.clone_from(title);
        }
        if let Some(visible) = self.visible {
            config.visible = visible;
        }
        if let Some(elevation) = &self.elevation_info {
            config.elevation_info = elevation.clone();
        }
        if let Some(renderer) = &self.renderer {
            config.renderer = Some(renderer.clone());
        }
        if let Some(popup) = self.popup_enabled {
            config.popup_enabled = popup;
        }
    }
}

/// What a tree node stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum NodeKind {
    /// The synthetic root holding one service's sublayers.
    Root,
    /// A group sublayer.
    Group {
        /// Sublayer id.
        id: i64,
    },
    /// A leaf placeholder awaiting hydration.
    Leaf {
        /// Merged leaf configuration.
        config: LeafConfig,
    },
}

/// A node of a layer tree. Children are owned by their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LayerNode {
    /// Registry key, namespaced as `<root title> - <id>`; the root's key
    /// is its title.
    pub key: String,
    /// Display title.
    pub title: String,
    /// The role of this node.
    pub kind: NodeKind,
    /// Ordered children.
    pub children: Vec<LayerNode>,
}

impl LayerNode {
    /// Create an empty root node.
    pub fn root(title: &str) -> Self {
        Self {
            key: title.to_owned(),
            title: title.to_owned(),
            kind: NodeKind::Root,
            children: Vec::new(),
        }
    }

    /// Pre-order traversal: every parent is yielded before its children.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Number of nodes below this one (the node itself excluded).
    pub fn descendant_count(&self) -> usize {
        self.walk().count().saturating_sub(1)
    }

    /// Number of leaf nodes in the subtree.
    pub fn leaf_count(&self) -> usize {
        self.walk()
            .filter(|node| matches!(node.kind, NodeKind::Leaf { .. }))
            .count()
    }

    /// Number of group nodes in the subtree.
    pub fn group_count(&self) -> usize {
        self.walk()
            .filter(|node| matches!(node.kind, NodeKind::Group { .. }))
            .count()
    }

    /// Find a node by its registry key.
    pub fn find(&self, key: &str) -> Option<&Self> {
        self.walk().find(|node| node.key == key)
    }

    /// Leaf configurations in pre-order, ready for hydration.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafConfig> {
        self.walk().filter_map(|node| match &node.kind {
            NodeKind::Leaf { config } => Some(config),
            _ => None,
        })
    }
}

/// Pre-order iterator over a [`LayerNode`] tree.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a LayerNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a LayerNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// One field of a feature layer schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Human-readable alias.
    #[serde(default)]
    pub alias: Option<String>,
    /// Esri field type, e.g. `esriFieldTypeOID`.
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Non-geometric rendering metadata of a feature layer.
///
/// This is what a synthetic overlay copies from its target so that it
/// renders and pops up like the target layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LayerMetadata {
    /// Popup template definition.
    #[serde(default)]
    pub popup_template: Option<Value>,
    /// Renderer definition.
    #[serde(default)]
    pub renderer: Option<Value>,
    /// Name of the identity field.
    pub object_id_field: String,
    /// Field schema.
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    /// Ground placement.
    #[serde(default)]
    pub elevation_info: Option<ElevationInfo>,
}
