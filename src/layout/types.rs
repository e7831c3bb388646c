use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::ir::{GraphEdge, GraphNode, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Compound layout with boundary containers.
    Sruja,
    /// Layered layout by C4 level.
    C4Level,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sruja => "sruja",
            Self::C4Level => "c4level",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayoutDirection {
    Up,
    Down,
    Left,
    Right,
}

impl LayoutDirection {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Flow runs towards smaller coordinates.
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::Up | Self::Left)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    pub direction: LayoutDirection,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub frame_padding: f32,
    pub frame_header: f32,
    pub order_passes: usize,
    pub incremental_gap: f32,
    /// Wrap internal top-level nodes in a synthetic enterprise boundary.
    pub enterprise_boundary: bool,
}

impl LayoutOptions {
    pub fn from_config(
        config: &LayoutConfig,
        direction: LayoutDirection,
        enterprise_boundary: bool,
    ) -> Self {
        Self {
            direction,
            node_spacing: config.node_spacing,
            rank_spacing: config.rank_spacing,
            frame_padding: config.frame_padding,
            frame_header: config.frame_header,
            order_passes: config.order_passes,
            incremental_gap: config.incremental_gap,
            enterprise_boundary,
        }
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default(), LayoutDirection::Down, false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutOutput {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Sibling set handed to an engine's scope arranger.
#[derive(Debug, Clone)]
pub struct ScopeInput {
    pub members: Vec<String>,
    pub sizes: BTreeMap<String, Size>,
    /// Edges lifted onto `members`, deduplicated, without self loops.
    pub edges: Vec<(String, String)>,
}

impl ScopeInput {
    pub fn size_of(&self, id: &str) -> Size {
        self.sizes.get(id).copied().unwrap_or_default()
    }
}
