use crate::ir::{NodeKind, Size};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSizeConfig {
    pub person: Size,
    pub system: Size,
    pub container: Size,
    pub component: Size,
    pub datastore: Size,
    pub queue: Size,
    pub boundary: Size,
}

impl Default for NodeSizeConfig {
    fn default() -> Self {
        Self {
            person: Size::new(180.0, 140.0),
            system: Size::new(240.0, 130.0),
            container: Size::new(220.0, 120.0),
            component: Size::new(200.0, 100.0),
            datastore: Size::new(200.0, 110.0),
            queue: Size::new(200.0, 90.0),
            boundary: Size::new(240.0, 130.0),
        }
    }
}

impl NodeSizeConfig {
    pub fn for_kind(&self, kind: NodeKind) -> Size {
        match kind {
            NodeKind::Person => self.person,
            NodeKind::System => self.system,
            NodeKind::Container => self.container,
            NodeKind::Component => self.component,
            NodeKind::Datastore => self.datastore,
            NodeKind::Queue => self.queue,
            NodeKind::Boundary => self.boundary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub frame_padding: f32,
    pub frame_header: f32,
    pub order_passes: usize,
    /// Gap between existing content and a block of newly revealed nodes.
    pub incremental_gap: f32,
    pub sizes: NodeSizeConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 50.0,
            rank_spacing: 80.0,
            frame_padding: 24.0,
            frame_header: 36.0,
            order_passes: 4,
            incremental_gap: 60.0,
            sizes: NodeSizeConfig::default(),
        }
    }
}

/// Cutoffs used by the rule selector when choosing an engine and direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    pub flat_max_nodes: usize,
    pub cross_group_ratio: f32,
    pub wide_rank_nodes: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            flat_max_nodes: 12,
            cross_group_ratio: 1.0,
            wide_rank_nodes: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerThresholds {
    pub max_inline_nodes: usize,
    pub max_inline_edges: usize,
}

impl Default for WorkerThresholds {
    fn default() -> Self {
        Self {
            max_inline_nodes: 80,
            max_inline_edges: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            padding: 40.0,
            min_zoom: 0.1,
            max_zoom: 1.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub rules: RuleThresholds,
    pub worker: WorkerThresholds,
    pub viewport: ViewportConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    rules: Option<RulesConfigFile>,
    worker: Option<WorkerConfigFile>,
    viewport: Option<ViewportConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    frame_padding: Option<f32>,
    frame_header: Option<f32>,
    order_passes: Option<usize>,
    incremental_gap: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RulesConfigFile {
    flat_max_nodes: Option<usize>,
    cross_group_ratio: Option<f32>,
    wide_rank_nodes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WorkerConfigFile {
    max_inline_nodes: Option<usize>,
    max_inline_edges: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ViewportConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    padding: Option<f32>,
    min_zoom: Option<f32>,
    max_zoom: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    let mut config = Config::default();

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.rank_spacing {
            config.layout.rank_spacing = v;
        }
        if let Some(v) = layout.frame_padding {
            config.layout.frame_padding = v;
        }
        if let Some(v) = layout.frame_header {
            config.layout.frame_header = v;
        }
        if let Some(v) = layout.order_passes {
            config.layout.order_passes = v;
        }
        if let Some(v) = layout.incremental_gap {
            config.layout.incremental_gap = v;
        }
    }

    if let Some(rules) = parsed.rules {
        if let Some(v) = rules.flat_max_nodes {
            config.rules.flat_max_nodes = v;
        }
        if let Some(v) = rules.cross_group_ratio {
            config.rules.cross_group_ratio = v;
        }
        if let Some(v) = rules.wide_rank_nodes {
            config.rules.wide_rank_nodes = v;
        }
    }

    if let Some(worker) = parsed.worker {
        if let Some(v) = worker.max_inline_nodes {
            config.worker.max_inline_nodes = v;
        }
        if let Some(v) = worker.max_inline_edges {
            config.worker.max_inline_edges = v;
        }
    }

    if let Some(viewport) = parsed.viewport {
        if let Some(v) = viewport.width {
            config.viewport.width = v;
        }
        if let Some(v) = viewport.height {
            config.viewport.height = v;
        }
        if let Some(v) = viewport.padding {
            config.viewport.padding = v;
        }
        if let Some(v) = viewport.min_zoom {
            config.viewport.min_zoom = v;
        }
        if let Some(v) = viewport.max_zoom {
            config.viewport.max_zoom = v;
        }
    }

    if config.viewport.min_zoom > config.viewport.max_zoom {
        anyhow::bail!(
            "viewport.minZoom ({}) exceeds viewport.maxZoom ({})",
            config.viewport.min_zoom,
            config.viewport.max_zoom
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_overrides_keep_defaults() {
        let config = parse_config(
            r#"{"layout":{"nodeSpacing":12},"worker":{"maxInlineNodes":10}}"#,
        )
        .unwrap();
        assert_eq!(config.layout.node_spacing, 12.0);
        assert_eq!(config.layout.rank_spacing, LayoutConfig::default().rank_spacing);
        assert_eq!(config.worker.max_inline_nodes, 10);
        assert_eq!(config.worker.max_inline_edges, 120);
    }

    #[test]
    fn rejects_inverted_zoom_range() {
        assert!(parse_config(r#"{"viewport":{"minZoom":3,"maxZoom":1}}"#).is_err());
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.rules.flat_max_nodes, 12);
    }
}
