use serde::{Deserialize, Serialize};
use sruja_layout::config::parse_config;
use sruja_layout::ir::{C4Level, GraphEdge, GraphNode};
use sruja_layout::layout::{EngineKind, LayoutDirection, LayoutOptions};
use sruja_layout::orchestrator::fallback_output;
use sruja_layout::{Architecture, Config, ViewState, select_layout_config, to_graph};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WasmLayoutOptions {
    level: Option<String>,
    focused_system_id: Option<String>,
    focused_container_id: Option<String>,
    #[serde(default)]
    expanded: Vec<String>,
    /// Same shape as the CLI config file.
    config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WasmLayoutResult {
    engine: EngineKind,
    direction: LayoutDirection,
    degraded: bool,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

fn build_view(options: &WasmLayoutOptions) -> Result<ViewState, String> {
    let level = match options.level.as_deref() {
        Some(token) => C4Level::from_token(token).ok_or_else(|| format!("unknown level `{token}`"))?,
        None => C4Level::L1,
    };
    let mut view = ViewState::new(level);
    view.focused_system_id = options.focused_system_id.clone();
    view.focused_container_id = options.focused_container_id.clone();
    view.expanded = options.expanded.iter().cloned().collect();
    Ok(view)
}

fn layout_json(arch_json: &str, options: WasmLayoutOptions) -> Result<String, String> {
    let arch = Architecture::from_json(arch_json).map_err(|error| error.to_string())?;
    let config = match &options.config {
        Some(value) => parse_config(&value.to_string()).map_err(|error| error.to_string())?,
        None => Config::default(),
    };
    let view = build_view(&options)?;
    let graph = to_graph(&arch, &view, &config.layout.sizes);
    let selection = select_layout_config(
        &graph.nodes,
        &graph.edges,
        view.level,
        view.focused_system_id.as_deref(),
        view.focused_container_id.as_deref(),
        &view.expanded,
        &config.rules,
    );
    let layout_options = LayoutOptions::from_config(
        &config.layout,
        selection.direction,
        selection.options.enterprise_boundary,
    );

    let (output, degraded) = match selection.engine.engine().compute_layout(
        graph.nodes.clone(),
        graph.edges.clone(),
        &layout_options,
    ) {
        Ok(output) => (output, false),
        Err(_) => (fallback_output(graph.nodes, graph.edges), true),
    };
    let result = WasmLayoutResult {
        engine: selection.engine,
        direction: selection.direction,
        degraded,
        nodes: output.nodes,
        edges: output.edges,
    };
    serde_json::to_string(&result).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_architecture(arch_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<WasmLayoutOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        WasmLayoutOptions::default()
    };
    layout_json(arch_json, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{WasmLayoutOptions, layout_json};

    const ARCH: &str = r#"{
      "persons": [{"id": "customer", "external": true}],
      "systems": [
        {"id": "shop", "containers": [{"id": "web"}, {"id": "api"}]},
        {"id": "bank", "external": true}
      ],
      "relations": [
        {"from": "customer", "to": "shop.web"},
        {"from": "shop.web", "to": "shop.api"},
        {"from": "shop.api", "to": "bank"}
      ]
    }"#;

    #[test]
    fn lays_out_context_view_with_boundary() {
        let json = layout_json(ARCH, WasmLayoutOptions::default()).expect("layout should succeed");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["engine"], "sruja");
        assert_eq!(value["degraded"], false);
        let nodes = value["nodes"].as_array().unwrap();
        assert!(nodes.iter().any(|node| node["id"] == "__enterprise_boundary__"));
    }

    #[test]
    fn rejects_unknown_level() {
        let options = WasmLayoutOptions {
            level: Some("L9".to_string()),
            ..WasmLayoutOptions::default()
        };
        assert!(layout_json(ARCH, options).is_err());
    }
}
