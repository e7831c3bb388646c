use crate::ir::{InteractionKind, NodeKind};
use crate::metrics::LayoutMetrics;
use crate::orchestrator::{LayoutDecision, LayoutReport};
use crate::viewport::ViewTransform;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub generation: u64,
    pub engine: String,
    pub direction: String,
    pub incremental: bool,
    pub degraded: bool,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub metrics: LayoutMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewTransform>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<String>,
    pub external: bool,
    pub expanded: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub interaction: InteractionKind,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_report(report: &LayoutReport) -> Self {
        let nodes = report
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                label: node.label.clone(),
                kind: node.kind,
                parent: node.parent_id.clone(),
                external: node.is_external,
                expanded: node.expanded,
                x: node.position.x,
                y: node.position.y,
                width: node.size.width,
                height: node.size.height,
            })
            .collect();

        let edges = report
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.source.clone(),
                to: edge.target.clone(),
                label: edge.label.clone(),
                interaction: edge.interaction_kind,
                points: edge
                    .points
                    .iter()
                    .flatten()
                    .map(|point| [point.x, point.y])
                    .collect(),
            })
            .collect();

        let LayoutDecision {
            engine,
            direction,
            use_incremental,
            ..
        } = report.decision;
        let bounds = report.metrics.bounds;
        LayoutDump {
            generation: report.generation,
            engine: engine.as_str().to_string(),
            direction: format!("{direction:?}").to_uppercase(),
            incremental: use_incremental,
            degraded: report.degraded,
            width: bounds.right().max(0.0),
            height: bounds.bottom().max(0.0),
            nodes,
            edges,
            metrics: report.metrics.clone(),
            viewport: report.viewport,
        }
    }
}

pub fn write_layout_dump(path: &Path, report: &LayoutReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_report(report);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

pub fn layout_dump_string(report: &LayoutReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&LayoutDump::from_report(report))?)
}
