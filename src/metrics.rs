use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ir::{GraphEdge, GraphNode, Rect};
use crate::layout::EngineKind;
use crate::layout::routing::{path_length, segments_cross};

/// Quality and timing figures for one committed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub edge_crossings: usize,
    /// Pairs of siblings whose boxes intersect. Zero after any full layout.
    pub sibling_overlaps: usize,
    pub total_edge_length: f32,
    pub bounds: Rect,
    pub duration_ms: f64,
    pub engine: EngineKind,
    pub incremental: bool,
}

impl LayoutMetrics {
    pub fn measure(
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        engine: EngineKind,
        incremental: bool,
        duration: Duration,
    ) -> Self {
        Self {
            node_count: nodes.len(),
            edge_count: edges.len(),
            edge_crossings: count_crossings(edges),
            sibling_overlaps: count_sibling_overlaps(nodes),
            total_edge_length: edges
                .iter()
                .filter_map(|edge| edge.points.as_deref())
                .map(path_length)
                .sum(),
            bounds: bounds(nodes),
            duration_ms: duration.as_secs_f64() * 1000.0,
            engine,
            incremental,
        }
    }
}

pub fn bounds(nodes: &[GraphNode]) -> Rect {
    nodes
        .iter()
        .map(GraphNode::rect)
        .reduce(|acc, rect| acc.union(&rect))
        .unwrap_or_default()
}

fn count_crossings(edges: &[GraphEdge]) -> usize {
    let paths: Vec<_> = edges
        .iter()
        .filter_map(|edge| edge.points.as_deref())
        .filter(|points| points.len() >= 2)
        .collect();
    let mut crossings = 0;
    for (idx, a) in paths.iter().enumerate() {
        for b in &paths[idx + 1..] {
            let crosses = a.windows(2).any(|sa| {
                b.windows(2)
                    .any(|sb| segments_cross(sa[0], sa[1], sb[0], sb[1]))
            });
            if crosses {
                crossings += 1;
            }
        }
    }
    crossings
}

fn count_sibling_overlaps(nodes: &[GraphNode]) -> usize {
    let mut scopes: BTreeMap<Option<&str>, Vec<Rect>> = BTreeMap::new();
    for node in nodes {
        scopes
            .entry(node.parent_id.as_deref())
            .or_default()
            .push(node.rect());
    }
    scopes
        .values()
        .map(|rects| {
            rects
                .iter()
                .enumerate()
                .map(|(idx, a)| rects[idx + 1..].iter().filter(|b| a.intersects(b)).count())
                .sum::<usize>()
        })
        .sum()
}
