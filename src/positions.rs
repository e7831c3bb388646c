use std::collections::HashMap;

use crate::ir::{GraphEdge, GraphNode, Point, Rect};

/// Geometry remembered between layout passes.
///
/// Entries are only ever dropped by [`PositionStore::clear`]; a node that
/// disappears and later comes back with the same id gets its old box back.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    rects: HashMap<String, Rect>,
    routes: HashMap<String, Vec<Point>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
        self.routes.clear();
    }

    pub fn update_from_nodes(&mut self, nodes: &[GraphNode]) {
        for node in nodes {
            self.rects.insert(node.id.clone(), node.rect());
        }
    }

    pub fn get(&self, id: &str) -> Option<Rect> {
        self.rects.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rects.contains_key(id)
    }

    /// Records the routed points of every edge that has them.
    pub fn update_routes(&mut self, edges: &[GraphEdge]) {
        for edge in edges {
            if let Some(points) = &edge.points {
                self.routes.insert(edge.id.clone(), points.clone());
            }
        }
    }

    pub fn route(&self, edge_id: &str) -> Option<&[Point]> {
        self.routes.get(edge_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}
