use std::collections::BTreeMap;

use crate::ir::{C4Level, GraphNode, NodeKind, Point, Size};

use super::ranking::{is_virtual, ordered_ranks};
use super::{LayoutEngine, LayoutOptions, ScopeInput};

pub const ENTERPRISE_BOUNDARY_ID: &str = "__enterprise_boundary__";
const ENTERPRISE_BOUNDARY_LABEL: &str = "Enterprise Boundary";

/// Compound placement: each scope is packed into a grid so nested boundary
/// frames stay compact. Optionally wraps internal top-level nodes in a
/// synthetic enterprise boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompoundEngine;

impl LayoutEngine for CompoundEngine {
    fn prepare_nodes(&self, mut nodes: Vec<GraphNode>, options: &LayoutOptions) -> Vec<GraphNode> {
        if !options.enterprise_boundary
            || nodes.iter().any(|node| node.id == ENTERPRISE_BOUNDARY_ID)
        {
            return nodes;
        }
        let is_top_level_internal =
            |node: &GraphNode| node.parent_id.is_none() && !node.is_external;
        let internal = nodes.iter().filter(|node| is_top_level_internal(node)).count();
        let external = nodes
            .iter()
            .filter(|node| node.parent_id.is_none() && node.is_external)
            .count();
        if internal == 0 || external == 0 {
            return nodes;
        }

        for node in nodes.iter_mut() {
            if is_top_level_internal(node) {
                node.parent_id = Some(ENTERPRISE_BOUNDARY_ID.to_string());
            }
        }
        nodes.push(GraphNode {
            id: ENTERPRISE_BOUNDARY_ID.to_string(),
            label: ENTERPRISE_BOUNDARY_LABEL.to_string(),
            kind: NodeKind::Boundary,
            parent_id: None,
            level: C4Level::L1,
            is_external: false,
            child_count: internal,
            expanded: true,
            technology: None,
            position: Point::default(),
            size: Size::default(),
        });
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    fn arrange(&self, scope: &ScopeInput, options: &LayoutOptions) -> BTreeMap<String, Point> {
        let order: Vec<String> = ordered_ranks(&scope.members, &scope.edges, options.order_passes)
            .into_iter()
            .flatten()
            .filter(|id| !is_virtual(id))
            .collect();
        let count = order.len();
        if count == 0 {
            return BTreeMap::new();
        }
        let per_line = (count as f32).sqrt().ceil() as usize;
        let lines = count.div_ceil(per_line);
        let horizontal = options.direction.is_horizontal();

        // Row-major for vertical flow, column-major for horizontal flow.
        let cell = |idx: usize| -> (usize, usize) {
            if horizontal {
                (idx % per_line, idx / per_line)
            } else {
                (idx / per_line, idx % per_line)
            }
        };
        let (rows, cols) = if horizontal {
            (per_line, lines)
        } else {
            (lines, per_line)
        };

        let mut row_heights = vec![0.0f32; rows];
        let mut col_widths = vec![0.0f32; cols];
        for (idx, id) in order.iter().enumerate() {
            let (row, col) = cell(idx);
            let size = scope.size_of(id);
            row_heights[row] = row_heights[row].max(size.height);
            col_widths[col] = col_widths[col].max(size.width);
        }

        let (row_gap, col_gap) = if horizontal {
            (options.node_spacing, options.rank_spacing)
        } else {
            (options.rank_spacing, options.node_spacing)
        };
        let offsets = |extents: &[f32], gap: f32| -> Vec<f32> {
            let mut out = Vec::with_capacity(extents.len());
            let mut cursor = 0.0f32;
            for extent in extents {
                out.push(cursor);
                cursor += extent + gap;
            }
            out
        };
        let row_y = offsets(&row_heights, row_gap);
        let col_x = offsets(&col_widths, col_gap);
        let total_width = col_x.last().copied().unwrap_or(0.0) + col_widths.last().copied().unwrap_or(0.0);
        let total_height = row_y.last().copied().unwrap_or(0.0) + row_heights.last().copied().unwrap_or(0.0);

        let mut placed = BTreeMap::new();
        for (idx, id) in order.iter().enumerate() {
            let (row, col) = cell(idx);
            let size = scope.size_of(id);
            let mut x = col_x[col];
            let mut y = row_y[row];
            match options.direction {
                super::LayoutDirection::Up => y = total_height - y - size.height,
                super::LayoutDirection::Left => x = total_width - x - size.width,
                _ => {}
            }
            placed.insert(id.clone(), Point::new(x, y));
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_support::{edge, node};

    fn boundary_options() -> LayoutOptions {
        LayoutOptions {
            enterprise_boundary: true,
            ..LayoutOptions::default()
        }
    }

    #[test]
    fn wraps_internal_nodes_when_externals_exist() {
        let mut customer = node("customer", None);
        customer.is_external = true;
        let nodes = vec![customer, node("shop", None), node("erp", None)];
        let output = CompoundEngine
            .compute_layout(nodes, vec![edge("customer", "shop")], &boundary_options())
            .unwrap();
        let boundary = output
            .nodes
            .iter()
            .find(|n| n.id == ENTERPRISE_BOUNDARY_ID)
            .unwrap();
        assert_eq!(boundary.kind, NodeKind::Boundary);
        assert_eq!(boundary.child_count, 2);
        let shop = output.nodes.iter().find(|n| n.id == "shop").unwrap();
        assert_eq!(shop.parent_id.as_deref(), Some(ENTERPRISE_BOUNDARY_ID));
        let customer = output.nodes.iter().find(|n| n.id == "customer").unwrap();
        assert!(customer.parent_id.is_none());
        assert!(!customer.rect().intersects(&boundary.rect()));
    }

    #[test]
    fn no_boundary_without_externals() {
        let nodes = vec![node("shop", None), node("erp", None)];
        let output = CompoundEngine
            .compute_layout(nodes, Vec::new(), &boundary_options())
            .unwrap();
        assert_eq!(output.nodes.len(), 2);
    }

    #[test]
    fn grid_cells_do_not_overlap() {
        let members: Vec<String> = (0..7).map(|i| format!("n{i}")).collect();
        let sizes = members
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), Size::new(80.0 + 10.0 * i as f32, 40.0 + 5.0 * i as f32)))
            .collect();
        let scope = ScopeInput {
            members: members.clone(),
            sizes,
            edges: Vec::new(),
        };
        let placed = CompoundEngine.arrange(&scope, &LayoutOptions::default());
        assert_eq!(placed.len(), 7);
        let rects: Vec<_> = members
            .iter()
            .map(|id| {
                let p = placed[id];
                let s = scope.size_of(id);
                crate::ir::Rect::new(p.x, p.y, s.width, s.height)
            })
            .collect();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b));
            }
        }
    }
}
