mod compound;
mod error;
pub(crate) mod hierarchy;
mod incremental;
mod layered;
pub(crate) mod ranking;
pub(crate) mod routing;
mod types;

pub use compound::{CompoundEngine, ENTERPRISE_BOUNDARY_ID};
pub use error::LayoutError;
pub use incremental::{IncrementalOptions, apply_incremental_layout};
pub use layered::LayeredEngine;
pub use types::*;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::ir::{GraphEdge, GraphNode, Point, Rect, Size, retain_connected_edges};
use hierarchy::Hierarchy;
use routing::route_edge;

/// A full layout strategy.
///
/// Engines only decide how the direct children of one scope are arranged
/// relative to each other. Frame sizing, nesting and edge routing are shared,
/// so both strategies honour the same containment and spacing rules.
pub trait LayoutEngine: Send + Sync + std::fmt::Debug {
    /// Positions every member of `scope`. Returned points are top-left corners
    /// in an arbitrary local frame; members must not overlap.
    fn arrange(&self, scope: &ScopeInput, options: &LayoutOptions) -> BTreeMap<String, Point>;

    /// Hook for synthetic nodes the strategy needs before layout.
    fn prepare_nodes(&self, nodes: Vec<GraphNode>, _options: &LayoutOptions) -> Vec<GraphNode> {
        nodes
    }

    fn compute_layout(
        &self,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
        options: &LayoutOptions,
    ) -> Result<LayoutOutput, LayoutError> {
        let nodes = self.prepare_nodes(nodes, options);
        layout_hierarchy(self, nodes, edges, options)
    }
}

static LAYERED: LayeredEngine = LayeredEngine;
static COMPOUND: CompoundEngine = CompoundEngine;

impl EngineKind {
    pub fn engine(self) -> &'static dyn LayoutEngine {
        match self {
            Self::C4Level => &LAYERED,
            Self::Sruja => &COMPOUND,
        }
    }
}

pub(crate) fn layout_hierarchy<E: LayoutEngine + ?Sized>(
    engine: &E,
    mut nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    options: &LayoutOptions,
) -> Result<LayoutOutput, LayoutError> {
    let edges = retain_connected_edges(&nodes, edges);
    let hierarchy = Hierarchy::build(&nodes)?;
    let mut sizes: BTreeMap<String, Size> = nodes
        .iter()
        .map(|node| (node.id.clone(), node.size))
        .collect();
    let mut relative: BTreeMap<String, Point> = BTreeMap::new();
    layout_frames(
        engine,
        &hierarchy,
        |_| true,
        &mut sizes,
        &mut relative,
        &edges,
        options,
    );

    let (mut absolute, _) = arrange_block(
        engine,
        &hierarchy,
        None,
        hierarchy.roots(),
        &sizes,
        &edges,
        options,
    );

    let mut by_depth: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    by_depth.sort_by_key(|id| hierarchy.depth(id));
    for id in by_depth {
        let Some(parent) = hierarchy.parent(id) else {
            continue;
        };
        let (Some(origin), Some(offset)) = (absolute.get(parent).copied(), relative.get(id))
        else {
            continue;
        };
        absolute.insert(
            id.to_string(),
            Point::new(origin.x + offset.x, origin.y + offset.y),
        );
    }

    for node in &mut nodes {
        if let Some(position) = absolute.get(&node.id) {
            node.position = *position;
        }
        if let Some(size) = sizes.get(&node.id) {
            node.size = *size;
        }
    }
    let edges = route_edges(&nodes, edges, options.direction);
    Ok(LayoutOutput { nodes, edges })
}

/// Sizes every composite accepted by `include`, deepest first, and records
/// each child's offset from its parent's top-left corner in `relative`.
pub(crate) fn layout_frames<E, F>(
    engine: &E,
    hierarchy: &Hierarchy,
    include: F,
    sizes: &mut BTreeMap<String, Size>,
    relative: &mut BTreeMap<String, Point>,
    edges: &[GraphEdge],
    options: &LayoutOptions,
) where
    E: LayoutEngine + ?Sized,
    F: Fn(&str) -> bool,
{
    for parent in hierarchy.composites_bottom_up() {
        if !include(parent) {
            continue;
        }
        let (placed, content) = arrange_block(
            engine,
            hierarchy,
            Some(parent),
            hierarchy.children(parent),
            sizes,
            edges,
            options,
        );
        for (id, point) in placed {
            relative.insert(
                id,
                Point::new(
                    point.x + options.frame_padding,
                    point.y + options.frame_header,
                ),
            );
        }
        let collapsed = sizes.get(parent).copied().unwrap_or_default();
        sizes.insert(parent.to_string(), frame_size(content, collapsed, options));
    }
}

pub(crate) fn frame_size(content: Size, collapsed: Size, options: &LayoutOptions) -> Size {
    Size::new(
        (content.width + 2.0 * options.frame_padding).max(collapsed.width),
        (content.height + options.frame_header + options.frame_padding).max(collapsed.height),
    )
}

/// Arranges `members` of the scope owned by `parent` and normalises the
/// result so the block's top-left corner is the origin. Returns the block size.
pub(crate) fn arrange_block<E: LayoutEngine + ?Sized>(
    engine: &E,
    hierarchy: &Hierarchy,
    parent: Option<&str>,
    members: &[String],
    sizes: &BTreeMap<String, Size>,
    edges: &[GraphEdge],
    options: &LayoutOptions,
) -> (BTreeMap<String, Point>, Size) {
    if members.is_empty() {
        return (BTreeMap::new(), Size::default());
    }
    let scope = scope_input(hierarchy, parent, members, sizes, edges);
    let mut placed = engine.arrange(&scope, options);
    // Engines may skip ids they do not know; never lose a member.
    for id in members {
        placed.entry(id.clone()).or_default();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (id, point) in &placed {
        let size = scope.size_of(id);
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x + size.width);
        max_y = max_y.max(point.y + size.height);
    }
    for point in placed.values_mut() {
        point.x -= min_x;
        point.y -= min_y;
    }
    (placed, Size::new(max_x - min_x, max_y - min_y))
}

pub(crate) fn scope_input(
    hierarchy: &Hierarchy,
    parent: Option<&str>,
    members: &[String],
    sizes: &BTreeMap<String, Size>,
    edges: &[GraphEdge],
) -> ScopeInput {
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut lifted = Vec::new();
    for edge in edges {
        let (Some(from), Some(to)) = (
            hierarchy.ancestor_in_scope(&edge.source, parent),
            hierarchy.ancestor_in_scope(&edge.target, parent),
        ) else {
            continue;
        };
        if from == to || !member_set.contains(from) || !member_set.contains(to) {
            continue;
        }
        let pair = (from.to_string(), to.to_string());
        if seen.insert(pair.clone()) {
            lifted.push(pair);
        }
    }
    let mut sorted_members = members.to_vec();
    sorted_members.sort();
    ScopeInput {
        sizes: sorted_members
            .iter()
            .map(|id| (id.clone(), sizes.get(id).copied().unwrap_or_default()))
            .collect(),
        members: sorted_members,
        edges: lifted,
    }
}

pub(crate) fn route_edges(
    nodes: &[GraphNode],
    edges: Vec<GraphEdge>,
    direction: LayoutDirection,
) -> Vec<GraphEdge> {
    let rects: BTreeMap<&str, Rect> = nodes
        .iter()
        .map(|node| (node.id.as_str(), node.rect()))
        .collect();
    edges
        .into_iter()
        .filter_map(|mut edge| {
            let from = rects.get(edge.source.as_str())?;
            let to = rects.get(edge.target.as_str())?;
            edge.points = Some(route_edge(from, to, direction));
            Some(edge)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::ir::{C4Level, GraphEdge, GraphNode, InteractionKind, NodeKind, Point, Size};

    pub(crate) fn node(id: &str, parent: Option<&str>) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            label: id.to_string(),
            kind: if parent.is_some() {
                NodeKind::Container
            } else {
                NodeKind::System
            },
            parent_id: parent.map(str::to_string),
            level: if parent.is_some() {
                C4Level::L2
            } else {
                C4Level::L1
            },
            is_external: false,
            child_count: 0,
            expanded: false,
            technology: None,
            position: Point::default(),
            size: Size::new(120.0, 60.0),
        }
    }

    pub(crate) fn edge(from: &str, to: &str) -> GraphEdge {
        GraphEdge {
            id: format!("{from}->{to}#0"),
            source: from.to_string(),
            target: to.to_string(),
            label: None,
            technology: None,
            interaction_kind: InteractionKind::Sync,
            points: None,
        }
    }
}
