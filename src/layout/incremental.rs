use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ir::{GraphEdge, GraphNode, Point, Rect, Size, retain_connected_edges};
use crate::positions::PositionStore;

use super::hierarchy::Hierarchy;
use super::routing::route_edge;
use super::{EngineKind, LayoutError, LayoutOptions, LayoutOutput, arrange_block, layout_frames};

/// Growth below this is float noise from the previous pass, not new content.
const FIT_EPS: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalOptions {
    /// Engine of the last full layout; its scope arranger places new nodes.
    pub engine: EngineKind,
    pub layout: LayoutOptions,
}

/// Keeps every remembered node where it was and only places nodes the store
/// has never seen.
///
/// New nodes are grouped by their nearest remembered ancestor and packed into
/// that ancestor's content area after its existing children; new top-level
/// nodes go beside the current drawing. Remembered composites grow to fit but
/// never move.
pub fn apply_incremental_layout(
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    opts: &IncrementalOptions,
    store: &PositionStore,
) -> Result<LayoutOutput, LayoutError> {
    let engine = opts.engine.engine();
    let options = &opts.layout;
    let mut nodes = engine.prepare_nodes(nodes, options);
    let edges = retain_connected_edges(&nodes, edges);
    let hierarchy = Hierarchy::build(&nodes)?;

    let mut by_depth: Vec<String> = nodes.iter().map(|node| node.id.clone()).collect();
    by_depth.sort_by_key(|id| hierarchy.depth(id));

    let mut fresh: HashSet<String> = HashSet::new();
    for id in &by_depth {
        let parent_fresh = hierarchy
            .parent(id)
            .is_some_and(|parent| fresh.contains(parent));
        if parent_fresh || !store.contains(id) {
            fresh.insert(id.clone());
        }
    }

    let mut sizes: BTreeMap<String, Size> = BTreeMap::new();
    let mut absolute: BTreeMap<String, Point> = BTreeMap::new();
    for node in &nodes {
        match store.get(&node.id).filter(|_| !fresh.contains(&node.id)) {
            Some(rect) => {
                absolute.insert(node.id.clone(), Point::new(rect.x, rect.y));
                let size = if hierarchy.has_children(&node.id) {
                    Size::new(rect.width, rect.height)
                } else {
                    node.size
                };
                sizes.insert(node.id.clone(), size);
            }
            None => {
                sizes.insert(node.id.clone(), node.size);
            }
        }
    }

    let mut relative: BTreeMap<String, Point> = BTreeMap::new();
    layout_frames(
        engine,
        &hierarchy,
        |id| fresh.contains(id),
        &mut sizes,
        &mut relative,
        &edges,
        options,
    );

    let mut groups: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
    for id in &by_depth {
        if !fresh.contains(id) {
            continue;
        }
        let anchor = hierarchy.parent(id);
        if anchor.is_some_and(|parent| fresh.contains(parent)) {
            continue;
        }
        groups
            .entry(anchor.map(str::to_string))
            .or_default()
            .push(id.clone());
    }
    let mut groups: Vec<(Option<String>, Vec<String>)> = groups.into_iter().collect();
    // Deepest anchors first so outer frames see their grown children; the
    // top level goes last so it sees every grown frame.
    groups.sort_by_key(|(anchor, _)| {
        (
            anchor.is_none(),
            Reverse(anchor.as_deref().map_or(0, |id| hierarchy.depth(id))),
            anchor.clone(),
        )
    });

    fit_all_composites(&hierarchy, &fresh, &absolute, &mut sizes, options);
    for (anchor, members) in &groups {
        let (placed, _) = arrange_block(
            engine,
            &hierarchy,
            anchor.as_deref(),
            members,
            &sizes,
            &edges,
            options,
        );
        let origin = match anchor {
            Some(anchor) => anchored_origin(&hierarchy, anchor, &fresh, &absolute, &sizes, options),
            None => top_level_origin(&hierarchy, &fresh, &absolute, &sizes, options),
        };
        for (id, point) in placed {
            absolute.insert(id, Point::new(origin.x + point.x, origin.y + point.y));
        }
        if let Some(anchor) = anchor {
            grow_chain(&hierarchy, anchor, &absolute, &mut sizes, options);
        }
    }

    for id in &by_depth {
        let Some(parent) = hierarchy.parent(id) else {
            continue;
        };
        if !fresh.contains(parent) {
            continue;
        }
        let (Some(origin), Some(offset)) = (absolute.get(parent).copied(), relative.get(id))
        else {
            continue;
        };
        absolute.insert(id.clone(), Point::new(origin.x + offset.x, origin.y + offset.y));
    }
    fit_all_composites(&hierarchy, &fresh, &absolute, &mut sizes, options);

    for node in &mut nodes {
        if let Some(position) = absolute.get(&node.id) {
            node.position = *position;
        }
        if let Some(size) = sizes.get(&node.id) {
            node.size = *size;
        }
    }

    let rects: BTreeMap<&str, Rect> = nodes
        .iter()
        .map(|node| (node.id.as_str(), node.rect()))
        .collect();
    let edges = edges
        .into_iter()
        .filter_map(|mut edge| {
            let from = rects.get(edge.source.as_str())?;
            let to = rects.get(edge.target.as_str())?;
            let unchanged = store.get(&edge.source).as_ref() == Some(from)
                && store.get(&edge.target).as_ref() == Some(to);
            let points = match store.route(&edge.id) {
                Some(points) if unchanged => points.to_vec(),
                _ => route_edge(from, to, options.direction),
            };
            edge.points = Some(points);
            Some(edge)
        })
        .collect();

    Ok(LayoutOutput { nodes, edges })
}

/// Where a new block goes inside a remembered frame: the content origin if
/// the frame is empty, otherwise after its positioned children along the flow.
fn anchored_origin(
    hierarchy: &Hierarchy,
    anchor: &str,
    fresh: &HashSet<String>,
    absolute: &BTreeMap<String, Point>,
    sizes: &BTreeMap<String, Size>,
    options: &LayoutOptions,
) -> Point {
    let frame = absolute.get(anchor).copied().unwrap_or_default();
    let content = Point::new(
        frame.x + options.frame_padding,
        frame.y + options.frame_header,
    );
    let existing = hierarchy
        .children(anchor)
        .iter()
        .filter(|id| !fresh.contains(id.as_str()))
        .filter_map(|id| rect_of(id, absolute, sizes))
        .reduce(|acc, rect| acc.union(&rect));
    match existing {
        None => content,
        Some(bounds) if options.direction.is_horizontal() => {
            Point::new(bounds.right() + options.node_spacing, content.y)
        }
        Some(bounds) => Point::new(content.x, bounds.bottom() + options.node_spacing),
    }
}

/// New top-level nodes go beside the existing drawing, across the flow.
fn top_level_origin(
    hierarchy: &Hierarchy,
    fresh: &HashSet<String>,
    absolute: &BTreeMap<String, Point>,
    sizes: &BTreeMap<String, Size>,
    options: &LayoutOptions,
) -> Point {
    let existing = hierarchy
        .roots()
        .iter()
        .filter(|id| !fresh.contains(id.as_str()))
        .filter_map(|id| rect_of(id, absolute, sizes))
        .reduce(|acc, rect| acc.union(&rect));
    match existing {
        None => Point::default(),
        Some(bounds) if options.direction.is_horizontal() => {
            Point::new(bounds.x, bounds.bottom() + options.incremental_gap)
        }
        Some(bounds) => Point::new(bounds.right() + options.incremental_gap, bounds.y),
    }
}

fn rect_of(
    id: &str,
    absolute: &BTreeMap<String, Point>,
    sizes: &BTreeMap<String, Size>,
) -> Option<Rect> {
    let point = absolute.get(id)?;
    let size = sizes.get(id)?;
    Some(Rect::new(point.x, point.y, size.width, size.height))
}

/// Grows `id` so every placed child fits inside its padding. Never shrinks
/// and never moves the frame.
fn grow_to_fit(
    hierarchy: &Hierarchy,
    id: &str,
    absolute: &BTreeMap<String, Point>,
    sizes: &mut BTreeMap<String, Size>,
    options: &LayoutOptions,
) {
    let Some(origin) = absolute.get(id).copied() else {
        return;
    };
    let mut size = sizes.get(id).copied().unwrap_or_default();
    for child in hierarchy.children(id) {
        let Some(rect) = rect_of(child, absolute, sizes) else {
            continue;
        };
        let need_width = rect.right() + options.frame_padding - origin.x;
        let need_height = rect.bottom() + options.frame_padding - origin.y;
        if need_width > size.width + FIT_EPS {
            size.width = need_width;
        }
        if need_height > size.height + FIT_EPS {
            size.height = need_height;
        }
    }
    sizes.insert(id.to_string(), size);
}

fn grow_chain(
    hierarchy: &Hierarchy,
    anchor: &str,
    absolute: &BTreeMap<String, Point>,
    sizes: &mut BTreeMap<String, Size>,
    options: &LayoutOptions,
) {
    let mut current = Some(anchor);
    while let Some(id) = current {
        grow_to_fit(hierarchy, id, absolute, sizes, options);
        current = hierarchy.parent(id);
    }
}

/// Remembered composites whose remembered children came back (a collapse
/// followed by an expand) start from their collapsed size; grow them again.
fn fit_all_composites(
    hierarchy: &Hierarchy,
    fresh: &HashSet<String>,
    absolute: &BTreeMap<String, Point>,
    sizes: &mut BTreeMap<String, Size>,
    options: &LayoutOptions,
) {
    for id in hierarchy.composites_bottom_up() {
        if !fresh.contains(id) {
            grow_to_fit(hierarchy, id, absolute, sizes, options);
        }
    }
}
