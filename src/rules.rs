use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::RuleThresholds;
use crate::ir::{C4Level, GraphEdge, GraphNode};
use crate::layout::ranking::{ScopeEdge, compute_ranks};
use crate::layout::{EngineKind, LayoutDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    pub enterprise_boundary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSelection {
    pub engine: EngineKind,
    pub direction: LayoutDirection,
    pub options: EngineOptions,
}

impl LayoutSelection {
    fn layered(direction: LayoutDirection) -> Self {
        Self {
            engine: EngineKind::C4Level,
            direction,
            options: EngineOptions::default(),
        }
    }
}

/// Picks the full-layout engine for a graph. First matching rule wins:
///
/// 1. at most one node: layered, top to bottom;
/// 2. flat focus scope below `flat_max_nodes`: layered, left to right when a
///    rank gets wider than `wide_rank_nodes`;
/// 3. dense cross-group relations, or an L1 view mixing internal and external
///    nodes: compound, with the enterprise boundary in the latter case;
/// 4. layered, top to bottom.
///
/// Pure: the same inputs always give the same selection.
pub fn select_layout_config(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    level: C4Level,
    focused_system_id: Option<&str>,
    focused_container_id: Option<&str>,
    expanded: &BTreeSet<String>,
    thresholds: &RuleThresholds,
) -> LayoutSelection {
    if nodes.len() <= 1 {
        return LayoutSelection::layered(LayoutDirection::Down);
    }

    let parents: HashMap<&str, &str> = nodes
        .iter()
        .filter_map(|node| Some((node.id.as_str(), node.parent_id.as_deref()?)))
        .collect();
    let boundary_requested = level == C4Level::L1
        && nodes.iter().any(|node| node.is_external)
        && nodes.iter().any(|node| !node.is_external);

    let focus = focused_container_id
        .filter(|id| nodes.iter().any(|node| node.id == *id))
        .or_else(|| focused_system_id.filter(|id| nodes.iter().any(|node| node.id == *id)));
    let scope: HashSet<&str> = nodes
        .iter()
        .map(|node| node.id.as_str())
        .filter(|id| focus.is_none_or(|focus| is_descendant(&parents, id, focus)))
        .collect();
    let nested = scope
        .iter()
        .any(|id| parents.get(id).is_some_and(|parent| scope.contains(parent)))
        || expanded.iter().any(|id| scope.contains(id.as_str()));

    if !nested && !boundary_requested && nodes.len() < thresholds.flat_max_nodes {
        let direction = if widest_rank(nodes, edges) > thresholds.wide_rank_nodes {
            LayoutDirection::Right
        } else {
            LayoutDirection::Down
        };
        return LayoutSelection::layered(direction);
    }

    let dense = nested && {
        let (inter, intra) = group_edge_counts(&parents, edges);
        inter as f32 / intra.max(1) as f32 > thresholds.cross_group_ratio
    };
    if dense || boundary_requested {
        return LayoutSelection {
            engine: EngineKind::Sruja,
            direction: LayoutDirection::Down,
            options: EngineOptions {
                enterprise_boundary: boundary_requested,
            },
        };
    }

    LayoutSelection::layered(LayoutDirection::Down)
}

fn is_descendant(parents: &HashMap<&str, &str>, id: &str, ancestor: &str) -> bool {
    let mut current = parents.get(id).copied();
    let mut steps = 0;
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        // Cyclic parents are rejected later by the engines.
        steps += 1;
        if steps > parents.len() {
            return false;
        }
        current = parents.get(parent).copied();
    }
    false
}

fn top_level<'a>(parents: &HashMap<&'a str, &'a str>, id: &'a str) -> &'a str {
    let mut current = id;
    let mut steps = 0;
    while let Some(parent) = parents.get(current) {
        steps += 1;
        if steps > parents.len() {
            break;
        }
        current = *parent;
    }
    current
}

/// (edges between different top-level groups, edges inside one group)
fn group_edge_counts(parents: &HashMap<&str, &str>, edges: &[GraphEdge]) -> (usize, usize) {
    edges.iter().fold((0, 0), |(inter, intra), edge| {
        if top_level(parents, &edge.source) == top_level(parents, &edge.target) {
            (inter, intra + 1)
        } else {
            (inter + 1, intra)
        }
    })
}

fn widest_rank(nodes: &[GraphNode], edges: &[GraphEdge]) -> usize {
    let ids: Vec<String> = nodes.iter().map(|node| node.id.clone()).collect();
    let known: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let pairs: Vec<ScopeEdge> = edges
        .iter()
        .filter(|edge| {
            edge.source != edge.target
                && known.contains(edge.source.as_str())
                && known.contains(edge.target.as_str())
        })
        .map(|edge| (edge.source.clone(), edge.target.clone()))
        .collect();
    let mut per_rank: BTreeMap<usize, usize> = BTreeMap::new();
    for rank in compute_ranks(&ids, &pairs).into_values() {
        *per_rank.entry(rank).or_default() += 1;
    }
    per_rank.into_values().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_support::{edge, node};

    fn select(nodes: &[GraphNode], edges: &[GraphEdge], level: C4Level) -> LayoutSelection {
        select_layout_config(
            nodes,
            edges,
            level,
            None,
            None,
            &BTreeSet::new(),
            &RuleThresholds::default(),
        )
    }

    #[test]
    fn trivial_graph_is_layered_down() {
        let selection = select(&[node("a", None)], &[], C4Level::L1);
        assert_eq!(selection, LayoutSelection::layered(LayoutDirection::Down));
        assert_eq!(select(&[], &[], C4Level::L3).engine, EngineKind::C4Level);
    }

    #[test]
    fn flat_graph_is_layered() {
        let nodes = [node("a", None), node("b", None), node("c", None)];
        let selection = select(&nodes, &[edge("a", "b"), edge("b", "c")], C4Level::L2);
        assert_eq!(selection, LayoutSelection::layered(LayoutDirection::Down));
    }

    #[test]
    fn wide_flat_graph_flows_right() {
        let mut nodes = vec![node("hub", None)];
        let mut edges = Vec::new();
        for i in 0..7 {
            let id = format!("leaf{i}");
            edges.push(edge("hub", &id));
            nodes.push(node(&id, None));
        }
        let selection = select(&nodes, &edges, C4Level::L2);
        assert_eq!(selection.direction, LayoutDirection::Right);
    }

    #[test]
    fn mixed_internal_and_external_context_uses_boundary() {
        let mut bank = node("bank", None);
        bank.is_external = true;
        let nodes = [node("shop", None), bank];
        let selection = select(&nodes, &[edge("shop", "bank")], C4Level::L1);
        assert_eq!(selection.engine, EngineKind::Sruja);
        assert!(selection.options.enterprise_boundary);
    }

    #[test]
    fn dense_cross_group_relations_use_compound() {
        let nodes = [
            node("a", None),
            node("a.x", Some("a")),
            node("b", None),
            node("b.y", Some("b")),
        ];
        let edges = [edge("a.x", "b.y"), edge("b.y", "a.x")];
        let selection = select(&nodes, &edges, C4Level::L2);
        assert_eq!(selection.engine, EngineKind::Sruja);
        assert!(!selection.options.enterprise_boundary);
    }

    #[test]
    fn nested_but_sparse_falls_back_to_layered() {
        let nodes = [
            node("a", None),
            node("a.x", Some("a")),
            node("a.y", Some("a")),
            node("b", None),
        ];
        let edges = [edge("a.x", "a.y"), edge("a.y", "b")];
        let selection = select(&nodes, &edges, C4Level::L2);
        assert_eq!(selection, LayoutSelection::layered(LayoutDirection::Down));
    }

    #[test]
    fn focus_scope_decides_flatness() {
        let nodes = [
            node("shop", None),
            node("shop.web", Some("shop")),
            node("shop.api", Some("shop")),
            node("user", None),
        ];
        let edges = [edge("user", "shop.web"), edge("shop.web", "shop.api")];
        let focused = select_layout_config(
            &nodes,
            &edges,
            C4Level::L2,
            Some("shop"),
            None,
            &BTreeSet::new(),
            &RuleThresholds::default(),
        );
        assert_eq!(focused, LayoutSelection::layered(LayoutDirection::Down));
        let again = select_layout_config(
            &nodes,
            &edges,
            C4Level::L2,
            Some("shop"),
            None,
            &BTreeSet::new(),
            &RuleThresholds::default(),
        );
        assert_eq!(focused, again);
    }
}
