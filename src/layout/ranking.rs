use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

/// Directed edge between two members of one layout scope.
pub(crate) type ScopeEdge = (String, String);

/// Median-heuristic sweeps: down the ranks against predecessors, then back up
/// against successors. Nodes without neighbours in the reference rank keep
/// their slot, and ties keep the current order.
fn reduce_crossings(rank_nodes: &mut [Vec<String>], edges: &[ScopeEdge], passes: usize) {
    if rank_nodes.len() < 2 {
        return;
    }
    let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut succs: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        succs.entry(from.as_str()).or_default().push(to.as_str());
        preds.entry(to.as_str()).or_default().push(from.as_str());
    }

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            let (above, rest) = rank_nodes.split_at_mut(rank);
            reorder_by_median(&mut rest[0], &above[rank - 1], &preds);
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            let (upto, below) = rank_nodes.split_at_mut(rank + 1);
            reorder_by_median(&mut upto[rank], &below[0], &succs);
        }
    }
}

fn reorder_by_median(
    layer: &mut Vec<String>,
    reference: &[String],
    neighbours: &HashMap<&str, Vec<&str>>,
) {
    if layer.len() < 2 {
        return;
    }
    let slot: HashMap<&str, usize> = reference
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let mut keyed: Vec<(f32, usize, String)> = layer
        .drain(..)
        .enumerate()
        .map(|(current, id)| {
            let key = neighbours
                .get(id.as_str())
                .and_then(|list| median_slot(list, &slot))
                .unwrap_or(current as f32);
            (key, current, id)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    layer.extend(keyed.into_iter().map(|(_, _, id)| id));
}

fn median_slot(neighbours: &[&str], slot: &HashMap<&str, usize>) -> Option<f32> {
    let mut values: Vec<usize> = neighbours
        .iter()
        .filter_map(|id| slot.get(id).copied())
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 1 {
        values[mid] as f32
    } else {
        (values[mid - 1] + values[mid]) as f32 * 0.5
    })
}

/// Longest-path rank per node. Cycles are broken by picking the remaining node
/// earliest in `node_ids`, treating its incoming edges as back-edges.
pub(crate) fn compute_ranks(node_ids: &[String], edges: &[ScopeEdge]) -> BTreeMap<String, usize> {
    let set: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = node_ids.iter().map(|id| (id.as_str(), 0)).collect();

    for (from, to) in edges {
        if set.contains(from.as_str()) && set.contains(to.as_str()) && from != to {
            adj.entry(from.as_str()).or_default().push(to.as_str());
            if let Some(deg) = indeg.get_mut(to.as_str()) {
                *deg += 1;
            }
        }
    }

    let order_key: HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let key = |id: &str| order_key.get(id).copied().unwrap_or(usize::MAX);

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = BinaryHeap::new();
    for id in node_ids {
        if indeg.get(id.as_str()).copied().unwrap_or(0) == 0 {
            ready.push(Reverse((key(id), id.as_str())));
        }
    }

    let mut order: Vec<&str> = Vec::with_capacity(node_ids.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(nexts) = adj.get(id) {
                for next in nexts {
                    if processed.contains(next) {
                        continue;
                    }
                    if let Some(deg) = indeg.get_mut(next) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            ready.push(Reverse((key(next), *next)));
                        }
                    }
                }
            }
        }

        if processed.len() >= set.len() {
            break;
        }

        // Cycle detected
        let next = node_ids
            .iter()
            .map(String::as_str)
            .find(|id| !processed.contains(id));
        match next {
            Some(id) => ready.push(Reverse((key(id), id))),
            None => break,
        }
    }

    let order_index: HashMap<&str, usize> =
        order.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();

    let mut ranks: BTreeMap<String, usize> = BTreeMap::new();
    for node in &order {
        let rank = *ranks.entry(node.to_string()).or_insert(0);
        if let Some(nexts) = adj.get(node) {
            let from_idx = order_index.get(node).copied().unwrap_or(0);
            for next in nexts {
                let to_idx = order_index.get(next).copied().unwrap_or(from_idx);
                if to_idx <= from_idx {
                    continue;
                }
                let entry = ranks.entry(next.to_string()).or_insert(0);
                *entry = (*entry).max(rank + 1);
            }
        }
    }

    ranks
}

/// Buckets nodes by rank, splits long edges with virtual nodes and reduces
/// crossings. Virtual ids start with `__virtual_`.
pub(crate) fn ordered_ranks(
    node_ids: &[String],
    edges: &[ScopeEdge],
    passes: usize,
) -> Vec<Vec<String>> {
    let ranks = compute_ranks(node_ids, edges);
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut rank_nodes: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for node_id in node_ids {
        let rank = ranks.get(node_id).copied().unwrap_or(0);
        rank_nodes[rank].push(node_id.clone());
    }

    let mut expanded_edges: Vec<ScopeEdge> = Vec::new();
    let mut virtual_counter = 0usize;

    for (from, to) in edges {
        let (Some(&from_rank), Some(&to_rank)) = (ranks.get(from), ranks.get(to)) else {
            continue;
        };
        if to_rank <= from_rank {
            continue;
        }
        let span = to_rank - from_rank;
        if span <= 1 {
            expanded_edges.push((from.clone(), to.clone()));
            continue;
        }
        let mut prev = from.clone();
        for step in 1..span {
            let virtual_id = format!("__virtual_{virtual_counter}__");
            virtual_counter += 1;
            rank_nodes[from_rank + step].push(virtual_id.clone());
            expanded_edges.push((prev, virtual_id.clone()));
            prev = virtual_id;
        }
        expanded_edges.push((prev, to.clone()));
    }

    reduce_crossings(&mut rank_nodes, &expanded_edges, passes);
    rank_nodes
}

pub(crate) fn is_virtual(id: &str) -> bool {
    id.starts_with("__virtual_")
}
