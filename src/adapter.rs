//! Architecture model to layout graph conversion.
//!
//! Filters the architecture tree down to what is visible for a level, focus and
//! expansion state, and rewrites relation endpoints onto the nearest visible
//! ancestor so collapsed composites still carry their children's edges.

use crate::architecture::{Architecture, qualify};
use crate::config::NodeSizeConfig;
use crate::ir::{C4Level, Graph, GraphEdge, GraphNode, NodeKind, Point};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub level: C4Level,
    #[serde(default)]
    pub focused_system_id: Option<String>,
    #[serde(default)]
    pub focused_container_id: Option<String>,
    #[serde(default)]
    pub expanded: BTreeSet<String>,
}

impl ViewState {
    pub fn new(level: C4Level) -> Self {
        Self {
            level,
            focused_system_id: None,
            focused_container_id: None,
            expanded: BTreeSet::new(),
        }
    }

    pub fn focus_system(mut self, id: impl Into<String>) -> Self {
        self.focused_system_id = Some(id.into());
        self
    }

    pub fn focus_container(mut self, id: impl Into<String>) -> Self {
        self.focused_container_id = Some(id.into());
        self
    }

    pub fn expand(mut self, id: impl Into<String>) -> Self {
        self.expanded.insert(id.into());
        self
    }

    /// Level or focus differs: positions from the previous view are meaningless.
    pub fn is_major_change_from(&self, previous: &ViewState) -> bool {
        self.level != previous.level
            || self.focused_system_id != previous.focused_system_id
            || self.focused_container_id != previous.focused_container_id
    }
}

#[derive(Debug, Clone)]
struct ElementInfo {
    label: String,
    kind: NodeKind,
    parent: Option<String>,
    level: C4Level,
    external: bool,
    technology: Option<String>,
    children: Vec<String>,
}

struct ElementTable {
    elements: BTreeMap<String, ElementInfo>,
}

impl ElementTable {
    fn build(arch: &Architecture) -> Self {
        let mut table = Self {
            elements: BTreeMap::new(),
        };
        for person in &arch.persons {
            table.insert(
                person.id.clone(),
                ElementInfo {
                    label: person.label.clone().unwrap_or_else(|| person.id.clone()),
                    kind: NodeKind::Person,
                    parent: None,
                    level: C4Level::L1,
                    external: person.external,
                    technology: None,
                    children: Vec::new(),
                },
            );
        }
        for system in &arch.systems {
            table.insert(
                system.id.clone(),
                ElementInfo {
                    label: system.label.clone().unwrap_or_else(|| system.id.clone()),
                    kind: NodeKind::System,
                    parent: None,
                    level: C4Level::L1,
                    external: system.external,
                    technology: None,
                    children: Vec::new(),
                },
            );
            for container in &system.containers {
                let container_id = qualify(&system.id, &container.id);
                table.insert(
                    container_id.clone(),
                    ElementInfo {
                        label: container.label.clone().unwrap_or_else(|| container.id.clone()),
                        kind: NodeKind::Container,
                        parent: Some(system.id.clone()),
                        level: C4Level::L2,
                        external: system.external,
                        technology: container.technology.clone(),
                        children: Vec::new(),
                    },
                );
                for component in &container.components {
                    table.insert(
                        qualify(&container_id, &component.id),
                        ElementInfo {
                            label: component.label.clone().unwrap_or_else(|| component.id.clone()),
                            kind: NodeKind::Component,
                            parent: Some(container_id.clone()),
                            level: C4Level::L3,
                            external: system.external,
                            technology: component.technology.clone(),
                            children: Vec::new(),
                        },
                    );
                }
            }
            let leaves = system
                .datastores
                .iter()
                .map(|el| (el, NodeKind::Datastore))
                .chain(system.queues.iter().map(|el| (el, NodeKind::Queue)));
            for (element, kind) in leaves {
                table.insert(
                    qualify(&system.id, &element.id),
                    ElementInfo {
                        label: element.label.clone().unwrap_or_else(|| element.id.clone()),
                        kind,
                        parent: Some(system.id.clone()),
                        level: C4Level::L2,
                        external: system.external,
                        technology: element.technology.clone(),
                        children: Vec::new(),
                    },
                );
            }
        }

        let links: Vec<(String, String)> = table
            .elements
            .iter()
            .filter_map(|(id, info)| info.parent.clone().map(|parent| (parent, id.clone())))
            .collect();
        for (parent, child) in links {
            if let Some(info) = table.elements.get_mut(&parent) {
                info.children.push(child);
            }
        }
        table
    }

    fn insert(&mut self, id: String, info: ElementInfo) {
        if self.elements.contains_key(&id) {
            tracing::warn!(id = %id, "duplicate architecture element ignored");
            return;
        }
        self.elements.insert(id, info);
    }

    fn get(&self, id: &str) -> Option<&ElementInfo> {
        self.elements.get(id)
    }

    fn top_level_of<'a>(&'a self, id: &'a str) -> &'a str {
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|info| info.parent.as_deref()) {
            current = parent;
        }
        current
    }

    fn ids_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &String> {
        self.elements
            .iter()
            .filter(move |(_, info)| info.kind == kind)
            .map(|(id, _)| id)
    }

    fn top_level_ids(&self) -> BTreeSet<String> {
        self.elements
            .iter()
            .filter(|(_, info)| info.parent.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

struct Scope {
    roots: BTreeSet<String>,
    implicit_expanded: BTreeSet<String>,
}

fn resolve_scope(table: &ElementTable, arch: &Architecture, view: &ViewState) -> Option<Scope> {
    let all_systems: BTreeSet<String> = table.ids_of_kind(NodeKind::System).cloned().collect();
    let all_containers: BTreeSet<String> =
        table.ids_of_kind(NodeKind::Container).cloned().collect();

    let focused_system = |id: &str| -> Option<String> {
        match table.get(id) {
            Some(info) if info.kind == NodeKind::System => Some(id.to_string()),
            _ => {
                tracing::warn!(id = %id, "focused system not found");
                None
            }
        }
    };

    match view.level {
        C4Level::L1 => Some(Scope {
            roots: table.top_level_ids(),
            implicit_expanded: BTreeSet::new(),
        }),
        C4Level::L2 => match view.focused_system_id.as_deref() {
            Some(id) => {
                let system = focused_system(id)?;
                Some(Scope {
                    roots: focus_roots(table, arch, &system),
                    implicit_expanded: BTreeSet::from([system]),
                })
            }
            None => Some(Scope {
                roots: table.top_level_ids(),
                implicit_expanded: all_systems,
            }),
        },
        C4Level::L3 => {
            if let Some(container_id) = view.focused_container_id.as_deref() {
                let Some(info) = table.get(container_id).filter(|info| info.kind == NodeKind::Container)
                else {
                    tracing::warn!(id = %container_id, "focused container not found");
                    return None;
                };
                let system = info.parent.clone()?;
                return Some(Scope {
                    roots: focus_roots(table, arch, &system),
                    implicit_expanded: BTreeSet::from([system, container_id.to_string()]),
                });
            }
            match view.focused_system_id.as_deref() {
                Some(id) => {
                    let system = focused_system(id)?;
                    let mut implicit: BTreeSet<String> = table
                        .get(&system)
                        .map(|info| {
                            info.children
                                .iter()
                                .filter(|child| all_containers.contains(*child))
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    implicit.insert(system.clone());
                    Some(Scope {
                        roots: focus_roots(table, arch, &system),
                        implicit_expanded: implicit,
                    })
                }
                None => Some(Scope {
                    roots: table.top_level_ids(),
                    implicit_expanded: all_systems.union(&all_containers).cloned().collect(),
                }),
            }
        }
    }
}

/// The focused system plus every top-level element related to its subtree.
fn focus_roots(table: &ElementTable, arch: &Architecture, system: &str) -> BTreeSet<String> {
    let mut roots = BTreeSet::from([system.to_string()]);
    for rel in &arch.relations {
        if table.get(&rel.from).is_none() || table.get(&rel.to).is_none() {
            continue;
        }
        let from_top = table.top_level_of(&rel.from);
        let to_top = table.top_level_of(&rel.to);
        if from_top == system && to_top != system {
            roots.insert(to_top.to_string());
        } else if to_top == system && from_top != system {
            roots.insert(from_top.to_string());
        }
    }
    roots
}

pub fn to_graph(arch: &Architecture, view: &ViewState, sizes: &NodeSizeConfig) -> Graph {
    let table = ElementTable::build(arch);
    let Some(scope) = resolve_scope(&table, arch, view) else {
        return Graph::default();
    };
    let expanded: BTreeSet<&str> = scope
        .implicit_expanded
        .iter()
        .chain(view.expanded.iter())
        .map(String::as_str)
        .collect();

    let is_visible = |id: &str| -> bool {
        if !scope.roots.contains(table.top_level_of(id)) {
            return false;
        }
        let mut current = table.get(id).and_then(|info| info.parent.as_deref());
        while let Some(ancestor) = current {
            if !expanded.contains(ancestor) {
                return false;
            }
            current = table.get(ancestor).and_then(|info| info.parent.as_deref());
        }
        true
    };

    let mut nodes = Vec::new();
    let mut visible: BTreeSet<&str> = BTreeSet::new();
    for (id, info) in &table.elements {
        if !is_visible(id) {
            continue;
        }
        visible.insert(id.as_str());
        nodes.push(GraphNode {
            id: id.clone(),
            label: info.label.clone(),
            kind: info.kind,
            parent_id: info.parent.clone(),
            level: info.level,
            is_external: info.external,
            child_count: info.children.len(),
            expanded: !info.children.is_empty() && expanded.contains(id.as_str()),
            technology: info.technology.clone(),
            position: Point::default(),
            size: sizes.for_kind(info.kind),
        });
    }

    let nearest_visible = |id: &str| -> Option<String> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if visible.contains(candidate) {
                return Some(candidate.to_string());
            }
            current = table.get(candidate).and_then(|info| info.parent.as_deref());
        }
        None
    };

    let mut pair_counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut edges = Vec::new();
    for rel in &arch.relations {
        if table.get(&rel.from).is_none() || table.get(&rel.to).is_none() {
            tracing::debug!(from = %rel.from, to = %rel.to, "dropping relation with unknown endpoint");
            continue;
        }
        let (Some(source), Some(target)) = (nearest_visible(&rel.from), nearest_visible(&rel.to))
        else {
            continue;
        };
        if source == target {
            continue;
        }
        let count = pair_counts
            .entry((source.clone(), target.clone()))
            .or_insert(0);
        let id = format!("{source}->{target}#{count}");
        *count += 1;
        edges.push(GraphEdge {
            id,
            source,
            target,
            label: rel.label.clone(),
            technology: rel.technology.clone(),
            interaction_kind: rel.interaction,
            points: None,
        });
    }

    Graph { nodes, edges }
}
