use std::collections::{BTreeMap, HashSet};

use crate::ir::GraphNode;

use super::LayoutError;

/// Validated parent/child structure of one node set.
#[derive(Debug, Clone)]
pub(crate) struct Hierarchy {
    parent: BTreeMap<String, Option<String>>,
    children: BTreeMap<String, Vec<String>>,
    depth: BTreeMap<String, usize>,
    roots: Vec<String>,
}

impl Hierarchy {
    pub(crate) fn build(nodes: &[GraphNode]) -> Result<Self, LayoutError> {
        let mut parent: BTreeMap<String, Option<String>> = BTreeMap::new();
        for node in nodes {
            if parent
                .insert(node.id.clone(), node.parent_id.clone())
                .is_some()
            {
                return Err(LayoutError::DuplicateNode(node.id.clone()));
            }
        }

        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut roots = Vec::new();
        for (id, parent_id) in &parent {
            match parent_id {
                Some(parent_id) => {
                    if !parent.contains_key(parent_id) {
                        return Err(LayoutError::MissingParent {
                            node: id.clone(),
                            parent: parent_id.clone(),
                        });
                    }
                    children
                        .entry(parent_id.clone())
                        .or_default()
                        .push(id.clone());
                }
                None => roots.push(id.clone()),
            }
        }

        let mut depth: BTreeMap<String, usize> = BTreeMap::new();
        for id in parent.keys() {
            let mut steps = 0usize;
            let mut seen: HashSet<&str> = HashSet::new();
            let mut current = id.as_str();
            while let Some(Some(next)) = parent.get(current) {
                if !seen.insert(current) {
                    return Err(LayoutError::CyclicHierarchy(id.clone()));
                }
                current = next.as_str();
                steps += 1;
            }
            depth.insert(id.clone(), steps);
        }

        Ok(Self {
            parent,
            children,
            depth,
            roots,
        })
    }

    pub(crate) fn roots(&self) -> &[String] {
        &self.roots
    }

    pub(crate) fn parent(&self, id: &str) -> Option<&str> {
        self.parent.get(id).and_then(|parent| parent.as_deref())
    }

    pub(crate) fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn has_children(&self, id: &str) -> bool {
        !self.children(id).is_empty()
    }

    pub(crate) fn depth(&self, id: &str) -> usize {
        self.depth.get(id).copied().unwrap_or(0)
    }

    /// Walks up from `id` to the ancestor-or-self whose parent is `scope`.
    pub(crate) fn ancestor_in_scope<'a>(&'a self, id: &'a str, scope: Option<&str>) -> Option<&'a str> {
        let mut current = id;
        loop {
            let parent = self.parent.get(current)?.as_deref();
            if parent == scope {
                return Some(current);
            }
            current = parent?;
        }
    }

    /// Composite nodes, deepest first, so a frame is sized after its children.
    pub(crate) fn composites_bottom_up(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.children.keys().map(String::as_str).collect();
        ids.sort_by(|a, b| self.depth(b).cmp(&self.depth(a)).then_with(|| a.cmp(b)));
        ids
    }
}
