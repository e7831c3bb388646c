//! Architecture JSON as produced by the DSL toolchain.
//!
//! The schema is consumed read-only. Collections are optional and default to
//! empty so partially written models still load.

use crate::ir::InteractionKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Architecture {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub systems: Vec<System>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub datastores: Vec<Element>,
    #[serde(default)]
    pub queues: Vec<Element>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub components: Vec<Element>,
}

/// Leaf element: component, datastore or queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub interaction: InteractionKind,
}

impl Architecture {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }
}

/// Joins a child id onto its parent unless the child is already qualified.
pub fn qualify(parent: &str, child: &str) -> String {
    if child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('.'))
    {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}
