use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a layout pass. Every variant is recoverable: the orchestrator
/// falls back to the raw graph when it sees one.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LayoutError {
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    #[error("node `{node}` references missing parent `{parent}`")]
    MissingParent { node: String, parent: String },
    #[error("parent cycle through node `{0}`")]
    CyclicHierarchy(String),
    #[error("layout computation failed: {0}")]
    Computation(String),
    #[error("layout worker failed: {0}")]
    WorkerTransport(String),
}
