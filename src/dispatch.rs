use serde::{Deserialize, Serialize};

use crate::config::WorkerThresholds;
use crate::ir::{GraphEdge, GraphNode};
use crate::layout::{EngineKind, LayoutError, LayoutOptions, LayoutOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPath {
    /// Computed on the calling task.
    Inline,
    /// Computed on a blocking worker thread.
    Worker,
}

/// Everything a worker needs for one full layout. Owned data only, so a
/// request can be moved to another thread or serialized as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub engine: EngineKind,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub options: LayoutOptions,
}

impl WorkerRequest {
    pub fn execute(self) -> Result<LayoutOutput, LayoutError> {
        self.engine
            .engine()
            .compute_layout(self.nodes, self.edges, &self.options)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutDispatcher {
    thresholds: WorkerThresholds,
}

impl LayoutDispatcher {
    pub fn new(thresholds: WorkerThresholds) -> Self {
        Self { thresholds }
    }

    pub fn path_for(&self, node_count: usize, edge_count: usize) -> DispatchPath {
        if node_count > self.thresholds.max_inline_nodes
            || edge_count > self.thresholds.max_inline_edges
        {
            DispatchPath::Worker
        } else {
            DispatchPath::Inline
        }
    }

    /// Runs a full layout, offloading large graphs to a blocking worker.
    ///
    /// A worker that panics or is torn down surfaces as
    /// [`LayoutError::WorkerTransport`], so callers handle both paths alike.
    pub async fn run(
        &self,
        engine: EngineKind,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
        options: LayoutOptions,
    ) -> Result<LayoutOutput, LayoutError> {
        let path = self.path_for(nodes.len(), edges.len());
        let request = WorkerRequest {
            engine,
            nodes,
            edges,
            options,
        };
        match path {
            DispatchPath::Inline => request.execute(),
            DispatchPath::Worker => {
                tracing::debug!(
                    engine = engine.as_str(),
                    nodes = request.nodes.len(),
                    edges = request.edges.len(),
                    "dispatching layout to worker"
                );
                run_on_worker(move || request.execute()).await
            }
        }
    }
}

async fn run_on_worker<F>(job: F) -> Result<LayoutOutput, LayoutError>
where
    F: FnOnce() -> Result<LayoutOutput, LayoutError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| LayoutError::WorkerTransport(err.to_string()))?
}
