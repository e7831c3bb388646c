//! Layout pass control: decides between full and incremental layout, runs the
//! pass, and commits the newest result.
//!
//! A pass is split in three so callers can run several at once:
//! [`LayoutOrchestrator::plan`] snapshots everything the pass needs,
//! [`LayoutPlan::execute`] does the work without touching the orchestrator,
//! and [`LayoutOrchestrator::commit`] applies the result only if no newer pass
//! was planned in the meantime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::adapter::{ViewState, to_graph};
use crate::architecture::Architecture;
use crate::config::Config;
use crate::dispatch::{DispatchPath, LayoutDispatcher};
use crate::ir::{Graph, GraphEdge, GraphNode, retain_connected_edges};
use crate::layout::{
    EngineKind, IncrementalOptions, LayoutDirection, LayoutError, LayoutOptions, LayoutOutput,
    apply_incremental_layout,
};
use crate::metrics::LayoutMetrics;
use crate::positions::PositionStore;
use crate::rules::select_layout_config;
use crate::viewport::{ViewTransform, fit_bounds};

/// Receives every committed pass, degraded ones included.
pub trait LayoutObserver: Send + Sync {
    fn on_layout_complete(&self, nodes: &[GraphNode], edges: &[GraphEdge], metrics: &LayoutMetrics);
}

/// Identifies one planned pass. Planning a newer pass makes older tokens stale.
#[derive(Debug, Clone)]
pub struct LayoutToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl LayoutToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDecision {
    pub engine: EngineKind,
    pub direction: LayoutDirection,
    pub use_incremental: bool,
    pub use_worker: bool,
}

#[derive(Debug, Clone)]
enum Pass {
    Full(LayoutOptions),
    Incremental {
        options: IncrementalOptions,
        positions: PositionStore,
    },
}

/// Everything one pass needs, detached from the orchestrator.
#[derive(Debug, Clone)]
pub struct LayoutPlan {
    token: LayoutToken,
    decision: LayoutDecision,
    pass: Pass,
    raw: Graph,
    fit_view: bool,
    started: Instant,
}

impl LayoutPlan {
    pub fn token(&self) -> &LayoutToken {
        &self.token
    }

    pub fn decision(&self) -> LayoutDecision {
        self.decision
    }

    /// Graph as built by the adapter, before layout.
    pub fn raw(&self) -> &Graph {
        &self.raw
    }

    pub fn fit_view(&self) -> bool {
        self.fit_view
    }

    pub async fn execute(&self, dispatcher: &LayoutDispatcher) -> Result<LayoutOutput, LayoutError> {
        tracing::debug!(
            mark = "layout-start",
            generation = self.token.generation,
            engine = self.decision.engine.as_str(),
            incremental = self.decision.use_incremental,
            worker = self.decision.use_worker
        );
        let nodes = self.raw.nodes.clone();
        let edges = self.raw.edges.clone();
        match &self.pass {
            Pass::Full(options) => {
                dispatcher
                    .run(self.decision.engine, nodes, edges, options.clone())
                    .await
            }
            Pass::Incremental { options, positions } => {
                apply_incremental_layout(nodes, edges, options, positions)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReport {
    pub generation: u64,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub decision: LayoutDecision,
    /// The canvas should refit its viewport to this result.
    pub fit_view: bool,
    /// The pass failed and the raw graph was committed instead.
    pub degraded: bool,
    pub metrics: LayoutMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewTransform>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutCommit {
    Ready(LayoutReport),
    /// A newer pass was planned before this one finished.
    Discarded { generation: u64 },
}

impl LayoutCommit {
    pub fn report(&self) -> Option<&LayoutReport> {
        match self {
            Self::Ready(report) => Some(report),
            Self::Discarded { .. } => None,
        }
    }

    pub fn into_report(self) -> Option<LayoutReport> {
        match self {
            Self::Ready(report) => Some(report),
            Self::Discarded { .. } => None,
        }
    }
}

/// Raw nodes as given, edges whose endpoints are both present.
pub fn fallback_output(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> LayoutOutput {
    let edges = retain_connected_edges(&nodes, edges);
    LayoutOutput { nodes, edges }
}

pub struct LayoutOrchestrator {
    config: Config,
    dispatcher: LayoutDispatcher,
    positions: PositionStore,
    previous_full: Option<(EngineKind, LayoutOptions)>,
    previous_view: Option<ViewState>,
    /// A major change was planned and no full pass has committed since.
    refit_pending: bool,
    latest_generation: Arc<AtomicU64>,
    observer: Option<Arc<dyn LayoutObserver>>,
}

impl std::fmt::Debug for LayoutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutOrchestrator")
            .field("positions", &self.positions.len())
            .field("previous_full", &self.previous_full)
            .field("refit_pending", &self.refit_pending)
            .field("generation", &self.latest_generation.load(Ordering::Relaxed))
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl LayoutOrchestrator {
    pub fn new(config: Config) -> Self {
        let dispatcher = LayoutDispatcher::new(config.worker.clone());
        Self {
            config,
            dispatcher,
            positions: PositionStore::new(),
            previous_full: None,
            previous_view: None,
            refit_pending: false,
            latest_generation: Arc::new(AtomicU64::new(0)),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LayoutObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &LayoutDispatcher {
        &self.dispatcher
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    /// Engine of the last committed full layout.
    pub fn previous_engine(&self) -> Option<EngineKind> {
        self.previous_full.as_ref().map(|(engine, _)| *engine)
    }

    pub fn plan(&mut self, arch: &Architecture, view: &ViewState) -> LayoutPlan {
        let generation = self.latest_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = LayoutToken {
            generation,
            latest: Arc::clone(&self.latest_generation),
        };
        let raw = to_graph(arch, view, &self.config.layout.sizes);

        let major = self
            .previous_view
            .as_ref()
            .is_none_or(|previous| view.is_major_change_from(previous));
        if major {
            self.positions.clear();
            self.refit_pending = true;
        }
        self.previous_view = Some(view.clone());

        let selection = select_layout_config(
            &raw.nodes,
            &raw.edges,
            view.level,
            view.focused_system_id.as_deref(),
            view.focused_container_id.as_deref(),
            &view.expanded,
            &self.config.rules,
        );

        let incremental = match &self.previous_full {
            Some((engine, options)) if !major && !self.positions.is_empty() => {
                Some((*engine, options.clone()))
            }
            _ => None,
        };
        let (decision, pass) = match incremental {
            Some((engine, layout)) => (
                LayoutDecision {
                    engine,
                    direction: layout.direction,
                    use_incremental: true,
                    use_worker: false,
                },
                Pass::Incremental {
                    options: IncrementalOptions { engine, layout },
                    positions: self.positions.clone(),
                },
            ),
            None => {
                let options = LayoutOptions::from_config(
                    &self.config.layout,
                    selection.direction,
                    selection.options.enterprise_boundary,
                );
                let path = self.dispatcher.path_for(raw.nodes.len(), raw.edges.len());
                (
                    LayoutDecision {
                        engine: selection.engine,
                        direction: selection.direction,
                        use_incremental: false,
                        use_worker: path == DispatchPath::Worker,
                    },
                    Pass::Full(options),
                )
            }
        };
        let fit_view = !decision.use_incremental && self.refit_pending;

        tracing::debug!(
            generation,
            major,
            nodes = raw.nodes.len(),
            edges = raw.edges.len(),
            ?decision,
            "planned layout pass"
        );
        LayoutPlan {
            token,
            decision,
            pass,
            raw,
            fit_view,
            started: Instant::now(),
        }
    }

    /// Applies a finished pass. Stale results are dropped; failures degrade
    /// to the raw graph instead of surfacing an error.
    pub fn commit(
        &mut self,
        plan: LayoutPlan,
        result: Result<LayoutOutput, LayoutError>,
    ) -> LayoutCommit {
        let generation = plan.token.generation;
        if !plan.token.is_current() {
            tracing::debug!(generation, "discarding stale layout result");
            return LayoutCommit::Discarded { generation };
        }

        let (output, degraded) = match result {
            Ok(output) => {
                self.positions.update_from_nodes(&output.nodes);
                self.positions.update_routes(&output.edges);
                if let Pass::Full(options) = &plan.pass {
                    self.previous_full = Some((plan.decision.engine, options.clone()));
                    self.refit_pending = false;
                }
                (output, false)
            }
            Err(err) => {
                tracing::warn!(generation, error = %err, "layout failed, showing raw graph");
                (fallback_output(plan.raw.nodes, plan.raw.edges), true)
            }
        };

        let metrics = LayoutMetrics::measure(
            &output.nodes,
            &output.edges,
            plan.decision.engine,
            plan.decision.use_incremental,
            plan.started.elapsed(),
        );
        tracing::debug!(
            mark = "layout-end",
            generation,
            duration_ms = metrics.duration_ms,
            degraded
        );
        if let Some(observer) = &self.observer {
            observer.on_layout_complete(&output.nodes, &output.edges, &metrics);
        }

        let viewport = plan
            .fit_view
            .then(|| fit_bounds(metrics.bounds, &self.config.viewport));
        LayoutCommit::Ready(LayoutReport {
            generation,
            nodes: output.nodes,
            edges: output.edges,
            decision: plan.decision,
            fit_view: plan.fit_view,
            degraded,
            metrics,
            viewport,
        })
    }

    pub async fn run(&mut self, arch: &Architecture, view: &ViewState) -> LayoutCommit {
        let plan = self.plan(arch, view);
        let result = plan.execute(&self.dispatcher).await;
        self.commit(plan, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::C4Level;
    use crate::layout::test_support::{edge, node};
    use std::sync::Mutex;

    fn platform() -> Architecture {
        Architecture::from_json(
            r#"{
              "systems": [
                {"id": "a", "containers": [
                  {"id": "x"},
                  {"id": "y", "components": [{"id": "p"}, {"id": "q"}, {"id": "r"}]}
                ]},
                {"id": "b", "containers": [{"id": "z"}]}
              ],
              "relations": [
                {"from": "a.x", "to": "b.z"},
                {"from": "b.z", "to": "a.x"},
                {"from": "a.y.p", "to": "a.y.q"},
                {"from": "a.y.q", "to": "a.y.r"},
                {"from": "a.y.r", "to": "a.y.p"}
              ]
            }"#,
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        passes: Mutex<Vec<(usize, bool)>>,
    }

    impl LayoutObserver for Recorder {
        fn on_layout_complete(&self, nodes: &[GraphNode], _: &[GraphEdge], metrics: &LayoutMetrics) {
            self.passes
                .lock()
                .unwrap()
                .push((nodes.len(), metrics.incremental));
        }
    }

    #[tokio::test]
    async fn expansion_keeps_previous_engine() {
        let arch = platform();
        let mut orchestrator = LayoutOrchestrator::new(Config::default());
        let first = orchestrator
            .run(&arch, &ViewState::new(C4Level::L2))
            .await
            .into_report()
            .unwrap();
        assert_eq!(first.decision.engine, EngineKind::Sruja);
        assert!(!first.decision.use_incremental);
        assert!(first.fit_view && first.viewport.is_some());

        let expanded = ViewState::new(C4Level::L2).expand("a.y");
        let plan = orchestrator.plan(&arch, &expanded);
        let fresh = select_layout_config(
            &plan.raw().nodes,
            &plan.raw().edges,
            C4Level::L2,
            None,
            None,
            &expanded.expanded,
            &orchestrator.config().rules,
        );
        assert_eq!(fresh.engine, EngineKind::C4Level);
        assert_eq!(plan.decision().engine, EngineKind::Sruja);
        assert!(plan.decision().use_incremental);
        assert!(!plan.fit_view());

        let result = plan.execute(orchestrator.dispatcher()).await;
        let second = orchestrator.commit(plan, result).into_report().unwrap();
        for before in &first.nodes {
            let after = second.nodes.iter().find(|n| n.id == before.id).unwrap();
            assert_eq!(after.position, before.position, "{}", before.id);
        }
        assert_eq!(orchestrator.previous_engine(), Some(EngineKind::Sruja));
    }

    #[tokio::test]
    async fn focus_change_is_a_full_pass() {
        let arch = platform();
        let mut orchestrator = LayoutOrchestrator::new(Config::default());
        orchestrator.run(&arch, &ViewState::new(C4Level::L2)).await;
        let view = ViewState::new(C4Level::L2).focus_system("a");
        let report = orchestrator.run(&arch, &view).await.into_report().unwrap();
        assert!(!report.decision.use_incremental);
        assert!(report.fit_view);
    }

    #[tokio::test]
    async fn stale_pass_is_discarded() {
        let arch = platform();
        let mut orchestrator = LayoutOrchestrator::new(Config::default());
        let older = orchestrator.plan(&arch, &ViewState::new(C4Level::L1));
        let newer = orchestrator.plan(&arch, &ViewState::new(C4Level::L2));
        assert!(!older.token().is_current());

        let older_result = older.execute(orchestrator.dispatcher()).await;
        let newer_result = newer.execute(orchestrator.dispatcher()).await;
        let generation = older.token().generation();
        assert_eq!(
            orchestrator.commit(older, older_result),
            LayoutCommit::Discarded { generation }
        );
        let report = orchestrator.commit(newer, newer_result).into_report().unwrap();
        assert!(report.nodes.iter().any(|n| n.id == "a.x"));
    }

    #[tokio::test]
    async fn superseded_level_change_still_refits() {
        let arch = platform();
        let mut orchestrator = LayoutOrchestrator::new(Config::default());
        orchestrator.run(&arch, &ViewState::new(C4Level::L1)).await;

        let level_change = orchestrator.plan(&arch, &ViewState::new(C4Level::L2));
        let expand = orchestrator.plan(&arch, &ViewState::new(C4Level::L2).expand("a.y"));
        let level_result = level_change.execute(orchestrator.dispatcher()).await;
        let expand_result = expand.execute(orchestrator.dispatcher()).await;
        assert!(orchestrator.commit(level_change, level_result).report().is_none());

        let report = orchestrator.commit(expand, expand_result).into_report().unwrap();
        assert!(!report.decision.use_incremental);
        assert!(report.fit_view);
        assert!(report.viewport.is_some());

        let next = orchestrator
            .run(&arch, &ViewState::new(C4Level::L2).expand("a.y").expand("a.x"))
            .await
            .into_report()
            .unwrap();
        assert!(!next.fit_view);
    }

    #[tokio::test]
    async fn degraded_level_change_refits_on_next_full_pass() {
        let arch = platform();
        let mut orchestrator = LayoutOrchestrator::new(Config::default());
        orchestrator.run(&arch, &ViewState::new(C4Level::L1)).await;

        let plan = orchestrator.plan(&arch, &ViewState::new(C4Level::L2));
        let degraded = orchestrator
            .commit(plan, Err(LayoutError::Computation("boom".to_string())))
            .into_report()
            .unwrap();
        assert!(degraded.degraded);

        let report = orchestrator
            .run(&arch, &ViewState::new(C4Level::L2).expand("a.y"))
            .await
            .into_report()
            .unwrap();
        assert!(!report.decision.use_incremental);
        assert!(report.fit_view);
    }

    #[tokio::test]
    async fn failed_pass_degrades_to_raw_graph() {
        let recorder = Arc::new(Recorder::default());
        let mut orchestrator =
            LayoutOrchestrator::new(Config::default()).with_observer(recorder.clone());
        let plan = orchestrator.plan(&platform(), &ViewState::new(C4Level::L1));
        let raw = plan.raw().clone();
        let report = orchestrator
            .commit(plan, Err(LayoutError::Computation("boom".to_string())))
            .into_report()
            .unwrap();
        assert!(report.degraded);
        assert_eq!(report.nodes, raw.nodes);
        assert!(orchestrator.positions().is_empty());
        assert_eq!(orchestrator.previous_engine(), None);
        assert_eq!(*recorder.passes.lock().unwrap(), vec![(raw.nodes.len(), false)]);
    }

    #[test]
    fn fallback_keeps_only_connected_edges() {
        let output = fallback_output(
            vec![node("A", None), node("B", None)],
            vec![edge("A", "B"), edge("A", "C")],
        );
        assert_eq!(output.nodes.len(), 2);
        assert_eq!(output.edges, vec![edge("A", "B")]);
    }
}
