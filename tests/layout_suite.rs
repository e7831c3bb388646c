use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use sruja_layout::config::Config;
use sruja_layout::ir::{C4Level, GraphEdge, GraphNode};
use sruja_layout::layout::{
    ENTERPRISE_BOUNDARY_ID, EngineKind, LayoutDirection, LayoutOptions, LayoutOutput,
};
use sruja_layout::orchestrator::{LayoutCommit, LayoutOrchestrator, fallback_output};
use sruja_layout::{Architecture, ViewState, select_layout_config, to_graph};

fn load_fixture(name: &str) -> Architecture {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    Architecture::load(&path).expect("fixture load failed")
}

fn views() -> Vec<(&'static str, ViewState)> {
    vec![
        ("context", ViewState::new(C4Level::L1)),
        ("context expanded", ViewState::new(C4Level::L1).expand("shop")),
        ("containers", ViewState::new(C4Level::L2)),
        ("focused system", ViewState::new(C4Level::L2).focus_system("shop")),
        ("components", ViewState::new(C4Level::L3)),
        (
            "focused container",
            ViewState::new(C4Level::L3)
                .focus_system("shop")
                .focus_container("shop.api"),
        ),
    ]
}

const DIRECTIONS: [LayoutDirection; 4] = [
    LayoutDirection::Down,
    LayoutDirection::Up,
    LayoutDirection::Right,
    LayoutDirection::Left,
];

fn full_layout(
    arch: &Architecture,
    view: &ViewState,
    engine: EngineKind,
    direction: LayoutDirection,
) -> LayoutOutput {
    let config = Config::default();
    let graph = to_graph(arch, view, &config.layout.sizes);
    let options = LayoutOptions::from_config(
        &config.layout,
        direction,
        engine == EngineKind::Sruja && view.level == C4Level::L1,
    );
    engine
        .engine()
        .compute_layout(graph.nodes, graph.edges, &options)
        .expect("layout failed")
}

fn assert_siblings_disjoint(nodes: &[GraphNode], context: &str) {
    let mut scopes: BTreeMap<Option<&str>, Vec<&GraphNode>> = BTreeMap::new();
    for node in nodes {
        scopes.entry(node.parent_id.as_deref()).or_default().push(node);
    }
    for siblings in scopes.values() {
        for (idx, a) in siblings.iter().enumerate() {
            for b in &siblings[idx + 1..] {
                assert!(
                    !a.rect().intersects(&b.rect()),
                    "{context}: {} overlaps {}",
                    a.id,
                    b.id
                );
            }
        }
    }
}

fn assert_edges_valid(nodes: &[GraphNode], edges: &[GraphEdge], context: &str) {
    let ids: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    for edge in edges {
        assert!(ids.contains(edge.source.as_str()), "{context}: {}", edge.id);
        assert!(ids.contains(edge.target.as_str()), "{context}: {}", edge.id);
        assert!(
            edge.points.as_ref().is_some_and(|points| points.len() >= 2),
            "{context}: {} has no route",
            edge.id
        );
    }
}

fn assert_children_inside(nodes: &[GraphNode], context: &str) {
    let by_id: BTreeMap<&str, &GraphNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    for node in nodes {
        let Some(parent) = node.parent_id.as_deref().and_then(|id| by_id.get(id)) else {
            continue;
        };
        let outer = parent.rect();
        let inner = node.rect();
        assert!(
            inner.x >= outer.x
                && inner.y >= outer.y
                && inner.right() <= outer.right() + 1e-3
                && inner.bottom() <= outer.bottom() + 1e-3,
            "{context}: {} escapes {}",
            node.id,
            parent.id
        );
    }
}

#[test]
fn full_layouts_hold_invariants() {
    let arch = load_fixture("shop.json");
    for (name, view) in views() {
        for engine in [EngineKind::C4Level, EngineKind::Sruja] {
            for direction in DIRECTIONS {
                let context = format!("{name} / {} / {direction:?}", engine.as_str());
                let first = full_layout(&arch, &view, engine, direction);
                let second = full_layout(&arch, &view, engine, direction);
                assert!(!first.nodes.is_empty(), "{context}: empty graph");
                assert_eq!(first, second, "{context}: layout is not deterministic");
                assert_siblings_disjoint(&first.nodes, &context);
                assert_edges_valid(&first.nodes, &first.edges, &context);
                assert_children_inside(&first.nodes, &context);
            }
        }
    }
}

#[test]
fn context_view_wraps_internal_systems() {
    let arch = load_fixture("shop.json");
    let output = full_layout(
        &arch,
        &ViewState::new(C4Level::L1),
        EngineKind::Sruja,
        LayoutDirection::Down,
    );
    let wrapped: Vec<&str> = output
        .nodes
        .iter()
        .filter(|node| node.parent_id.as_deref() == Some(ENTERPRISE_BOUNDARY_ID))
        .map(|node| node.id.as_str())
        .collect();
    assert_eq!(wrapped, vec!["admin", "shop", "warehouse"]);
}

#[test]
fn expand_then_collapse_restores_graph() {
    let arch = load_fixture("shop.json");
    let sizes = Config::default().layout.sizes;
    let collapsed = ViewState::new(C4Level::L1);
    let before = to_graph(&arch, &collapsed, &sizes);
    let expanded = to_graph(&arch, &collapsed.clone().expand("shop"), &sizes);
    assert!(expanded.nodes.len() > before.nodes.len());
    let after = to_graph(&arch, &collapsed, &sizes);
    assert_eq!(before, after);
}

#[tokio::test]
async fn incremental_pass_keeps_known_positions() {
    let arch = load_fixture("shop.json");
    let mut orchestrator = LayoutOrchestrator::new(Config::default());
    let first = orchestrator
        .run(&arch, &ViewState::new(C4Level::L1))
        .await
        .into_report()
        .expect("first pass committed");
    assert!(!first.decision.use_incremental);

    let second = orchestrator
        .run(&arch, &ViewState::new(C4Level::L1).expand("shop"))
        .await
        .into_report()
        .expect("second pass committed");
    assert!(second.decision.use_incremental);
    assert_eq!(second.decision.engine, first.decision.engine);
    assert!(!second.fit_view);
    for before in &first.nodes {
        let after = second
            .nodes
            .iter()
            .find(|node| node.id == before.id)
            .expect("node kept");
        assert_eq!(after.position, before.position, "{} moved", before.id);
    }
    assert!(second.nodes.iter().any(|node| node.id == "shop.api"));
    assert_edges_valid(&second.nodes, &second.edges, "incremental");
    assert_children_inside(&second.nodes, "incremental");

    // Collapsing again keeps everything that is still visible in place.
    let third = orchestrator
        .run(&arch, &ViewState::new(C4Level::L1))
        .await
        .into_report()
        .expect("third pass committed");
    for node in &third.nodes {
        let before = first.nodes.iter().find(|n| n.id == node.id).expect("same set");
        assert_eq!(node.position, before.position, "{} moved", node.id);
    }
}

#[tokio::test]
async fn expansion_only_pass_keeps_compound_engine() {
    let arch = load_fixture("platform.json");
    let config = Config::default();
    let mut orchestrator = LayoutOrchestrator::new(config.clone());
    let first = orchestrator.run(&arch, &ViewState::new(C4Level::L2)).await;
    assert_eq!(
        first.report().map(|report| report.decision.engine),
        Some(EngineKind::Sruja)
    );

    let view = ViewState::new(C4Level::L2).expand("a.y");
    let graph = to_graph(&arch, &view, &config.layout.sizes);
    let fresh = select_layout_config(
        &graph.nodes,
        &graph.edges,
        view.level,
        None,
        None,
        &view.expanded,
        &config.rules,
    );
    assert_eq!(fresh.engine, EngineKind::C4Level);

    let second = orchestrator.run(&arch, &view).await.into_report().unwrap();
    assert!(second.decision.use_incremental);
    assert_eq!(second.decision.engine, EngineKind::Sruja);
}

fn wide_architecture(systems: usize) -> Architecture {
    let systems: Vec<String> = (0..systems)
        .map(|i| format!(r#"{{"id": "sys{i:03}"}}"#))
        .collect();
    Architecture::from_json(&format!(r#"{{"systems": [{}]}}"#, systems.join(",")))
        .expect("generated architecture")
}

#[tokio::test]
async fn large_graphs_go_to_the_worker() {
    for (count, worker) in [(80, false), (81, true)] {
        let mut orchestrator = LayoutOrchestrator::new(Config::default());
        let report = orchestrator
            .run(&wide_architecture(count), &ViewState::new(C4Level::L1))
            .await
            .into_report()
            .unwrap();
        assert_eq!(report.decision.use_worker, worker, "{count} nodes");
        assert_eq!(report.nodes.len(), count);
        assert!(!report.degraded);
        assert_eq!(report.metrics.sibling_overlaps, 0);
    }
}

#[tokio::test]
async fn only_the_newest_pass_commits() {
    let arch = load_fixture("shop.json");
    let mut orchestrator = LayoutOrchestrator::new(Config::default());
    let stale = orchestrator.plan(&arch, &ViewState::new(C4Level::L2));
    let current = orchestrator.plan(&arch, &ViewState::new(C4Level::L1));

    let current_result = current.execute(orchestrator.dispatcher()).await;
    let stale_result = stale.execute(orchestrator.dispatcher()).await;
    let committed = orchestrator.commit(current, current_result);
    assert!(committed.report().is_some());
    let positions = orchestrator.positions().len();

    let generation = stale.token().generation();
    assert_eq!(
        orchestrator.commit(stale, stale_result),
        LayoutCommit::Discarded { generation }
    );
    assert_eq!(orchestrator.positions().len(), positions);
}

#[test]
fn fallback_prunes_dangling_edges() {
    let arch = Architecture::from_json(r#"{"systems": [{"id": "A"}, {"id": "B"}]}"#).unwrap();
    let graph = to_graph(&arch, &ViewState::new(C4Level::L1), &Config::default().layout.sizes);
    let mut edges = Vec::new();
    for (source, target) in [("A", "B"), ("A", "C")] {
        edges.push(GraphEdge {
            id: format!("{source}->{target}#0"),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            technology: None,
            interaction_kind: Default::default(),
            points: None,
        });
    }
    let output = fallback_output(graph.nodes.clone(), edges);
    assert_eq!(output.nodes, graph.nodes);
    assert_eq!(output.edges.len(), 1);
    assert_eq!(output.edges[0].target, "B");
}
