//! End-to-end exercises of the spreading-activation engine against the
//! in-memory connector, covering the concrete scenarios spec §8 seeds the
//! test suite with.

use hippocampus::connector::InMemoryGraphConnector;
use hippocampus::model::{GraphNode, PropertyMap, TerminatedReason};
use hippocampus::{RetrievalConfig, RetrieverOrchestrator, SeedInput};

fn node(id: &str) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        labels: vec!["Event".to_string()],
        properties: PropertyMap::new(),
    }
}

fn seed(id: &str, score: f64) -> SeedInput {
    SeedInput {
        node_id: id.to_string(),
        score,
    }
}

/// Scenario A: single-hop expansion, tag floor applies since the edge
/// carries no tags while the query does.
#[tokio::test]
async fn scenario_a_single_hop_tag_floor() {
    let connector = InMemoryGraphConnector::new();
    connector.add_node(node("S"));
    connector.add_node(node("A"));
    connector.add_edge("S", "A", Some(0.8), vec![], PropertyMap::new());

    let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
    let mut stream = orchestrator.explore(vec![seed("S", 1.0)], vec!["x".to_string()]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    assert_eq!(result.paths.len(), 1);
    let energy = result.paths[0].steps[0].transfer_energy;
    assert!((energy - 0.120).abs() < 1e-9, "expected ~0.120, got {energy}");
}

/// Scenario B: per-parent top-K with `MAX_BRANCHES = 2` out of 3 equal
/// neighbors — exactly two survive.
#[tokio::test]
async fn scenario_b_per_parent_top_k() {
    let connector = InMemoryGraphConnector::new();
    for id in ["S", "A", "B", "C"] {
        connector.add_node(node(id));
    }
    for neighbor in ["A", "B", "C"] {
        connector.add_edge("S", neighbor, Some(0.5), vec!["t".to_string()], PropertyMap::new());
    }

    let config = RetrievalConfig::default().with_max_branches(2);
    let orchestrator = RetrieverOrchestrator::new(connector, config).unwrap();
    let mut stream = orchestrator.explore(vec![seed("S", 1.0)], vec!["t".to_string()]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    assert_eq!(result.paths.len(), 2);
}

/// Scenario C: degree penalty — a parent with degree 1 delivers twice the
/// energy of a parent with degree 4, all else equal.
#[tokio::test]
async fn scenario_c_degree_penalty() {
    let connector = InMemoryGraphConnector::new();
    for id in ["p1", "p2", "n1", "n2", "x", "y", "z"] {
        connector.add_node(node(id));
    }
    connector.add_edge("p1", "n1", Some(0.5), vec![], PropertyMap::new());
    connector.add_edge("p1", "x", Some(0.5), vec![], PropertyMap::new());
    connector.add_edge("p1", "y", Some(0.5), vec![], PropertyMap::new());
    connector.add_edge("p1", "z", Some(0.5), vec![], PropertyMap::new());
    connector.add_edge("p2", "n2", Some(0.5), vec![], PropertyMap::new());

    let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
    let mut stream = orchestrator.explore(vec![seed("p1", 1.0), seed("p2", 1.0)], vec![]).unwrap();

    let mut by_seed = std::collections::HashMap::new();
    while let Some(result) = stream.next().await {
        let result = result.unwrap();
        by_seed.insert(result.seed.node_id.clone(), result);
    }

    let e1 = by_seed["p1"].paths[0].steps[0].transfer_energy;
    let e2 = by_seed["p2"].paths[0].steps[0].transfer_energy;
    assert!((e2 - 2.0 * e1).abs() < 1e-9, "p2's branch should carry twice p1's energy");
}

/// Scenario D: a candidate whose energy exactly equals `MIN_ACTIVATION`
/// (not strictly greater) is pruned.
#[tokio::test]
async fn scenario_d_threshold_prune() {
    let connector = InMemoryGraphConnector::new();
    connector.add_node(node("S"));
    connector.add_node(node("A"));
    connector.add_edge("S", "A", Some(0.005), vec![], PropertyMap::new());

    let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
    let mut stream = orchestrator.explore(vec![seed("S", 1.0)], vec![]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    assert!(result.paths.is_empty());
    assert_eq!(result.terminated_reason, TerminatedReason::NoMorePaths);
}

/// Scenario E: seed not found yields no expansion and a dedicated
/// terminated reason.
#[tokio::test]
async fn scenario_e_seed_not_found() {
    let connector = InMemoryGraphConnector::new();
    let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
    let mut stream = orchestrator.explore(vec![seed("Z", 0.9)], vec![]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    assert_eq!(result.terminated_reason, TerminatedReason::SeedNotFound);
    assert!(result.paths.is_empty());
    assert!(result.seed_node.is_none());
}

/// Scenario F: a triangle S-A-B-S never produces a path that revisits S,
/// and traversal terminates instead of looping forever.
#[tokio::test]
async fn scenario_f_cycle_avoidance() {
    let connector = InMemoryGraphConnector::new();
    for id in ["S", "A", "B"] {
        connector.add_node(node(id));
    }
    connector.add_edge("S", "A", Some(1.0), vec![], PropertyMap::new());
    connector.add_edge("A", "B", Some(1.0), vec![], PropertyMap::new());
    connector.add_edge("B", "S", Some(1.0), vec![], PropertyMap::new());

    let config = RetrievalConfig::default().with_max_depth(5);
    let orchestrator = RetrieverOrchestrator::new(connector, config).unwrap();
    let mut stream = orchestrator.explore(vec![seed("S", 1.0)], vec![]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    for path in &result.paths {
        let ids = path.node_ids();
        assert_eq!(ids[0], "S");
        assert!(!ids[1..].contains(&"S"), "S must not reappear mid-path");
    }
    assert!(result.max_depth_reached <= 5);
}

/// `MAX_DEPTH = 1` bounds every returned path to exactly one step.
#[tokio::test]
async fn max_depth_one_bounds_every_path_to_one_step() {
    let connector = InMemoryGraphConnector::new();
    for id in ["S", "A", "B"] {
        connector.add_node(node(id));
    }
    connector.add_edge("S", "A", Some(1.0), vec![], PropertyMap::new());
    connector.add_edge("A", "B", Some(1.0), vec![], PropertyMap::new());

    let config = RetrievalConfig::default().with_max_depth(1);
    let orchestrator = RetrieverOrchestrator::new(connector, config).unwrap();
    let mut stream = orchestrator.explore(vec![seed("S", 1.0)], vec![]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    for path in &result.paths {
        assert_eq!(path.len(), 1);
    }
    assert_eq!(result.terminated_reason, TerminatedReason::MaxDepth);
}

/// The seed's own node data (label, properties) survives into the first
/// hop of every path, not just a bare id — formatters depend on this.
#[tokio::test]
async fn seed_node_data_is_preserved_in_first_hop() {
    let connector = InMemoryGraphConnector::new();
    let mut seed_props = PropertyMap::new();
    seed_props.insert("text".to_string(), serde_json::json!("hello world"));
    connector.add_node(GraphNode {
        id: "S".to_string(),
        labels: vec!["UserRequest".to_string()],
        properties: seed_props,
    });
    connector.add_node(node("A"));
    connector.add_edge("S", "A", Some(0.8), vec![], PropertyMap::new());

    let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
    let mut stream = orchestrator.explore(vec![seed("S", 1.0)], vec![]).unwrap();
    let result = stream.next().await.unwrap().unwrap();

    let first_step = &result.paths[0].steps[0];
    assert_eq!(first_step.from_node.label(), Some("UserRequest"));
    assert_eq!(first_step.from_node.text(), Some("hello world"));

    let ctx = hippocampus::formatters::to_llm_context(&result);
    let rendered = ctx["paths"][0].as_str().unwrap();
    assert!(rendered.contains("(UserRequest S: \"hello world\")"));
}

/// Concurrent seeds are explored without interleaving corrupting either
/// seed's own visited/frontier bookkeeping.
#[tokio::test]
async fn concurrent_seeds_do_not_interfere() {
    let connector = InMemoryGraphConnector::new();
    connector.add_node(node("s1"));
    connector.add_node(node("s2"));
    connector.add_node(node("shared_neighbor"));
    connector.add_edge("s1", "shared_neighbor", Some(0.6), vec![], PropertyMap::new());
    connector.add_edge("s2", "shared_neighbor", Some(0.6), vec![], PropertyMap::new());

    let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
    let mut stream = orchestrator.explore(vec![seed("s1", 1.0), seed("s2", 1.0)], vec![]).unwrap();

    let mut seen = std::collections::HashSet::new();
    while let Some(result) = stream.next().await {
        let result = result.unwrap();
        assert_eq!(result.paths.len(), 1);
        seen.insert(result.seed.node_id);
    }
    assert_eq!(seen.len(), 2);
}

/// Sanity check that the crate's dev test harness also exercises
/// `tokio_test`'s synchronous block-on path for code that does not need a
/// full multi-seed stream.
#[test]
fn tag_sim_default_floor_matches_config_default_via_block_on() {
    let floor = tokio_test::block_on(async {
        let connector = InMemoryGraphConnector::new();
        let config = RetrievalConfig::default();
        connector.add_node(node("S"));
        RetrieverOrchestrator::new(connector, config.clone())
            .unwrap()
            .config()
            .tag_sim_floor
    });
    assert!((floor - 0.15).abs() < f64::EPSILON);
}
