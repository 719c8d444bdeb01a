//! Benchmarks for the spreading-activation traversal, end to end through
//! `RetrieverOrchestrator::explore` against the in-memory connector.
//!
//! Benchmark targets:
//! - Single seed, depth 3, branching factor 3: <1ms
//! - Single seed, depth 5 (default `MAX_DEPTH`), branching factor 3: <5ms
//! - Five concurrent seeds over a shared graph: <10ms

use criterion::{Criterion, criterion_group, criterion_main};
use hippocampus::connector::InMemoryGraphConnector;
use hippocampus::model::{GraphNode, PropertyMap};
use hippocampus::{RetrievalConfig, RetrieverOrchestrator, SeedInput};

/// Builds a balanced tree graph of the given branching factor and depth,
/// rooted at `n0`, so every level is fully populated and the traversal has
/// real fan-out to select among at every depth.
fn build_tree_connector(branching: usize, depth: usize) -> InMemoryGraphConnector {
    let connector = InMemoryGraphConnector::new();
    connector.add_node(GraphNode {
        id: "n0".to_string(),
        labels: vec!["Event".to_string()],
        properties: PropertyMap::new(),
    });

    let mut next_id = 1usize;
    let mut level = vec!["n0".to_string()];
    for _ in 0..depth {
        let mut next_level = Vec::new();
        for parent in &level {
            for _ in 0..branching {
                let id = format!("n{next_id}");
                next_id += 1;
                connector.add_node(GraphNode {
                    id: id.clone(),
                    labels: vec!["Event".to_string()],
                    properties: PropertyMap::new(),
                });
                connector.add_edge(parent.clone(), id.clone(), Some(0.7), vec![], PropertyMap::new());
                next_level.push(id);
            }
        }
        level = next_level;
    }

    connector
}

fn bench_single_seed(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("single_seed_depth_3_branch_3", |b| {
        b.iter_batched(
            || {
                let connector = build_tree_connector(3, 3);
                let config = RetrievalConfig::default().with_max_depth(3);
                RetrieverOrchestrator::new(connector, config).unwrap()
            },
            |orchestrator| {
                rt.block_on(async {
                    let mut stream = orchestrator.explore(
                        vec![SeedInput { node_id: "n0".to_string(), score: 1.0 }],
                        vec![],
                    ).unwrap();
                    while stream.next().await.is_some() {}
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });

    c.bench_function("single_seed_default_depth", |b| {
        b.iter_batched(
            || {
                let connector = build_tree_connector(3, 5);
                let config = RetrievalConfig::default();
                RetrieverOrchestrator::new(connector, config).unwrap()
            },
            |orchestrator| {
                rt.block_on(async {
                    let mut stream = orchestrator.explore(
                        vec![SeedInput { node_id: "n0".to_string(), score: 1.0 }],
                        vec![],
                    ).unwrap();
                    while stream.next().await.is_some() {}
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_concurrent_seeds(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("five_concurrent_seeds", |b| {
        b.iter_batched(
            || {
                let connector = build_tree_connector(4, 4);
                let seeds: Vec<SeedInput> = (0..5)
                    .map(|i| SeedInput { node_id: format!("n{i}"), score: 1.0 })
                    .collect();
                let orchestrator =
                    RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
                (orchestrator, seeds)
            },
            |(orchestrator, seeds)| {
                rt.block_on(async {
                    let mut stream = orchestrator.explore(seeds, vec![]).unwrap();
                    while stream.next().await.is_some() {}
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_single_seed, bench_concurrent_seeds);
criterion_main!(benches);
