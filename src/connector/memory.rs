//! In-memory graph connector for unit and property tests.
//!
//! Mirrors `InMemoryGraphBackend` (`src/storage/graph/memory.rs`): an
//! `RwLock`-guarded adjacency structure, same trait, same concurrent-safety
//! story, no persistence.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::instrument;

use super::{FrontierInput, GraphConnector};
use crate::Result;
use crate::model::{ExpansionCandidate, GraphEdge, GraphNode, PropertyMap, SeedFetchResult};
use crate::tag_sim::tag_sim;

/// A stored, undirected `RELATES` edge between two node ids.
#[derive(Debug, Clone)]
struct StoredEdge {
    a: String,
    b: String,
    weight: Option<f64>,
    tags: Vec<String>,
    properties: PropertyMap,
}

impl StoredEdge {
    fn other_end(&self, from: &str) -> Option<&str> {
        if self.a == from {
            Some(self.b.as_str())
        } else if self.b == from {
            Some(self.a.as_str())
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryGraph {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<StoredEdge>,
    /// node id -> indices into `edges` incident to it (either endpoint).
    adjacency: HashMap<String, Vec<usize>>,
}

/// An `RwLock`-guarded adjacency-list graph, safe for concurrent reads and
/// for the occasional test-setup write.
#[derive(Debug, Clone)]
pub struct InMemoryGraphConnector {
    inner: Arc<RwLock<InMemoryGraph>>,
    tag_sim_floor: f64,
    min_activation: f64,
}

impl Default for InMemoryGraphConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphConnector {
    /// Creates an empty graph using the crate-default tag-similarity floor
    /// and minimum activation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(InMemoryGraph::default())),
            tag_sim_floor: crate::config::DEFAULT_TAG_SIM_FLOOR,
            min_activation: crate::config::DEFAULT_MIN_ACTIVATION,
        }
    }

    /// Creates an empty graph honoring a specific [`crate::RetrievalConfig`]'s
    /// `tag_sim_floor` and `min_activation`.
    #[must_use]
    pub fn with_config(config: &crate::config::RetrievalConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(InMemoryGraph::default())),
            tag_sim_floor: config.tag_sim_floor,
            min_activation: config.min_activation,
        }
    }

    /// Inserts or replaces a node.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only helper).
    pub fn add_node(&self, node: GraphNode) {
        let mut guard = self.inner.write().expect("in-memory graph lock poisoned");
        guard.nodes.insert(node.id.clone(), node);
    }

    /// Adds an undirected `RELATES` edge between `a` and `b`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only helper).
    pub fn add_edge(
        &self,
        a: impl Into<String>,
        b: impl Into<String>,
        weight: Option<f64>,
        tags: Vec<String>,
        properties: PropertyMap,
    ) {
        let a = a.into();
        let b = b.into();
        let mut guard = self.inner.write().expect("in-memory graph lock poisoned");
        let idx = guard.edges.len();
        guard.edges.push(StoredEdge {
            a: a.clone(),
            b: b.clone(),
            weight,
            tags,
            properties,
        });
        guard.adjacency.entry(a).or_default().push(idx);
        guard.adjacency.entry(b).or_default().push(idx);
    }
}

impl GraphConnector for InMemoryGraphConnector {
    #[instrument(skip(self))]
    async fn fetch_seed(&self, node_id: &str) -> Result<SeedFetchResult> {
        metrics::counter!("hippocampus_connector_fetch_seed_total").increment(1);
        let guard = self.inner.read().expect("in-memory graph lock poisoned");
        Ok(match guard.nodes.get(node_id) {
            Some(node) => SeedFetchResult {
                node: Some(node.clone()),
                labels: node.labels.clone(),
                found: true,
            },
            None => SeedFetchResult::not_found(),
        })
    }

    #[instrument(skip(self, frontier, visited_ids, query_tags))]
    async fn expand_frontier(
        &self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        query_tags: &[String],
    ) -> Result<Vec<ExpansionCandidate>> {
        metrics::counter!("hippocampus_connector_expand_frontier_total").increment(1);
        let guard = self.inner.read().expect("in-memory graph lock poisoned");

        let mut out = Vec::new();
        for (parent_id, activation) in frontier {
            let Some(edge_indices) = guard.adjacency.get(parent_id) else {
                continue;
            };
            let degree = edge_indices.len();
            if degree == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let sqrt_degree = (degree as f64).sqrt();

            let mut candidates: Vec<ExpansionCandidate> = Vec::new();
            for &idx in edge_indices {
                let stored = &guard.edges[idx];
                let Some(neighbor_id) = stored.other_end(parent_id) else {
                    continue;
                };
                if visited_ids.contains(neighbor_id) {
                    continue;
                }
                let Some(neighbor_node) = guard.nodes.get(neighbor_id) else {
                    continue;
                };

                let weight = stored.weight.unwrap_or(crate::model::DEFAULT_EDGE_WEIGHT);
                let sim = tag_sim(&stored.tags, query_tags, self.tag_sim_floor);
                let transfer_energy = (activation * weight / sqrt_degree) * sim;

                if transfer_energy <= self.min_activation {
                    continue;
                }

                candidates.push(ExpansionCandidate {
                    parent_id: parent_id.clone(),
                    neighbor_node: neighbor_node.clone(),
                    edge: GraphEdge {
                        source_id: parent_id.clone(),
                        target_id: neighbor_id.to_string(),
                        edge_type: "RELATES".to_string(),
                        properties: stored.properties.clone(),
                        weight: stored.weight,
                        tags: stored.tags.clone(),
                    },
                    transfer_energy,
                });
            }

            candidates.sort_by(|a, b| {
                b.transfer_energy
                    .partial_cmp(&a.transfer_energy)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            out.extend(candidates);
        }

        Ok(out)
    }
}
