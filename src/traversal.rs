//! Traversal state: per-seed, in-memory BFS bookkeeping.
//!
//! Purely in-memory; never talks to the graph store. Generalizes the
//! teacher's `GraphRAGService::traverse_entity` frontier/visited loop
//! (`src/services/graph_rag.rs`) with per-parent top-K selection and
//! cross-parent claim arbitration, as spec §4.3 requires.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::RetrievalConfig;
use crate::model::{ExpansionCandidate, FrontierNode, GraphNode, GraphPath, GraphStep, NodeId};

/// Per-seed BFS state machine.
///
/// All fields are local to one exploration task; nothing here is shared
/// across seeds (spec §3 "Lifecycle").
#[derive(Debug)]
pub struct TraversalState {
    seed_node: GraphNode,
    frontier: Vec<FrontierNode>,
    visited: HashSet<NodeId>,
    completed_paths: Vec<GraphPath>,
    depth: usize,
    max_branches: usize,
}

impl TraversalState {
    /// Constructs the initial state for a seed: a single-entry frontier at
    /// the seed node with activation `seed_score`, and `visited` seeded
    /// with the seed's own id.
    #[must_use]
    pub fn new(seed_node: &GraphNode, seed_score: f64, config: &RetrievalConfig) -> Self {
        let seed_id = NodeId::new(seed_node.id.clone());
        let mut visited = HashSet::new();
        visited.insert(seed_id.clone());

        Self {
            seed_node: seed_node.clone(),
            frontier: vec![FrontierNode {
                node_id: seed_id,
                activation: seed_score,
                path: GraphPath::empty(),
            }],
            visited,
            completed_paths: Vec::new(),
            depth: 0,
            max_branches: config.max_branches,
        }
    }

    /// Whether the current frontier is empty (the loop should stop).
    #[must_use]
    pub fn frontier_is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Current depth (number of expansion rounds completed so far).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Projects the current frontier as `(node_id, activation)` pairs for
    /// handoff to [`crate::connector::GraphConnector::expand_frontier`].
    #[must_use]
    pub fn build_frontier_inputs(&self) -> Vec<(String, f64)> {
        self.frontier
            .iter()
            .map(|f| (f.node_id.as_str().to_string(), f.activation))
            .collect()
    }

    /// The ids currently visited (monotonically grows over the exploration).
    #[must_use]
    pub fn visited(&self) -> HashSet<String> {
        self.visited.iter().map(|id| id.as_str().to_string()).collect()
    }

    /// All completed paths gathered so far.
    #[must_use]
    pub fn completed_paths(&self) -> &[GraphPath] {
        &self.completed_paths
    }

    /// Consumes the state, returning its completed paths.
    #[must_use]
    pub fn into_completed_paths(self) -> Vec<GraphPath> {
        self.completed_paths
    }

    /// Groups a flat candidate list (as returned by the connector) by
    /// `parent_id`, preserving each group's relative order — the connector
    /// already returns candidates sorted descending by energy within a
    /// group, so no re-sort is needed here.
    #[must_use]
    pub fn group_candidates_by_parent(
        candidates: Vec<ExpansionCandidate>,
    ) -> HashMap<String, Vec<ExpansionCandidate>> {
        let mut grouped: HashMap<String, Vec<ExpansionCandidate>> = HashMap::new();
        for candidate in candidates {
            grouped
                .entry(candidate.parent_id.clone())
                .or_default()
                .push(candidate);
        }
        grouped
    }

    /// Advances the frontier by one depth level.
    ///
    /// For each current frontier node, takes its top `MAX_BRANCHES`
    /// candidates (already sorted by energy descending), then arbitrates
    /// claims across parents: if two parents both claim the same neighbor,
    /// the higher-energy claim wins, with ties broken lexicographically
    /// ascending on `parent_id` (spec §9's Open Question resolution).
    ///
    /// A frontier node that had at least one step in its path and ends up
    /// with zero surviving claims is finalized into `completed_paths`. The
    /// zero-step seed itself is never finalized here — an empty-path
    /// exploration becomes `terminated_reason = no_more_paths` with
    /// `paths = []` at the orchestrator layer (spec §4.3 point 3).
    ///
    /// Advances `depth` by one and returns the ids newly added to
    /// `visited` this round, for the orchestrator's own bookkeeping.
    pub fn select_next_frontier(
        &mut self,
        candidates_by_parent: &HashMap<String, Vec<ExpansionCandidate>>,
    ) -> HashSet<String> {
        // Collect each parent's top-K claims, keyed by neighbor id so we
        // can arbitrate cross-parent collisions.
        let mut claims: HashMap<String, (usize, ExpansionCandidate)> = HashMap::new();
        let mut per_parent_survivors: Vec<Vec<String>> = vec![Vec::new(); self.frontier.len()];

        for (parent_index, parent) in self.frontier.iter().enumerate() {
            let Some(parent_candidates) = candidates_by_parent.get(parent.node_id.as_str()) else {
                continue;
            };

            for candidate in parent_candidates.iter().take(self.max_branches) {
                let neighbor_id = candidate.neighbor_node.id.clone();
                per_parent_survivors[parent_index].push(neighbor_id.clone());

                match claims.get(&neighbor_id) {
                    Some((_, existing)) => {
                        if Self::claim_wins(candidate, existing) {
                            claims.insert(neighbor_id, (parent_index, candidate.clone()));
                        }
                    },
                    None => {
                        claims.insert(neighbor_id, (parent_index, candidate.clone()));
                    },
                }
            }
        }

        // A neighbor only "survives" for a given parent if that parent's
        // claim is the one that won arbitration.
        let mut winning_parent_of: HashMap<String, usize> = HashMap::new();
        for (neighbor_id, (parent_index, _)) in &claims {
            winning_parent_of.insert(neighbor_id.clone(), *parent_index);
        }

        let mut new_frontier = Vec::new();
        let mut newly_visited = HashSet::new();

        for (parent_index, parent) in self.frontier.iter().enumerate() {
            let surviving_for_parent: Vec<&String> = per_parent_survivors[parent_index]
                .iter()
                .filter(|neighbor_id| winning_parent_of.get(*neighbor_id) == Some(&parent_index))
                .collect();

            if surviving_for_parent.is_empty() {
                if !parent.path.is_empty() {
                    self.completed_paths.push(parent.path.clone());
                }
                continue;
            }

            for neighbor_id in surviving_for_parent {
                let (_, candidate) = &claims[neighbor_id];
                let step = GraphStep {
                    from_node: parent.path.last_node().cloned().unwrap_or_else(|| self.seed_node.clone()),
                    to_node: candidate.neighbor_node.clone(),
                    edge: candidate.edge.clone(),
                    transfer_energy: candidate.transfer_energy,
                };
                let path = parent.path.extended(step);
                let node_id = NodeId::new(neighbor_id.clone());

                new_frontier.push(FrontierNode {
                    node_id: node_id.clone(),
                    activation: candidate.transfer_energy,
                    path,
                });
                self.visited.insert(node_id);
                newly_visited.insert(neighbor_id.clone());
            }
        }

        self.frontier = new_frontier;
        self.depth += 1;
        newly_visited
    }

    /// Appends the path of every remaining frontier node with at least one
    /// step to `completed_paths`. Called once, at loop exit (`MAX_DEPTH`
    /// reached while the frontier is still non-empty).
    pub fn finalize_remaining(&mut self) {
        for node in self.frontier.drain(..) {
            if !node.path.is_empty() {
                self.completed_paths.push(node.path);
            }
        }
    }

    /// Tie-break rule for cross-parent claim arbitration: the candidate
    /// with strictly higher energy wins; on an exact tie, the
    /// lexicographically smaller `parent_id` wins. This is the deterministic
    /// rule spec §9's Open Question asks implementations to pick and
    /// document; tests must not depend on which side of a tie wins.
    fn claim_wins(candidate: &ExpansionCandidate, existing: &ExpansionCandidate) -> bool {
        match candidate
            .transfer_energy
            .partial_cmp(&existing.transfer_energy)
        {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => candidate.parent_id < existing.parent_id,
            _ => false,
        }
    }
}
