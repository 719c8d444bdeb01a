//! Data model shared by the connector, traversal state, orchestrator, and
//! formatters.
//!
//! Node/edge property bags are modeled as `BTreeMap<String, serde_json::Value>`
//! rather than a `HashMap`, so that formatter output is byte-equal on
//! identical inputs (spec §8) and [`crate::formatters::debug_queries`]
//! produces deterministic query text. This mirrors the teacher's own
//! `properties: TEXT` JSON-blob column (`src/storage/graph/sqlite.rs`),
//! read back through `serde_json::Value`, with a `BTreeMap` view imposed on
//! top for the determinism the spec requires.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A node or edge's free-form property bag.
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// A graph node id, newtyped for use in internal bookkeeping (frontier and
/// visited-set keys) the way the teacher newtypes `EntityId`. The public
/// data model below still exposes plain `String` fields, matching spec §3
/// exactly; this type is an implementation detail of [`crate::traversal`]
/// and [`crate::connector`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps a string as a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the owned string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identity and metadata of a node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable, unique node id.
    pub id: String,
    /// Ordered node labels (typically a single entry), e.g. `UserRequest`,
    /// `DataSource`, `AgentAnswer`, `AgentAction`, `Event`, `UserPreference`.
    pub labels: Vec<String>,
    /// Free-form metadata. Known-interesting keys include `text`,
    /// `conv_id`, `tags`, `ingestion_time`, `update_time`, plus
    /// label-specific fields.
    pub properties: PropertyMap,
}

impl GraphNode {
    /// Returns the first label, if any, used as the node's display category.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// Returns the `text` property, if present and a string.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.properties.get("text").and_then(serde_json::Value::as_str)
    }
}

/// Directed representation of an underlying symmetric `RELATES` relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Id of the node this edge was traversed from.
    pub source_id: String,
    /// Id of the node this edge was traversed to.
    pub target_id: String,
    /// Relation type; always `RELATES` in v1 (reserved for future use).
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Free-form metadata.
    pub properties: PropertyMap,
    /// Edge weight. `None` is treated as `0.01` everywhere the weight is
    /// consumed numerically; observed weights range 0.25 to 1.0.
    pub weight: Option<f64>,
    /// Edge tags, possibly empty.
    pub tags: Vec<String>,
}

/// Weight substituted for an edge whose `weight` is absent.
pub const DEFAULT_EDGE_WEIGHT: f64 = 0.01;

impl GraphEdge {
    /// Returns `weight`, or [`DEFAULT_EDGE_WEIGHT`] if absent.
    #[must_use]
    pub fn weight_or_default(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_EDGE_WEIGHT)
    }
}

/// An upstream vector/lexical search handoff: a starting point for
/// traversal plus its initial activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedInput {
    /// Id of the node to start exploring from.
    pub node_id: String,
    /// Hybrid similarity score in `(0, 1]`; becomes the seed's initial
    /// activation `R`.
    pub score: f64,
}

impl SeedInput {
    /// Validates the precondition spec §6 places on every seed: `node_id`
    /// non-empty, `score` a finite float in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if either precondition fails.
    pub fn validate(&self) -> crate::Result<()> {
        if self.node_id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "seed node_id must not be empty".to_string(),
            ));
        }
        if !self.score.is_finite() || self.score <= 0.0 || self.score > 1.0 {
            return Err(crate::Error::InvalidInput(format!(
                "seed score must be a finite value in (0, 1], got {}",
                self.score
            )));
        }
        Ok(())
    }
}

/// One traversal hop: an edge plus the activation it delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStep {
    /// Node the hop started from.
    pub from_node: GraphNode,
    /// Node the hop arrived at.
    pub to_node: GraphNode,
    /// Edge used, oriented `from_node -> to_node`.
    pub edge: GraphEdge,
    /// Activation delivered to `to_node` by this hop; always `> 0`.
    pub transfer_energy: f64,
}

/// An ordered, non-empty sequence of contiguous [`GraphStep`]s: each step's
/// `from_node` equals the previous step's `to_node`. The seed is
/// `steps[0].from_node`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphPath {
    /// The hops making up this path, in traversal order.
    pub steps: Vec<GraphStep>,
}

impl GraphPath {
    /// An empty path (no hops yet); used for a frontier node still at the seed.
    #[must_use]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Number of hops in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the path has no hops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns a new path with `step` appended.
    #[must_use]
    pub fn extended(&self, step: GraphStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    /// The node the path starts from, if non-empty.
    #[must_use]
    pub fn seed_node(&self) -> Option<&GraphNode> {
        self.steps.first().map(|s| &s.from_node)
    }

    /// The node the path currently ends at: the last step's `to_node`, or
    /// `None` for an empty path (the caller should use the seed id itself
    /// in that case).
    #[must_use]
    pub fn last_node(&self) -> Option<&GraphNode> {
        self.steps.last().map(|s| &s.to_node)
    }

    /// Maximum `transfer_energy` across all steps.
    #[must_use]
    pub fn max_transfer_energy(&self) -> Option<f64> {
        self.steps
            .iter()
            .map(|s| s.transfer_energy)
            .fold(None, |acc, e| Some(acc.map_or(e, |a: f64| a.max(e))))
    }

    /// Minimum `transfer_energy` across all steps.
    #[must_use]
    pub fn min_transfer_energy(&self) -> Option<f64> {
        self.steps
            .iter()
            .map(|s| s.transfer_energy)
            .fold(None, |acc, e| Some(acc.map_or(e, |a: f64| a.min(e))))
    }

    /// All node ids appearing along the path, seed first, in order, with no
    /// repetitions under the acyclicity invariant.
    #[must_use]
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids = Vec::with_capacity(self.steps.len() + 1);
        if let Some(first) = self.steps.first() {
            ids.push(first.from_node.id.as_str());
        }
        for step in &self.steps {
            ids.push(step.to_node.id.as_str());
        }
        ids
    }
}

/// A live BFS entry during traversal.
#[derive(Debug, Clone)]
pub struct FrontierNode {
    /// Id of the node currently at the frontier.
    pub node_id: NodeId,
    /// Activation (`R`) that reached this node; fed into the next
    /// expansion as the propagation rule's `R`.
    pub activation: f64,
    /// Path from the seed to this node (empty for the seed itself).
    pub path: GraphPath,
}

/// One row of batched expansion output: a candidate neighbor discovered
/// from a single frontier parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionCandidate {
    /// Id of the frontier node this candidate was discovered from.
    pub parent_id: String,
    /// The candidate neighbor node.
    pub neighbor_node: GraphNode,
    /// The edge used, oriented `parent -> neighbor`.
    pub edge: GraphEdge,
    /// Activation delivered to `neighbor_node`; always `> MIN_ACTIVATION`.
    pub transfer_energy: f64,
}

/// Outcome of looking up a seed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedFetchResult {
    /// The node, if found.
    pub node: Option<GraphNode>,
    /// The node's labels (empty if not found).
    pub labels: Vec<String>,
    /// Whether a node with the requested id was found.
    pub found: bool,
}

impl SeedFetchResult {
    /// A result for a seed id that does not exist in the graph.
    #[must_use]
    pub const fn not_found() -> Self {
        Self {
            node: None,
            labels: Vec::new(),
            found: false,
        }
    }
}

/// Classification of why one seed's exploration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedReason {
    /// The seed id did not exist in the graph; no expansion was issued.
    SeedNotFound,
    /// The frontier emptied out before `MAX_DEPTH` was reached.
    NoMorePaths,
    /// At least one completed path reached `MAX_DEPTH`.
    MaxDepth,
    /// The caller cancelled the exploration before it completed.
    Cancelled,
}

/// The outcome of exploring a single seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The seed this result was produced for.
    pub seed: SeedInput,
    /// The seed's resolved node, if it was found in the graph.
    pub seed_node: Option<GraphNode>,
    /// All completed paths discovered from this seed. Order is
    /// unspecified but stable for a given input.
    pub paths: Vec<GraphPath>,
    /// The longest retained path length in steps, bounded above by
    /// `MAX_DEPTH`.
    pub max_depth_reached: usize,
    /// Why the exploration stopped.
    pub terminated_reason: TerminatedReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            labels: vec!["Event".to_string()],
            properties: PropertyMap::new(),
        }
    }

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            source_id: source.to_string(),
            target_id: target.to_string(),
            edge_type: "RELATES".to_string(),
            properties: PropertyMap::new(),
            weight: Some(0.5),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_weight_or_default() {
        let mut e = edge("a", "b");
        assert!((e.weight_or_default() - 0.5).abs() < f64::EPSILON);
        e.weight = None;
        assert!((e.weight_or_default() - DEFAULT_EDGE_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_path_extended_and_aggregates() {
        let path = GraphPath::empty();
        assert!(path.is_empty());
        assert!(path.max_transfer_energy().is_none());

        let step1 = GraphStep {
            from_node: node("s"),
            to_node: node("a"),
            edge: edge("s", "a"),
            transfer_energy: 0.4,
        };
        let path = path.extended(step1);

        let step2 = GraphStep {
            from_node: node("a"),
            to_node: node("b"),
            edge: edge("a", "b"),
            transfer_energy: 0.1,
        };
        let path = path.extended(step2);

        assert_eq!(path.len(), 2);
        assert_eq!(path.node_ids(), vec!["s", "a", "b"]);
        assert!((path.max_transfer_energy().unwrap() - 0.4).abs() < f64::EPSILON);
        assert!((path.min_transfer_energy().unwrap() - 0.1).abs() < f64::EPSILON);
        assert_eq!(path.seed_node().unwrap().id, "s");
        assert_eq!(path.last_node().unwrap().id, "b");
    }

    #[test]
    fn test_node_id_wraps_strings() {
        let id = NodeId::new("n1");
        assert_eq!(id.as_str(), "n1");
        assert_eq!(id.to_string(), "n1");
        let id2: NodeId = "n1".into();
        assert_eq!(id, id2);
    }

    #[test]
    fn test_seed_input_validate_accepts_well_formed_seed() {
        let seed = SeedInput {
            node_id: "n1".to_string(),
            score: 0.9,
        };
        assert!(seed.validate().is_ok());

        let boundary = SeedInput {
            node_id: "n1".to_string(),
            score: 1.0,
        };
        assert!(boundary.validate().is_ok());
    }

    #[test]
    fn test_seed_input_validate_rejects_empty_node_id() {
        let seed = SeedInput {
            node_id: String::new(),
            score: 0.9,
        };
        assert!(seed.validate().is_err());
    }

    #[test]
    fn test_seed_input_validate_rejects_non_positive_score() {
        let seed = SeedInput {
            node_id: "n1".to_string(),
            score: 0.0,
        };
        assert!(seed.validate().is_err());

        let negative = SeedInput {
            node_id: "n1".to_string(),
            score: -0.5,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_seed_input_validate_rejects_score_above_one() {
        let seed = SeedInput {
            node_id: "n1".to_string(),
            score: 1.5,
        };
        assert!(seed.validate().is_err());
    }

    #[test]
    fn test_seed_input_validate_rejects_non_finite_score() {
        let nan = SeedInput {
            node_id: "n1".to_string(),
            score: f64::NAN,
        };
        assert!(nan.validate().is_err());

        let infinite = SeedInput {
            node_id: "n1".to_string(),
            score: f64::INFINITY,
        };
        assert!(infinite.validate().is_err());
    }
}
