//! Pure, deterministic views over a [`crate::model::RetrievalResult`].
//!
//! None of these re-query the graph store; they only reshape data already
//! in hand. This generalizes the teacher's `rendering` module's
//! pure-function-over-a-result shape — dispatch keyed by node label rather
//! than by a fixed `EntityType` enum, since labels here are open-ended.

mod debug_queries;
mod llm_context;
mod visualization;

pub use debug_queries::to_debug_queries;
pub use llm_context::to_llm_context;
pub use visualization::to_visualization;

use serde_json::{Map, Value};

use crate::model::{GraphEdge, GraphNode, PropertyMap, RetrievalResult};

/// Decodes the common escape sequences (`\n`, `\t`, `\"`, `\\`) a text
/// property may carry from upstream ingestion.
pub(crate) fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                },
                Some('t') => {
                    out.push('\t');
                    chars.next();
                },
                Some('"') => {
                    out.push('"');
                    chars.next();
                },
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                },
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Truncates `text` to its first 12 whitespace-separated tokens, appending
/// an ellipsis if anything was dropped.
pub(crate) fn truncate_words(text: &str) -> String {
    const LIMIT: usize = 12;
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= LIMIT {
        words.join(" ")
    } else {
        format!("{}…", words[..LIMIT].join(" "))
    }
}

/// Flattens a property bag into a JSON object map.
pub(crate) fn flatten_properties(properties: &PropertyMap) -> Map<String, Value> {
    properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Builds the contract-shaped JSON object for one node entry, used by both
/// `to_visualization` and `to_llm_context`'s `node_and_edge_attributes`.
pub(crate) fn node_entry(node: &GraphNode, is_seed: bool, retrieval_activation: f64) -> Value {
    let mut map = flatten_properties(&node.properties);
    map.insert("id".to_string(), Value::String(node.id.clone()));
    map.insert(
        "label".to_string(),
        node.label().map_or(Value::Null, |l| Value::String(l.to_string())),
    );
    map.insert("is_seed".to_string(), Value::Bool(is_seed));
    map.insert(
        "retrieval_activation".to_string(),
        Value::from(retrieval_activation),
    );
    Value::Object(map)
}

/// Builds the contract-shaped JSON object for one edge entry.
pub(crate) fn edge_entry(edge: &GraphEdge, transfer_energy: f64) -> Value {
    let mut map = flatten_properties(&edge.properties);

    let edge_id = edge
        .properties
        .get("edge_id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("{}->{}", edge.source_id, edge.target_id), ToString::to_string);

    map.insert("source".to_string(), Value::String(edge.source_id.clone()));
    map.insert("target".to_string(), Value::String(edge.target_id.clone()));
    map.insert("edge_id".to_string(), Value::String(edge_id));
    map.insert(
        "weight".to_string(),
        Value::from(round_to(edge.weight_or_default(), 2)),
    );
    map.insert(
        "transfer_energy".to_string(),
        Value::from(round_to(transfer_energy, 3)),
    );
    map.insert(
        "tags".to_string(),
        Value::Array(edge.tags.iter().cloned().map(Value::String).collect()),
    );
    if let Some(text) = edge.properties.get("text").and_then(Value::as_str) {
        map.insert("text".to_string(), Value::String(decode_escapes(text)));
    }

    Value::Object(map)
}

/// Rounds `value` to `decimals` decimal places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Walks `result` collecting unique node entries (by id, first occurrence
/// wins) and unique edge entries (by `(source_id, target_id)`, first
/// occurrence wins), in the shape `to_visualization` and
/// `to_llm_context::node_and_edge_attributes` share.
pub(crate) fn collect_attributes(result: &RetrievalResult) -> (Vec<Value>, Vec<Value>) {
    let mut seen_nodes = std::collections::HashSet::new();
    let mut seen_edges = std::collections::HashSet::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    let seed_id = result.seed_node.as_ref().map(|n| n.id.as_str());

    if let Some(seed_node) = &result.seed_node {
        seen_nodes.insert(seed_node.id.clone());
        nodes.push(node_entry(seed_node, true, result.seed.score));
    }

    for path in &result.paths {
        for step in &path.steps {
            if seen_nodes.insert(step.from_node.id.clone()) {
                let is_seed = seed_id == Some(step.from_node.id.as_str());
                nodes.push(node_entry(&step.from_node, is_seed, step.transfer_energy));
            }
            if seen_nodes.insert(step.to_node.id.clone()) {
                let is_seed = seed_id == Some(step.to_node.id.as_str());
                nodes.push(node_entry(&step.to_node, is_seed, step.transfer_energy));
            }

            let key = (step.edge.source_id.clone(), step.edge.target_id.clone());
            if seen_edges.insert(key) {
                edges.push(edge_entry(&step.edge, step.transfer_energy));
            }
        }
    }

    (nodes, edges)
}
