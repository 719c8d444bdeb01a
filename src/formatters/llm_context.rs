//! `to_llm_context`: renders each path as a human/LLM-readable string plus
//! the same flattened node/edge attributes `to_visualization` produces.

use serde_json::{Value, json};

use super::{collect_attributes, decode_escapes, round_to, truncate_words};
use crate::model::{GraphNode, GraphPath, RetrievalResult};

/// Produces `{paths: […], node_and_edge_attributes: {nodes, edges}}`.
///
/// Node text is truncated to 12 whitespace-separated tokens with a
/// trailing ellipsis; edge text is never truncated. Pure: identical inputs
/// produce byte-equal output.
#[must_use]
pub fn to_llm_context(result: &RetrievalResult) -> Value {
    let paths: Vec<Value> = result
        .paths
        .iter()
        .enumerate()
        .map(|(i, path)| Value::String(render_path(i + 1, path)))
        .collect();

    let (nodes, edges) = collect_attributes(result);

    json!({
        "paths": paths,
        "node_and_edge_attributes": { "nodes": nodes, "edges": edges },
    })
}

fn render_path(index: usize, path: &GraphPath) -> String {
    let mut rendered = format!("Path {index}: [SEED] ");

    for (i, step) in path.steps.iter().enumerate() {
        if i == 0 {
            rendered.push_str(&render_node(&step.from_node));
            rendered.push_str(" -> ");
        }
        rendered.push_str(&render_edge(step));
        rendered.push_str(" -> ");
        rendered.push_str(&render_node(&step.to_node));
        if i + 1 < path.steps.len() {
            rendered.push_str(" -> ");
        }
    }

    rendered
}

fn render_node(node: &GraphNode) -> String {
    let label = node.label().unwrap_or("Node");
    let text = node
        .text()
        .map(decode_escapes)
        .map(|t| truncate_words(&t))
        .unwrap_or_default();
    format!("({label} {}: \"{text}\")", node.id)
}

fn render_edge(step: &crate::model::GraphStep) -> String {
    let edge_id = step
        .edge
        .properties
        .get("edge_id")
        .and_then(Value::as_str)
        .map_or_else(
            || format!("{}->{}", step.edge.source_id, step.edge.target_id),
            ToString::to_string,
        );
    let text = step
        .edge
        .properties
        .get("text")
        .and_then(Value::as_str)
        .map(decode_escapes)
        .unwrap_or_default();
    let weight = round_to(step.edge.weight_or_default(), 2);
    let activation = round_to(step.transfer_energy, 3);
    format!("[{edge_id} \"{text}\" weight={weight:.2} activation_score={activation:.3}]")
}
