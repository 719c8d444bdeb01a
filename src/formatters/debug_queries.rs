//! `to_debug_queries`: textual graph-query reconstructions of each path,
//! for pasting into a store console to visualize the exploration.
//!
//! The query form mirrors the pattern-match syntax the graph store itself
//! understands; executability is incidental — the contract is textual
//! reconstructability of the path's node ids, not that the query actually
//! runs against any particular store.

use serde_json::{Value, json};

use crate::model::{GraphPath, RetrievalResult};

/// Produces `{paths_combined: string, individual_paths: [string, …]}`.
#[must_use]
pub fn to_debug_queries(result: &RetrievalResult) -> Value {
    let individual_paths: Vec<String> = result
        .paths
        .iter()
        .enumerate()
        .map(|(i, path)| individual_path_query(i + 1, path))
        .collect();

    let patterns: Vec<String> = result
        .paths
        .iter()
        .enumerate()
        .map(|(i, path)| format!("p{} = {}", i + 1, path_pattern(i + 1, path)))
        .collect();
    let return_vars: Vec<String> = (1..=result.paths.len()).map(|i| format!("p{i}")).collect();

    let paths_combined = if patterns.is_empty() {
        String::new()
    } else {
        format!("MATCH {} RETURN {}", patterns.join(", "), return_vars.join(", "))
    };

    json!({
        "paths_combined": paths_combined,
        "individual_paths": individual_paths,
    })
}

fn individual_path_query(index: usize, path: &GraphPath) -> String {
    format!("MATCH p{index} = {} RETURN p{index}", path_pattern(index, path))
}

fn path_pattern(index: usize, path: &GraphPath) -> String {
    let ids = path.node_ids();
    let mut pattern = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            pattern.push_str("-[:RELATES]-");
        }
        pattern.push_str(&format!("(n{index}_{i} {{id: \"{}\"}})", escape_id(id)));
    }
    pattern
}

fn escape_id(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}
