//! `to_visualization`: `{nodes, edges}` for a force-directed renderer.

use serde_json::{Value, json};

use super::collect_attributes;
use crate::model::RetrievalResult;

/// Produces `{nodes: […], edges: […]}` for a force-directed renderer.
///
/// Nodes are deduplicated by id, edges by `(source_id, target_id)`; in
/// both cases the first occurrence's attributes win. Pure: identical
/// inputs produce byte-equal output.
#[must_use]
pub fn to_visualization(result: &RetrievalResult) -> Value {
    let (nodes, edges) = collect_attributes(result);
    json!({ "nodes": nodes, "edges": edges })
}
