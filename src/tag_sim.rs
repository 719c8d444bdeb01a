//! Tag similarity function.
//!
//! A pure numeric function mixing an edge's tag set with the query's tag
//! set. It is the only piece of the propagation rule cheap enough to be
//! re-derived from scratch rather than grounded on an existing teacher
//! routine; the Jaccard-with-floor shape is standard.
//!
//! The same formula is reimplemented as a `SQLite` scalar function by
//! [`crate::connector::sqlite::SqliteGraphConnector`] so that store-side and
//! Rust-side values agree to floating-point tolerance, per spec §4.1.

use std::collections::HashSet;

use crate::config::DEFAULT_TAG_SIM_FLOOR;

/// Computes `tag_sim(edge_tags, query_tags) -> float in [floor, 1.0]`.
///
/// - If `query_tags` is empty, the tag filter is off: returns exactly `1.0`.
/// - Else if `edge_tags` is empty, returns exactly `floor`.
/// - Else returns `floor + (1.0 - floor) * jaccard(edge_tags, query_tags)`,
///   where the Jaccard index is computed over the two sets (multiplicities
///   ignored).
///
/// The function is symmetric in the sense that swapping which set plays
/// "edge" vs. "query" only matters through the empty-set special cases.
#[must_use]
pub fn tag_sim(edge_tags: &[String], query_tags: &[String], floor: f64) -> f64 {
    if query_tags.is_empty() {
        return 1.0;
    }
    if edge_tags.is_empty() {
        return floor;
    }

    let edge_set: HashSet<&str> = edge_tags.iter().map(String::as_str).collect();
    let query_set: HashSet<&str> = query_tags.iter().map(String::as_str).collect();

    let intersection = edge_set.intersection(&query_set).count();
    let union = edge_set.union(&query_set).count();

    // union is >= 1 here: both sets are non-empty by this point.
    #[allow(clippy::cast_precision_loss)]
    let jaccard = intersection as f64 / union as f64;

    floor + (1.0 - floor) * jaccard
}

/// [`tag_sim`] using the crate-default floor of `0.15`.
#[must_use]
pub fn tag_sim_default(edge_tags: &[String], query_tags: &[String]) -> f64 {
    tag_sim(edge_tags, query_tags, DEFAULT_TAG_SIM_FLOOR)
}
