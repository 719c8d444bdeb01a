//! Graph connector: a thin layer over a labeled property-graph store that
//! executes exactly two read-only queries — seed fetch and batched frontier
//! expansion — and returns typed records. No BFS bookkeeping lives here;
//! that belongs to [`crate::traversal`].
//!
//! Two implementations are provided behind the [`GraphConnector`] trait,
//! mirroring the teacher's contract-first `GraphBackend` design
//! (`src/storage/traits/graph.rs`):
//!
//! - [`memory::InMemoryGraphConnector`] — an `RwLock`-guarded adjacency
//!   list, for unit and property tests, mirroring `InMemoryGraphBackend`.
//! - [`sqlite::SqliteGraphConnector`] — a `SQLite`-backed store computing
//!   the propagation rule and tag similarity in-query, mirroring
//!   `SqliteGraphBackend`.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryGraphConnector;
pub use sqlite::SqliteGraphConnector;

use std::collections::HashSet;
use std::future::Future;

use crate::Result;
use crate::model::{ExpansionCandidate, SeedFetchResult};

/// A frontier entry as handed to [`GraphConnector::expand_frontier`]:
/// `(node_id, activation)`.
pub type FrontierInput = (String, f64);

/// Read-only access to a labeled property graph.
///
/// Implementors must be safe to call concurrently: the orchestrator may
/// hold one exploration task per seed, each issuing calls against a
/// connector shared (via `Arc` or by value, if `Clone`) across tasks.
pub trait GraphConnector: Send + Sync {
    /// Looks up a node by its `id` property, regardless of label.
    ///
    /// Returns `found: false` (not an error) if no such node exists.
    ///
    /// # Errors
    ///
    /// Returns an error for connection/timeout failures or malformed
    /// records (a node missing its `id`).
    fn fetch_seed(&self, node_id: &str) -> impl Future<Output = Result<SeedFetchResult>> + Send;

    /// Expands an entire frontier in one batched call.
    ///
    /// For each `(parent_id, activation)` pair, finds every `RELATES`
    /// neighbor not in `visited_ids`, computes the transfer energy per the
    /// propagation rule (spec §4.2), and retains only candidates whose
    /// energy is strictly greater than `min_activation`.
    ///
    /// The returned list is grouped by `parent_id` and, within each group,
    /// sorted by `transfer_energy` descending — callers rely on this
    /// ordering to take top-K without re-sorting.
    ///
    /// # Errors
    ///
    /// Returns an error for connection/timeout failures or malformed
    /// records (a neighbor node missing its `id`).
    fn expand_frontier(
        &self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        query_tags: &[String],
    ) -> impl Future<Output = Result<Vec<ExpansionCandidate>>> + Send;
}
