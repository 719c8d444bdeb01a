//! # Hippocampus
//!
//! A spreading-activation graph retrieval engine for long-term agent memory.
//!
//! Given a natural-language query, an upstream vector/lexical retriever
//! produces a small set of similarity "seed" memories. This crate takes
//! those seeds and performs bounded spreading-activation traversal over a
//! labeled property graph, surfacing the surrounding evidence as ranked
//! multi-hop paths suitable for grounding an LLM's answer.
//!
//! ## What this crate is
//!
//! - The spreading-activation traversal algorithm ([`traversal`]).
//! - A thin connector over a property-graph store that executes exactly
//!   two read-only queries ([`connector`]).
//! - A concurrent, per-seed orchestrator that streams results as they
//!   finish ([`orchestrator`]).
//! - Three pure formatters that turn a [`RetrievalResult`] into
//!   visualization, LLM-context, or debug-query shapes ([`formatters`]).
//!
//! ## What this crate is not
//!
//! It does not host HTTP/WebSocket endpoints, persist conversations, run
//! the upstream vector/BM25 retriever, call an LLM, ingest data into the
//! graph, or serve a UI. Those are external collaborators; this crate only
//! consumes a [`connector::GraphConnector`] implementation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hippocampus::{RetrievalConfig, RetrieverOrchestrator, SeedInput};
//! use hippocampus::connector::InMemoryGraphConnector;
//!
//! let connector = InMemoryGraphConnector::new();
//! let orchestrator = RetrieverOrchestrator::new(connector, RetrievalConfig::default())?;
//!
//! let seeds = vec![SeedInput { node_id: "n1".to_string(), score: 0.9 }];
//! let mut stream = orchestrator.explore(seeds, vec![])?;
//! while let Some(result) = stream.next().await {
//!     let result = result?;
//!     println!("{:?}", result.terminated_reason);
//! }
//! # Ok::<(), hippocampus::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

pub mod config;
pub mod connector;
pub mod formatters;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod tag_sim;
pub mod traversal;

pub use config::RetrievalConfig;
pub use model::{
    ExpansionCandidate, GraphEdge, GraphNode, GraphPath, GraphStep, RetrievalResult, SeedFetchResult,
    SeedInput, TerminatedReason,
};
pub use orchestrator::{RetrievalStream, RetrieverOrchestrator};

/// Error type for hippocampus operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Non-positive/non-finite seed score, empty `node_id`, malformed config |
/// | `OperationFailed` | A graph-store query fails (fatally, or after retries are exhausted) |
/// | `MalformedRecord` | The store returns a node/edge missing a required field |
/// | `Cancelled` | The caller cancelled an in-flight exploration |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A precondition was violated before any exploration started.
    ///
    /// Raised for non-positive seed scores, empty seed lists, negative or
    /// zero `max_depth`, or other malformed [`RetrievalConfig`] values. Per
    /// spec, this fails the entire call synchronously; no partial results
    /// are produced.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A graph-store operation failed.
    ///
    /// Raised when:
    /// - A `rusqlite` query fails for a non-transient reason (`transient:
    ///   false`): per spec §7 this propagates immediately without retry.
    /// - All `max_retries` attempts against a transient failure
    ///   (`transient: true`) are exhausted.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed (e.g. `"fetch_seed"`, `"expand_frontier"`).
        operation: String,
        /// The underlying cause.
        cause: String,
        /// Whether this failure is a transient, connection/timeout-class
        /// failure (spec §7 point 2, safe to retry) rather than a fatal one
        /// (point 3, must propagate immediately).
        transient: bool,
    },

    /// The graph store returned a record that violates a precondition.
    ///
    /// Raised when a node or edge row is missing its `id` property. This
    /// is always a fatal, non-retryable failure of the store's data, not
    /// of the query itself.
    #[error("malformed record from graph store: {0}")]
    MalformedRecord(String),

    /// The exploration was cancelled cooperatively before completion.
    #[error("exploration cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this is a transient, connection/timeout-class failure safe
    /// to retry (spec §7 point 2), as opposed to a fatal failure that must
    /// propagate immediately (point 3) or a precondition violation (point
    /// 4). Only [`Error::OperationFailed`] can be transient; every other
    /// variant is never retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::OperationFailed { transient: true, .. })
    }
}

/// Result type alias for hippocampus operations.
pub type Result<T> = std::result::Result<T, Error>;
