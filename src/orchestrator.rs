//! The retrieval orchestrator: drives one [`crate::traversal::TraversalState`]
//! per seed concurrently, retrying transient connector failures with
//! exponential backoff, and yields results as they complete.
//!
//! Generic over [`GraphConnector`] rather than boxed as a trait object,
//! mirroring the teacher's `GraphRAGService<G: GraphBackend>`
//! (`src/services/graph_rag.rs`) — native async-fn-in-traits are not
//! object-safe, so a `dyn GraphConnector` is not an option without
//! introducing `async-trait`, which this crate's dependency stack does not
//! carry.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{instrument, warn};

use crate::config::RetrievalConfig;
use crate::connector::GraphConnector;
use crate::model::{RetrievalResult, SeedInput, TerminatedReason};
use crate::traversal::TraversalState;
use crate::{Error, Result};

/// Base delay for the exploration retry backoff; attempt `n` (1-based)
/// waits `RETRY_BASE_DELAY * 2^(n-1)`.
const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

/// Drives spreading-activation exploration across one or more seeds.
///
/// Cheaply cloneable: the connector is held behind an `Arc` so a single
/// orchestrator can be shared across call sites without re-establishing
/// store connections.
#[derive(Debug, Clone)]
pub struct RetrieverOrchestrator<C: GraphConnector> {
    connector: Arc<C>,
    config: RetrievalConfig,
}

impl<C: GraphConnector + 'static> RetrieverOrchestrator<C> {
    /// Builds an orchestrator over `connector`, validating `config` eagerly
    /// (spec §7 point 4: configuration is validated once, at construction,
    /// not per seed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `config` fails validation.
    pub fn new(connector: C, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector: Arc::new(connector),
            config,
        })
    }

    /// The configuration this orchestrator was built with.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Begins exploring every seed concurrently, one task per seed, and
    /// returns a [`RetrievalStream`] that yields each seed's
    /// [`RetrievalResult`] as soon as it finishes (spec §4.4: results are
    /// not required to preserve input seed order).
    ///
    /// `query_tags` is shared, read-only context for every seed's tag
    /// similarity computation (spec §4.1).
    ///
    /// Every seed is validated before any task is spawned (spec §7 point
    /// 4: a non-empty `node_id` and a finite `score` in `(0, 1]`); a
    /// precondition violation on any seed fails the entire call
    /// synchronously and no exploration starts for any seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any seed fails validation.
    pub fn explore(
        &self,
        seeds: Vec<SeedInput>,
        query_tags: Vec<String>,
    ) -> Result<RetrievalStream> {
        for seed in &seeds {
            seed.validate()?;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        let query_tags = Arc::new(query_tags);
        for seed in seeds {
            let connector = Arc::clone(&self.connector);
            let config = self.config.clone();
            let query_tags = Arc::clone(&query_tags);
            let cancel_rx = cancel_rx.clone();
            let result_tx = result_tx.clone();

            tasks.spawn(async move {
                let result =
                    explore_single(connector.as_ref(), &config, &seed, &query_tags, &cancel_rx)
                        .await;
                let _ignored = result_tx.send(result);
            });
        }

        Ok(RetrievalStream {
            tasks,
            result_rx,
            cancel_tx,
        })
    }
}

/// Explores a single seed to completion (or cancellation/exhaustion),
/// retrying each connector call up to `config.max_retries` times with
/// exponential backoff on failure.
#[instrument(skip(connector, config, cancel_rx), fields(seed = %seed.node_id))]
async fn explore_single<C: GraphConnector>(
    connector: &C,
    config: &RetrievalConfig,
    seed: &SeedInput,
    query_tags: &[String],
    cancel_rx: &watch::Receiver<bool>,
) -> Result<RetrievalResult> {
    if is_cancelled(cancel_rx) {
        return Ok(cancelled_result(seed));
    }

    let fetch = with_retry(config.max_retries, cancel_rx, || {
        connector.fetch_seed(&seed.node_id)
    })
    .await?;

    let Some(fetch) = fetch else {
        return Ok(cancelled_result(seed));
    };

    if !fetch.found {
        metrics::counter!("hippocampus_orchestrator_seed_not_found_total").increment(1);
        return Ok(RetrievalResult {
            seed: seed.clone(),
            seed_node: None,
            paths: Vec::new(),
            max_depth_reached: 0,
            terminated_reason: TerminatedReason::SeedNotFound,
        });
    }

    let seed_node = fetch.node.ok_or_else(|| {
        Error::MalformedRecord("seed marked found but carried no node".to_string())
    })?;

    let mut state = TraversalState::new(&seed_node, seed.score, config);
    let mut cancelled = false;

    while state.depth() < config.max_depth {
        if is_cancelled(cancel_rx) {
            cancelled = true;
            break;
        }

        if state.frontier_is_empty() {
            break;
        }

        let frontier_inputs = state.build_frontier_inputs();
        let visited = state.visited();

        let expansion = with_retry(config.max_retries, cancel_rx, || {
            connector.expand_frontier(&frontier_inputs, &visited, query_tags)
        })
        .await?;

        let Some(candidates) = expansion else {
            cancelled = true;
            break;
        };

        let grouped = TraversalState::group_candidates_by_parent(candidates);
        state.select_next_frontier(&grouped);
    }

    if !cancelled && !state.frontier_is_empty() {
        state.finalize_remaining();
    }

    let paths = state.into_completed_paths();
    let max_depth_reached = paths.iter().map(crate::model::GraphPath::len).max().unwrap_or(0);

    // Per spec §4.4 step 7: `max_depth` iff some completed path reached
    // `MAX_DEPTH` exactly; otherwise `no_more_paths`. Cancellation, when
    // observed, takes precedence over either.
    let terminated_reason = if cancelled {
        TerminatedReason::Cancelled
    } else if paths.iter().any(|p| p.len() == config.max_depth) {
        TerminatedReason::MaxDepth
    } else {
        TerminatedReason::NoMorePaths
    };

    Ok(RetrievalResult {
        seed: seed.clone(),
        seed_node: Some(seed_node),
        paths,
        max_depth_reached,
        terminated_reason,
    })
}

fn cancelled_result(seed: &SeedInput) -> RetrievalResult {
    RetrievalResult {
        seed: seed.clone(),
        seed_node: None,
        paths: Vec::new(),
        max_depth_reached: 0,
        terminated_reason: TerminatedReason::Cancelled,
    }
}

fn is_cancelled(cancel_rx: &watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow()
}

/// Retries `op` up to `max_retries` additional times on *transient*
/// connector failure, waiting `RETRY_BASE_DELAY * 2^(attempt - 1)` between
/// attempts (`src/webhooks/config.rs`'s `RetryConfig::delay_for_attempt`
/// idiom). Per spec §7, local recovery is confined to transient failures
/// (point 2); a fatal failure (point 3) propagates on its first occurrence
/// without consuming any retry budget.
///
/// Returns `Ok(None)` if cancellation is observed while waiting out a
/// backoff, so the caller can fold that into its own termination handling
/// without this helper needing to know about [`TerminatedReason`].
async fn with_retry<T, F, Fut>(
    max_retries: u32,
    cancel_rx: &watch::Receiver<bool>,
    mut op: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(Some(value)),
            Err(err) if err.is_transient() && attempt < max_retries => {
                warn!(attempt, error = %err, "retrying connector call after transient failure");
                metrics::counter!("hippocampus_orchestrator_retry_total").increment(1);
                let delay = RETRY_BASE_DELAY * 2_u32.pow(attempt);
                let mut cancel_rx = cancel_rx.clone();
                tokio::select! {
                    () = tokio::time::sleep(delay) => {},
                    _ = cancel_rx.changed() => {
                        if *cancel_rx.borrow() {
                            return Ok(None);
                        }
                    }
                }
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

/// A stream of [`RetrievalResult`]s, one per seed, yielded in completion
/// order rather than input order.
///
/// Deliberately hand-rolled rather than implementing `futures::Stream`:
/// the crate does not otherwise depend on the `futures` ecosystem, so
/// callers drive this with a plain `while let Some(result) = stream.next()`
/// loop instead of `StreamExt` combinators.
#[derive(Debug)]
pub struct RetrievalStream {
    tasks: JoinSet<()>,
    result_rx: mpsc::UnboundedReceiver<Result<RetrievalResult>>,
    cancel_tx: watch::Sender<bool>,
}

impl RetrievalStream {
    /// Awaits the next seed's result, or `None` once every seed has been
    /// accounted for.
    pub async fn next(&mut self) -> Option<Result<RetrievalResult>> {
        self.result_rx.recv().await
    }

    /// Signals every in-flight exploration task to stop at its next
    /// cooperative checkpoint (seed fetch, frontier expansion, or a retry
    /// backoff sleep). Already-completed results remain available via
    /// [`RetrievalStream::next`].
    pub fn cancel(&self) {
        let _ignored = self.cancel_tx.send(true);
    }

    /// Waits for all underlying exploration tasks to finish, dropping their
    /// join handles. Useful for a clean shutdown after [`cancel`](Self::cancel).
    pub async fn join_all(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::InMemoryGraphConnector;
    use crate::model::{GraphNode, PropertyMap};

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            labels: vec!["Event".to_string()],
            properties: PropertyMap::new(),
        }
    }

    #[tokio::test]
    async fn test_explore_seed_not_found() {
        let connector = InMemoryGraphConnector::new();
        let orchestrator =
            RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();

        let mut stream = orchestrator.explore(
            vec![SeedInput {
                node_id: "ghost".to_string(),
                score: 0.9,
            }],
            vec![],
        ).unwrap();

        let result = stream.next().await.unwrap().unwrap();
        assert_eq!(result.terminated_reason, TerminatedReason::SeedNotFound);
        assert!(result.paths.is_empty());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_explore_single_hop_path() {
        let connector = InMemoryGraphConnector::new();
        connector.add_node(node("s"));
        connector.add_node(node("a"));
        connector.add_edge("s", "a", Some(0.8), vec![], PropertyMap::new());

        let orchestrator =
            RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
        let mut stream = orchestrator.explore(
            vec![SeedInput {
                node_id: "s".to_string(),
                score: 1.0,
            }],
            vec![],
        ).unwrap();

        let result = stream.next().await.unwrap().unwrap();
        assert_eq!(result.terminated_reason, TerminatedReason::NoMorePaths);
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].node_ids(), vec!["s", "a"]);
    }

    #[tokio::test]
    async fn test_explore_multiple_seeds_concurrently() {
        let connector = InMemoryGraphConnector::new();
        connector.add_node(node("s1"));
        connector.add_node(node("s2"));
        connector.add_node(node("a"));
        connector.add_edge("s1", "a", Some(0.5), vec![], PropertyMap::new());

        let orchestrator =
            RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
        let mut stream = orchestrator.explore(
            vec![
                SeedInput {
                    node_id: "s1".to_string(),
                    score: 1.0,
                },
                SeedInput {
                    node_id: "s2".to_string(),
                    score: 1.0,
                },
            ],
            vec![],
        ).unwrap();

        let mut seen = std::collections::HashSet::new();
        while let Some(result) = stream.next().await {
            seen.insert(result.unwrap().seed.node_id);
        }
        assert_eq!(seen, std::collections::HashSet::from(["s1".to_string(), "s2".to_string()]));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let connector = InMemoryGraphConnector::new();
        let bad_config = RetrievalConfig::default().with_max_depth(0);
        assert!(RetrieverOrchestrator::new(connector, bad_config).is_err());
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_seeds() {
        let connector = InMemoryGraphConnector::new();
        connector.add_node(node("s"));
        let orchestrator =
            RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();
        let mut stream = orchestrator.explore(
            vec![SeedInput {
                node_id: "s".to_string(),
                score: 1.0,
            }],
            vec![],
        ).unwrap();
        stream.cancel();
        let result = stream.next().await.unwrap().unwrap();
        assert!(matches!(
            result.terminated_reason,
            TerminatedReason::Cancelled | TerminatedReason::NoMorePaths
        ));
    }

    #[tokio::test]
    async fn test_explore_rejects_empty_node_id_synchronously() {
        let connector = InMemoryGraphConnector::new();
        let orchestrator =
            RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();

        let err = orchestrator
            .explore(
                vec![SeedInput {
                    node_id: String::new(),
                    score: 0.9,
                }],
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_explore_rejects_non_positive_score_synchronously() {
        let connector = InMemoryGraphConnector::new();
        let orchestrator =
            RetrieverOrchestrator::new(connector, RetrievalConfig::default()).unwrap();

        let err = orchestrator
            .explore(
                vec![SeedInput {
                    node_id: "s".to_string(),
                    score: 0.0,
                }],
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_with_retry_retries_transient_failure_until_success() {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let attempts = std::sync::atomic::AtomicU32::new(0);

        let result = with_retry(3, &cancel_rx, || {
            let attempts = &attempts;
            async move {
                if attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                    Err(Error::OperationFailed {
                        operation: "expand_frontier".to_string(),
                        cause: "connection reset".to_string(),
                        transient: true,
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, Some(42));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_propagates_fatal_error_without_retrying() {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let attempts = std::sync::atomic::AtomicU32::new(0);

        let result: Result<Option<()>> = with_retry(3, &cancel_rx, || {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(Error::OperationFailed {
                    operation: "expand_frontier_prepare".to_string(),
                    cause: "near \"SELEC\": syntax error".to_string(),
                    transient: false,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
