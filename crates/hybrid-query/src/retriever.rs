//! Retrieval orchestrator: runs the strategies a mode selects, fuses their
//! lists and trims to top-k.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use hybrid_core::{
    EmbeddingProvider, FusedResult, RankedList, Result, RetrievalError, RetrievalResponse,
    SearchBackend, SearchConfig, SearchMode, SparseExpansionProvider, Strategy, StrategyOutcome,
    StrategyReport,
};

use crate::executor::Executors;
use crate::fusion::{reciprocal_rank_fusion, DEFAULT_RRF_K};

/// Characters of the query shown in logs.
const QUERY_PREVIEW_CHARS: usize = 50;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// RRF constant k.
    pub rrf_k: u32,

    /// Candidate multiplier per strategy when several strategies run.
    pub oversample: usize,

    /// Upper bound on top-k.
    pub max_top_k: usize,

    /// Deadline for a whole call (None waits for every strategy).
    pub timeout: Option<Duration>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            oversample: 2,
            max_top_k: 100,
            timeout: None,
        }
    }
}

impl From<&SearchConfig> for RetrieverConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            rrf_k: config.rrf_k,
            oversample: config.oversample.max(1),
            max_top_k: config.max_top_k,
            timeout: config.timeout(),
        }
    }
}

/// Result of one strategy within a call.
struct StrategyRun {
    strategy: Strategy,
    outcome: StrategyOutcome,
    list: RankedList,
    latency_ms: u64,
}

impl StrategyRun {
    fn report(&self) -> StrategyReport {
        StrategyReport {
            strategy: self.strategy,
            outcome: self.outcome.clone(),
            hits: self.list.len(),
            latency_ms: self.latency_ms,
        }
    }
}

/// Hybrid retrieval entry point.
///
/// Holds long-lived handles to the search backend and model providers. A
/// provider passed as `None` (for example a model that failed to load at
/// startup) degrades its strategy on every call.
pub struct Retriever {
    executors: Executors,
    config: RetrieverConfig,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        expander: Option<Arc<dyn SparseExpansionProvider>>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            executors: Executors::new(backend, embedder, expander),
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve the top-k chunks for `query`.
    ///
    /// Degraded strategies contribute nothing. Fails only with
    /// `RetrievalError::BackendUnavailable` when no strategy reached the
    /// backend.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
    ) -> Result<Vec<FusedResult>> {
        Ok(self.search(query, top_k, mode).await?.results)
    }

    /// Like [`Retriever::retrieve`], with the mode given as a string.
    /// Unrecognized modes fall back to the default mode.
    pub async fn retrieve_str(
        &self,
        query: &str,
        top_k: usize,
        mode: &str,
    ) -> Result<Vec<FusedResult>> {
        self.retrieve(query, top_k, SearchMode::parse_or_default(mode))
            .await
    }

    /// Retrieve with per-strategy diagnostics, using the configured timeout.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
    ) -> Result<RetrievalResponse> {
        self.search_with_timeout(query, top_k, mode, self.config.timeout)
            .await
    }

    /// Retrieve with per-strategy diagnostics and an explicit deadline.
    ///
    /// Strategies still running at the deadline are cancelled and contribute
    /// nothing.
    pub async fn search_with_timeout(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
        timeout: Option<Duration>,
    ) -> Result<RetrievalResponse> {
        let start = Instant::now();
        let top_k = top_k.min(self.config.max_top_k);

        info!(
            "Retrieving with mode={}, top_k={}, query={:?}",
            mode,
            top_k,
            preview(query)
        );

        if top_k == 0 {
            return Ok(RetrievalResponse {
                query: query.to_string(),
                mode,
                top_k,
                fused: false,
                latency_ms: 0,
                strategies: Vec::new(),
                results: Vec::new(),
            });
        }

        let strategies = mode.strategies();
        let fetch_k = if strategies.len() > 1 {
            top_k.saturating_mul(self.config.oversample)
        } else {
            top_k
        };
        let deadline = timeout.map(|t| start + t);

        let runs = match strategies {
            [only] => {
                let run = execute(self.executors.clone(), *only, query.into(), fetch_k, deadline);
                vec![run.await]
            }
            _ => self.execute_all(strategies, query, fetch_k, deadline).await,
        };

        let reports: Vec<StrategyReport> = runs.iter().map(StrategyRun::report).collect();

        let reached_backend = runs
            .iter()
            .any(|run| run.outcome == StrategyOutcome::Completed);
        let backend_failed = runs
            .iter()
            .any(|run| matches!(run.outcome, StrategyOutcome::BackendError(_)));

        if !reached_backend && backend_failed {
            let message = runs
                .iter()
                .filter_map(|run| match &run.outcome {
                    StrategyOutcome::BackendError(message) => {
                        Some(format!("{}: {}", run.strategy, message))
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("; ");
            error!("No strategy reached the search backend: {}", message);
            return Err(RetrievalError::backend_unavailable(message));
        }

        let mut lists: Vec<RankedList> = runs
            .into_iter()
            .map(|run| run.list)
            .filter(|list| !list.is_empty())
            .collect();

        let fused = lists.len() > 1;
        let results: Vec<FusedResult> = if fused {
            let mut fused_results = reciprocal_rank_fusion(&lists, self.config.rrf_k);
            debug!(
                "RRF fusion produced {} results from {} lists",
                fused_results.len(),
                lists.len()
            );
            fused_results.truncate(top_k);
            fused_results
        } else if let Some(list) = lists.pop() {
            list.into_iter()
                .take(top_k)
                .enumerate()
                .map(|(i, record)| FusedResult::pass_through(record, i as u32 + 1))
                .collect()
        } else {
            warn!("No search results from any strategy");
            Vec::new()
        };

        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Retrieval completed in {}ms, returned {} results",
            latency_ms,
            results.len()
        );

        Ok(RetrievalResponse {
            query: query.to_string(),
            mode,
            top_k,
            fused,
            latency_ms,
            strategies: reports,
            results,
        })
    }

    /// Run several strategies as parallel tasks and wait for all of them.
    async fn execute_all(
        &self,
        strategies: &[Strategy],
        query: &str,
        n: usize,
        deadline: Option<Instant>,
    ) -> Vec<StrategyRun> {
        let query: Arc<str> = query.into();

        let handles: Vec<_> = strategies
            .iter()
            .map(|&strategy| {
                let executors = self.executors.clone();
                let task = execute(executors, strategy, Arc::clone(&query), n, deadline);
                (strategy, tokio::spawn(task))
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        for (strategy, handle) in handles {
            let run = match handle.await {
                Ok(run) => run,
                Err(e) => {
                    error!("{} search task failed: {}", strategy, e);
                    StrategyRun {
                        strategy,
                        outcome: StrategyOutcome::Aborted(e.to_string()),
                        list: Vec::new(),
                        latency_ms: 0,
                    }
                }
            };
            runs.push(run);
        }

        runs
    }
}

/// Run one strategy, converting failure and timeout into an empty list.
async fn execute(
    executors: Executors,
    strategy: Strategy,
    query: Arc<str>,
    n: usize,
    deadline: Option<Instant>,
) -> StrategyRun {
    let started = Instant::now();

    let result = match deadline {
        Some(deadline) => timeout_at(deadline, executors.run(strategy, &query, n))
            .await
            .ok(),
        None => Some(executors.run(strategy, &query, n).await),
    };

    let (outcome, list) = match result {
        Some(Ok(list)) => (StrategyOutcome::Completed, list),
        Some(Err(failure)) => (failure.into(), Vec::new()),
        None => {
            warn!("{} search timed out", strategy);
            (StrategyOutcome::TimedOut, Vec::new())
        }
    };

    StrategyRun {
        strategy,
        outcome,
        list,
        latency_ms: started.elapsed().as_millis() as u64,
    }
}

/// Query shortened for log lines.
pub(crate) fn preview(query: &str) -> String {
    match query.char_indices().nth(QUERY_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &query[..idx]),
        None => query.to_string(),
    }
}
