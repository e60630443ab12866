//! Query orchestration.
//!
//! The engine wires together:
//!
//! - a [`LedgerPort`] shared by every run,
//! - a [`ChainWalker`] per run for traversal,
//! - [`filter_instructions`] for per-block matching, and
//! - [`QueryProgress`] snapshots after each visited block.
//!
//! A run is an explicit context object ([`QueryRun`]) that hands out
//! [`Step`]s one at a time. [`QueryEngine::start_query`] drives a run on the
//! Tokio runtime and fans its steps out to a match stream, a progress
//! stream, and a one-shot outcome.
//!
//! Within a run only one ledger request is in flight at a time: the next
//! block is requested only after the previous one has been filtered and
//! its progress emitted.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use crate::metrics::QueryMetrics;
use crate::port::{LedgerPort, PortError};
use crate::types::LedgerBlock;

use super::abort::AbortController;
use super::config::QueryConfig;
use super::error::QueryError;
use super::filter::{InstructionMatch, filter_instructions};
use super::outcome::{CompletionReason, QueryOutcome, QueryStats};
use super::progress::QueryProgress;
use super::request::Query;
use super::walker::{ChainWalker, WalkStep};

/// Identifier the engine assigns to each started run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of output of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Match(InstructionMatch),
    Progress(QueryProgress),
    /// Always the last step.
    Done(QueryOutcome),
}

/// Everything a run produced, collected.
#[derive(Clone, Debug)]
pub struct QueryReport {
    pub matches: Vec<InstructionMatch>,
    pub progress: Vec<QueryProgress>,
    pub outcome: QueryOutcome,
}

/// Per-run state: position, counters, and the abort flag.
pub struct QueryRun<P: ?Sized> {
    id: QueryId,
    query: Query,
    walker: ChainWalker<P>,
    abort: AbortController,
    pending: VecDeque<Step>,
    total_blocks: Option<u64>,
    blocks_seen: u64,
    matches_found: usize,
    finished: bool,
    metrics: Option<QueryMetrics>,
}

impl<P> QueryRun<P>
where
    P: LedgerPort + ?Sized,
{
    fn new(
        id: QueryId,
        port: Arc<P>,
        query: Query,
        abort: AbortController,
        metrics: Option<QueryMetrics>,
    ) -> Self {
        let total_blocks = port.chain_length();
        let walker = ChainWalker::new(port, query.start, abort.clone());
        Self {
            id,
            query,
            walker,
            abort,
            pending: VecDeque::new(),
            total_blocks,
            blocks_seen: 0,
            matches_found: 0,
            finished: false,
            metrics,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Handle to request a stop at the next block boundary.
    pub fn abort_controller(&self) -> AbortController {
        self.abort.clone()
    }

    /// Produces the next step, or `None` once [`Step::Done`] was returned.
    pub async fn next_step(&mut self) -> Option<Step> {
        if let Some(step) = self.pending.pop_front() {
            return Some(step);
        }
        if self.finished {
            return None;
        }

        let started = Instant::now();
        let walked = self.walker.next_block().await;
        let step = match walked {
            Ok(WalkStep::Block(block)) => {
                if let Some(m) = &self.metrics {
                    m.block_fetch_seconds
                        .observe(started.elapsed().as_secs_f64());
                    m.blocks_fetched.inc();
                }
                // The flag may have been set while the block was in flight.
                if self.abort.is_aborted() {
                    return Some(self.conclude(QueryOutcome::Aborted {
                        stats: self.stats(),
                    }));
                }
                self.visit(&block);
                return self.pending.pop_front();
            }
            Ok(WalkStep::EndOfChain) => QueryOutcome::Completed {
                reason: CompletionReason::EndOfChain,
                stats: self.stats(),
            },
            Ok(WalkStep::Aborted) => QueryOutcome::Aborted {
                stats: self.stats(),
            },
            Err(error) => {
                tracing::warn!(query = %self.id, %error, "ledger request failed");
                QueryOutcome::Failed {
                    error,
                    stats: self.stats(),
                }
            }
        };
        Some(self.conclude(step))
    }

    /// Drives the run to the end, collecting every step.
    pub async fn collect(mut self) -> QueryReport {
        let mut matches = Vec::new();
        let mut progress = Vec::new();
        let mut outcome = None;

        while let Some(step) = self.next_step().await {
            match step {
                Step::Match(m) => matches.push(m),
                Step::Progress(p) => progress.push(p),
                Step::Done(o) => outcome = Some(o),
            }
        }

        QueryReport {
            matches,
            progress,
            outcome: outcome.unwrap_or(QueryOutcome::Failed {
                error: PortError::Protocol("run ended without an outcome".to_string()),
                stats: QueryStats::default(),
            }),
        }
    }

    fn stats(&self) -> QueryStats {
        QueryStats {
            blocks_seen: self.blocks_seen,
            matches_found: self.matches_found,
        }
    }

    /// Filters one block and queues its matches, progress, and possibly
    /// the completion.
    fn visit(&mut self, block: &Arc<LedgerBlock>) {
        let remaining = self.query.result_bound.saturating_sub(self.matches_found);
        let mut matches = filter_instructions(block, &self.query.target);
        matches.truncate(remaining);

        self.blocks_seen += 1;
        self.matches_found += matches.len();

        tracing::debug!(
            query = %self.id,
            block = block.index,
            found = matches.len(),
            total = self.matches_found,
            "visited block"
        );

        if let Some(m) = &self.metrics {
            m.matches.inc_by(matches.len() as u64);
        }

        self.pending.extend(matches.into_iter().map(Step::Match));
        self.pending.push_back(Step::Progress(
            QueryProgress::snapshot(
                self.blocks_seen,
                self.matches_found,
                self.query.result_bound,
            )
            .with_total_blocks(self.total_blocks),
        ));

        if self.matches_found >= self.query.result_bound {
            let done = self.conclude(QueryOutcome::Completed {
                reason: CompletionReason::BoundReached,
                stats: self.stats(),
            });
            self.pending.push_back(done);
        }
    }

    fn conclude(&mut self, outcome: QueryOutcome) -> Step {
        self.finished = true;

        let stats = outcome.stats();
        tracing::info!(
            query = %self.id,
            outcome = outcome.label(),
            blocks_seen = stats.blocks_seen,
            matches_found = stats.matches_found,
            "query finished"
        );
        if let Some(m) = &self.metrics {
            m.queries.with_label_values(&[outcome.label()]).inc();
        }

        Step::Done(outcome)
    }
}

/// Caller's side of a started run.
///
/// Steps arrive on `matches` and `progress` in order; `outcome` fires once
/// after the last of them was sent.
pub struct QueryHandle {
    pub id: QueryId,
    pub matches: mpsc::UnboundedReceiver<InstructionMatch>,
    pub progress: mpsc::UnboundedReceiver<QueryProgress>,
    pub outcome: oneshot::Receiver<QueryOutcome>,
    pub controller: AbortController,
}

impl QueryHandle {
    /// Requests the run to stop. Idempotent; a no-op once the run ended.
    pub fn abort(&self) {
        self.controller.abort();
    }

    /// Waits for the run to end and returns everything it produced.
    pub async fn collect(mut self) -> QueryReport {
        let mut matches = Vec::new();
        while let Some(m) = self.matches.recv().await {
            matches.push(m);
        }
        let mut progress = Vec::new();
        while let Some(p) = self.progress.recv().await {
            progress.push(p);
        }
        let outcome = self.outcome.await.unwrap_or(QueryOutcome::Failed {
            error: PortError::Protocol("query task ended without an outcome".to_string()),
            stats: progress
                .last()
                .map(|p| QueryStats {
                    blocks_seen: p.blocks_seen,
                    matches_found: p.matches_found,
                })
                .unwrap_or_default(),
        });

        QueryReport {
            matches,
            progress,
            outcome,
        }
    }
}

/// Stateless query engine; every run gets its own [`QueryRun`].
pub struct QueryEngine<P: ?Sized> {
    port: Arc<P>,
    config: QueryConfig,
    metrics: Option<QueryMetrics>,
    next_id: AtomicU64,
}

impl<P> QueryEngine<P>
where
    P: LedgerPort + ?Sized + 'static,
{
    /// Creates a new engine reading from `port`.
    pub fn new(port: Arc<P>, config: QueryConfig) -> Self {
        Self {
            port,
            config,
            metrics: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Records fetches, matches, and outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: QueryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Validates `query` and sets up a run without starting it.
    ///
    /// No ledger request is made until the first call to
    /// [`QueryRun::next_step`].
    pub fn prepare(&self, query: Query) -> Result<QueryRun<P>, QueryError> {
        query.validate(&self.config)?;

        let id = QueryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::info!(
            query = %id,
            instance = %query.target,
            bound = query.result_bound,
            direction = ?query.direction(),
            "query started"
        );

        Ok(QueryRun::new(
            id,
            Arc::clone(&self.port),
            query,
            AbortController::new(),
            self.metrics.clone(),
        ))
    }

    /// Starts `query` on the Tokio runtime.
    ///
    /// Must be called from within a runtime. Invalid queries are rejected
    /// here, before any ledger request.
    pub fn start_query(&self, query: Query) -> Result<QueryHandle, QueryError> {
        let mut run = self.prepare(query)?;
        let id = run.id();
        let controller = run.abort_controller();

        let (match_tx, match_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut outcome = None;
            while let Some(step) = run.next_step().await {
                match step {
                    // A dropped receiver only means nobody is listening.
                    Step::Match(m) => {
                        let _ = match_tx.send(m);
                    }
                    Step::Progress(p) => {
                        let _ = progress_tx.send(p);
                    }
                    Step::Done(o) => outcome = Some(o),
                }
            }
            drop(match_tx);
            drop(progress_tx);
            if let Some(o) = outcome {
                let _ = outcome_tx.send(o);
            }
        });

        Ok(QueryHandle {
            id,
            matches: match_rx,
            progress: progress_rx,
            outcome: outcome_rx,
            controller,
        })
    }

    /// Runs `query` inline and collects the result.
    pub async fn run_to_end(&self, query: Query) -> Result<QueryReport, QueryError> {
        let run = self.prepare(query)?;
        Ok(run.collect().await)
    }
}
