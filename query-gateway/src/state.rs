//! Shared application state and per-query result collection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use tracker::{
    AbortController, InstructionMatch, LedgerPort, PortError, QueryEngine, QueryHandle, QueryId,
    QueryOutcome, QueryProgress, QueryStats,
};

use crate::routes::queries::MatchView;

/// Everything the gateway knows about one started query.
///
/// Matches are kept as views so that a stored query does not pin the
/// blocks it was found in.
pub struct QueryEntry {
    pub matches: Vec<MatchView>,
    pub progress: Option<QueryProgress>,
    pub outcome: Option<QueryOutcome>,
    pub controller: AbortController,
}

/// Started queries by id.
///
/// Running queries are always kept. Finished ones are kept until more than
/// `max_finished` have finished after them, oldest first.
pub struct QueryTable {
    entries: HashMap<QueryId, QueryEntry>,
    finished: VecDeque<QueryId>,
    max_finished: usize,
}

impl QueryTable {
    pub fn new(max_finished: usize) -> Self {
        Self {
            entries: HashMap::new(),
            finished: VecDeque::new(),
            max_finished,
        }
    }

    pub fn get(&self, id: &QueryId) -> Option<&QueryEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of queries without an outcome yet.
    pub fn running(&self) -> usize {
        self.entries.len() - self.finished.len()
    }

    fn insert(&mut self, id: QueryId, controller: AbortController) {
        self.entries.insert(
            id,
            QueryEntry {
                matches: Vec::new(),
                progress: None,
                outcome: None,
                controller,
            },
        );
    }

    /// Appends matches and, after them, the progress snapshot counting them.
    fn record(&mut self, id: QueryId, fresh: Vec<MatchView>, progress: Option<QueryProgress>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.matches.extend(fresh);
            if progress.is_some() {
                entry.progress = progress;
            }
        }
    }

    /// Stores the outcome and evicts the oldest finished queries over the
    /// retention limit.
    fn finish(&mut self, id: QueryId, outcome: QueryOutcome) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.outcome.is_some() {
            return;
        }
        entry.outcome = Some(outcome);
        self.finished.push_back(id);

        while self.finished.len() > self.max_finished {
            if let Some(evicted) = self.finished.pop_front() {
                self.entries.remove(&evicted);
                tracing::debug!(query = %evicted, "evicted finished query");
            }
        }
    }

    fn abort_running(&self) {
        for entry in self.entries.values().filter(|e| e.outcome.is_none()) {
            entry.controller.abort();
        }
    }
}

/// Shared state held by the API and collector tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// Query engine over whichever ledger port the gateway was started with.
    pub engine: QueryEngine<dyn LedgerPort>,
    pub queries: Mutex<QueryTable>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(engine: QueryEngine<dyn LedgerPort>, max_finished: usize) -> Self {
        Self {
            engine,
            queries: Mutex::new(QueryTable::new(max_finished)),
        }
    }

    /// Registers a started run and spawns the task that records its output.
    pub async fn track(self: &Arc<Self>, handle: QueryHandle) -> QueryId {
        let QueryHandle {
            id,
            mut matches,
            mut progress,
            outcome,
            controller,
        } = handle;

        self.queries.lock().await.insert(id, controller);

        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut last = None;

            // The run sends a block's matches before its progress snapshot,
            // so they are already queued when the snapshot arrives.
            while let Some(p) = progress.recv().await {
                let fresh = drain_ready(&mut matches);
                last = Some(p);
                state.queries.lock().await.record(id, fresh, Some(p));
            }

            let mut rest = Vec::new();
            while let Some(m) = matches.recv().await {
                rest.push(MatchView::from(&m));
            }

            let outcome = outcome.await.unwrap_or_else(|_| {
                tracing::warn!(query = %id, "query task ended without an outcome");
                QueryOutcome::Failed {
                    error: PortError::Protocol("query task ended without an outcome".to_string()),
                    stats: last
                        .map(|p: QueryProgress| QueryStats {
                            blocks_seen: p.blocks_seen,
                            matches_found: p.matches_found,
                        })
                        .unwrap_or_default(),
                }
            });

            let mut queries = state.queries.lock().await;
            queries.record(id, rest, None);
            queries.finish(id, outcome);
        });

        id
    }

    /// Requests every unfinished query to stop.
    pub async fn abort_all(&self) {
        self.queries.lock().await.abort_running();
    }
}

fn drain_ready(matches: &mut mpsc::UnboundedReceiver<InstructionMatch>) -> Vec<MatchView> {
    let mut views = Vec::new();
    while let Ok(m) = matches.try_recv() {
        views.push(MatchView::from(&m));
    }
    views
}
