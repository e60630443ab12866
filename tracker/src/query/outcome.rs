//! Terminal states of a query run.

use crate::port::PortError;

/// Counters at the moment a run ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub blocks_seen: u64,
    pub matches_found: usize,
}

/// Why a run completed normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    /// Exactly `result_bound` matches were emitted.
    BoundReached,
    /// The chain ended first; results may be partial.
    EndOfChain,
}

/// How a query run ended.
///
/// Matches emitted before the end are valid in every case; nothing is
/// ever retracted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    Completed {
        reason: CompletionReason,
        stats: QueryStats,
    },
    /// Stopped on request. The matches are a prefix of the uninterrupted run.
    Aborted { stats: QueryStats },
    /// The ledger could not be read; no further matches follow.
    Failed { error: PortError, stats: QueryStats },
}

impl QueryOutcome {
    pub fn stats(&self) -> QueryStats {
        match self {
            QueryOutcome::Completed { stats, .. }
            | QueryOutcome::Aborted { stats }
            | QueryOutcome::Failed { stats, .. } => *stats,
        }
    }

    /// Short lowercase label, used for logs and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            QueryOutcome::Completed { .. } => "completed",
            QueryOutcome::Aborted { .. } => "aborted",
            QueryOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, QueryOutcome::Completed { .. })
    }
}
