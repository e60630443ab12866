use std::fmt;

/// Errors returned before a query run starts.
///
/// Failures that happen while walking the chain are not errors of this
/// kind; they end the run with [`QueryOutcome::Failed`](super::QueryOutcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query is malformed and was rejected without touching the network.
    InvalidQuery(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}
