//! Tracker library crate.
//!
//! This crate locates every instruction that touched a given instance on a
//! skip-chain ledger, without downloading the whole chain. It provides:
//!
//! - strongly-typed domain types (`types`),
//! - the ledger access port and its implementations (`port`),
//! - the query engine: walker, filter, progress, and orchestration (`query`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level configuration (`config`).
//!
//! Higher-level binaries (the CLI in this crate, the HTTP gateway) compose
//! these pieces to run queries for a display layer.

pub mod config;
pub mod metrics;
pub mod port;
pub mod query;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ConfigError, LedgerClientConfig, MetricsConfig, TrackerConfig};

// Re-export the ledger port and its implementations.
pub use port::{ChainBuilder, HttpLedgerClient, InMemoryLedger, LedgerPort, PortError};

// Re-export "core" query types.
pub use query::{
    AbortController, CompletionReason, InstructionMatch, Query, QueryConfig, QueryEngine,
    QueryError, QueryHandle, QueryId, QueryOutcome, QueryProgress, QueryReport, QueryRequest,
    QueryStart, QueryStats, Step,
};

// Re-export metrics registry and query metrics.
pub use metrics::{MetricsRegistry, QueryMetrics, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Engine type used against real ledger nodes.
pub type HttpQueryEngine = QueryEngine<HttpLedgerClient>;
