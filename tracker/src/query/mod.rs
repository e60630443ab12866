//! Instance-tracking queries.
//!
//! This module turns a [`Query`] into an ordered stream of matching
//! instructions. It is made of small, separately testable pieces:
//!
//! - query shape and validation ([`request`]),
//! - a cooperative abort flag ([`abort::AbortController`]),
//! - block-by-block traversal ([`walker::ChainWalker`]),
//! - per-block matching ([`filter::filter_instructions`]),
//! - progress snapshots ([`progress::QueryProgress`]),
//! - and the orchestrating [`engine::QueryEngine`] / [`engine::QueryRun`].

pub mod abort;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod outcome;
pub mod progress;
pub mod request;
pub mod walker;

pub use abort::AbortController;
pub use config::QueryConfig;
pub use engine::{QueryEngine, QueryHandle, QueryId, QueryReport, QueryRun, Step};
pub use error::QueryError;
pub use filter::{InstructionMatch, filter_instructions};
pub use outcome::{CompletionReason, QueryOutcome, QueryStats};
pub use progress::QueryProgress;
pub use request::{Query, QueryRequest, QueryStart};
pub use walker::{ChainWalker, WalkStep};
