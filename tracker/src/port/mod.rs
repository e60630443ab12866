//! Ledger access: how the tracker obtains blocks.
//!
//! The tracker never talks to the network directly. It goes through the
//! [`LedgerPort`] trait, which hands out fully decoded [`LedgerBlock`]s and
//! follows links on request. This module provides:
//!
//! - the [`LedgerPort`] trait and its [`PortError`] taxonomy,
//! - an in-memory skip-chain ([`mem::InMemoryLedger`]) for tests and demos,
//! - an HTTP client ([`http::HttpLedgerClient`]) for real nodes.

use std::fmt;

use async_trait::async_trait;

use crate::types::{BlockRef, Direction, LedgerBlock};

pub mod http;
pub mod mem;

pub use http::HttpLedgerClient;
pub use mem::{ChainBuilder, InMemoryLedger};

/// Errors surfaced by a ledger port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Transport-level error (connection refused, timeout, ...).
    Connection(String),
    /// The node answered, but not with what was asked for.
    Protocol(String),
    /// The node's payload could not be decoded into ledger types.
    Decode(String),
    /// The requested block does not exist on this chain.
    NotFound(String),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::Connection(msg) => write!(f, "connection error: {msg}"),
            PortError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            PortError::Decode(msg) => write!(f, "decode error: {msg}"),
            PortError::NotFound(msg) => write!(f, "block not found: {msg}"),
        }
    }
}

impl std::error::Error for PortError {}

/// Source of ledger blocks.
///
/// Implementations own connection handling, pagination, and payload
/// decoding. Any retry policy belongs here too; callers treat every error
/// as final.
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Number of blocks in the chain, if known without a request.
    fn chain_length(&self) -> Option<u64> {
        None
    }

    /// Fetches the block identified by `at`.
    async fn fetch_block(&self, at: BlockRef) -> Result<LedgerBlock, PortError>;

    /// Follows the link of `block` at `level` in `direction`.
    ///
    /// Returns `Ok(None)` when the link does not exist (end of chain).
    async fn fetch_linked(
        &self,
        block: &LedgerBlock,
        level: usize,
        direction: Direction,
    ) -> Result<Option<LedgerBlock>, PortError> {
        match block.linked_hash(level, direction) {
            Some(hash) => self.fetch_block(BlockRef::Hash(hash)).await.map(Some),
            None => Ok(None),
        }
    }
}
