//! Block-by-block traversal of the chain.
//!
//! The walker resolves the start block, then follows level-0 links in one
//! direction, one request at a time. It checks the abort flag before every
//! request and stops for good on the first terminal condition. A fresh
//! walker is needed per query.

use std::sync::Arc;

use crate::port::{LedgerPort, PortError};
use crate::types::{BlockRef, Direction, LedgerBlock};

use super::abort::AbortController;
use super::request::QueryStart;

/// One step of a walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkStep {
    /// Next block in traversal order.
    Block(Arc<LedgerBlock>),
    /// The link to follow does not exist.
    EndOfChain,
    /// The abort flag was set before the next request.
    Aborted,
}

enum Position {
    Start,
    At(Arc<LedgerBlock>),
    Finished(Result<WalkStep, PortError>),
}

/// Lazy, finite, non-restartable sequence of blocks.
pub struct ChainWalker<P: ?Sized> {
    port: Arc<P>,
    start: QueryStart,
    direction: Direction,
    abort: AbortController,
    position: Position,
}

impl<P> ChainWalker<P>
where
    P: LedgerPort + ?Sized,
{
    pub fn new(port: Arc<P>, start: QueryStart, abort: AbortController) -> Self {
        let direction = match start {
            QueryStart::Block { direction, .. } => direction,
            QueryStart::Genesis => Direction::Forward,
        };
        Self {
            port,
            start,
            direction,
            abort,
            position: Position::Start,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advances the walk by one block.
    ///
    /// After a terminal step (end of chain, abort, or error) every further
    /// call returns that same step without touching the network.
    pub async fn next_block(&mut self) -> Result<WalkStep, PortError> {
        let fetched = match &self.position {
            Position::Finished(last) => return last.clone(),
            Position::Start => {
                if self.abort.is_aborted() {
                    return self.finish(Ok(WalkStep::Aborted));
                }
                self.fetch_start().await
            }
            Position::At(current) => {
                if current.linked_hash(0, self.direction).is_none() {
                    return self.finish(Ok(WalkStep::EndOfChain));
                }
                if self.abort.is_aborted() {
                    return self.finish(Ok(WalkStep::Aborted));
                }
                let current = Arc::clone(current);
                self.fetch_next(&current).await
            }
        };

        match fetched {
            Ok(Some(block)) => {
                let block = Arc::new(block);
                self.position = Position::At(Arc::clone(&block));
                Ok(WalkStep::Block(block))
            }
            Ok(None) => self.finish(Ok(WalkStep::EndOfChain)),
            Err(e) => self.finish(Err(e)),
        }
    }

    fn finish(&mut self, step: Result<WalkStep, PortError>) -> Result<WalkStep, PortError> {
        self.position = Position::Finished(step.clone());
        step
    }

    async fn fetch_start(&self) -> Result<Option<LedgerBlock>, PortError> {
        match self.start {
            QueryStart::Genesis => {
                let block = self.port.fetch_block(BlockRef::Index(0)).await?;
                if block.index != 0 {
                    return Err(PortError::Protocol(format!(
                        "asked for genesis, got block {}",
                        block.index
                    )));
                }
                Ok(Some(block))
            }
            QueryStart::Block { hash, .. } => {
                self.port.fetch_block(BlockRef::Hash(hash)).await.map(Some)
            }
        }
    }

    /// Follows the level-0 link and checks the index moved by exactly one.
    async fn fetch_next(&self, current: &LedgerBlock) -> Result<Option<LedgerBlock>, PortError> {
        let Some(next) = self.port.fetch_linked(current, 0, self.direction).await? else {
            return Ok(None);
        };

        let expected = match self.direction {
            Direction::Forward => current.index.checked_add(1),
            Direction::Backward => current.index.checked_sub(1),
        };
        if Some(next.index) != expected {
            return Err(PortError::Protocol(format!(
                "level-0 link from block {} led to block {}",
                current.index, next.index
            )));
        }
        Ok(Some(next))
    }
}
