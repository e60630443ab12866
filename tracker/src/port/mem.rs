//! In-memory skip-chain.
//!
//! This implementation is useful for unit tests, demos, and reproducing
//! query behaviour without a running ledger. [`ChainBuilder`] appends
//! blocks and wires their backlinks and forward links at every level;
//! [`InMemoryLedger`] serves them through [`LedgerPort`] and records every
//! request so tests can assert on network usage.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::port::{LedgerPort, PortError};
use crate::types::{BlockHash, BlockRef, ForwardLink, HASH_LEN, Hash256, LedgerBlock, TxResult};

/// Builds a fully linked chain, one block at a time.
pub struct ChainBuilder {
    base_height: u32,
    max_height: u32,
    blocks: Vec<LedgerBlock>,
}

impl ChainBuilder {
    /// Creates a builder for a chain with the given skip-list parameters.
    ///
    /// `base_height` below 2 is bumped to 2; `max_height` is at least 1.
    pub fn new(base_height: u32, max_height: u32) -> Self {
        Self {
            base_height: base_height.max(2),
            max_height: max_height.max(1),
            blocks: Vec::new(),
        }
    }

    /// Number of link levels for the block at `index`.
    fn height_for(&self, index: u64) -> u32 {
        if index == 0 {
            return self.max_height;
        }
        let base = u64::from(self.base_height);
        let mut height = 1;
        let mut span = base;
        while height < self.max_height && index % span == 0 {
            height += 1;
            span = span.saturating_mul(base);
        }
        height
    }

    /// Appends a block holding `transactions` and returns its hash.
    pub fn push(&mut self, transactions: Vec<TxResult>) -> BlockHash {
        let index = self.blocks.len() as u64;
        let height = self.height_for(index);

        let mut block = LedgerBlock {
            index,
            hash: BlockHash(Hash256([0u8; HASH_LEN])),
            base_height: self.base_height,
            height,
            backlinks: Vec::new(),
            forward_links: Vec::new(),
            transactions,
        };

        for level in 0..height as usize {
            let distance = block.link_distance(level);
            if distance > index {
                break;
            }
            let target = (index - distance) as usize;
            block.backlinks.push(self.blocks[target].hash);
        }

        block.hash = block.content_hash();
        let hash = block.hash;

        // Every predecessor that reaches this block at some level gains a
        // forward link now that the target exists.
        for level in 0..height as usize {
            let distance = block.link_distance(level);
            if distance > index {
                break;
            }
            let from = (index - distance) as usize;
            let pred = &mut self.blocks[from];
            if pred.forward_links.len() == level && (level as u32) < pred.height {
                pred.forward_links.push(ForwardLink {
                    to: hash,
                    signature: Vec::new(),
                });
            }
        }

        self.blocks.push(block);
        hash
    }

    /// Appends `count` blocks without transactions.
    pub fn push_empty(&mut self, count: usize) {
        for _ in 0..count {
            self.push(Vec::new());
        }
    }

    /// Number of blocks appended so far.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no block has been appended.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Freezes the chain into a servable ledger.
    pub fn build(self) -> InMemoryLedger {
        InMemoryLedger::from_blocks(self.blocks)
    }
}

/// In-memory implementation of [`LedgerPort`].
#[derive(Default)]
pub struct InMemoryLedger {
    blocks: Vec<LedgerBlock>,
    by_hash: HashMap<BlockHash, usize>,
    requests: AtomicUsize,
    fetched: Mutex<Vec<u64>>,
    failure: Option<(u64, PortError)>,
    latency: Option<Duration>,
}

impl InMemoryLedger {
    /// Wraps blocks ordered by index.
    pub fn from_blocks(blocks: Vec<LedgerBlock>) -> Self {
        let by_hash = blocks
            .iter()
            .enumerate()
            .map(|(pos, b)| (b.hash, pos))
            .collect();
        Self {
            blocks,
            by_hash,
            ..Self::default()
        }
    }

    /// Makes any fetch of the block at `index` fail with a connection error.
    pub fn fail_at(self, index: u64) -> Self {
        self.fail_with(
            index,
            PortError::Connection(format!("injected failure fetching block {index}")),
        )
    }

    /// Makes any fetch of the block at `index` fail with `error`.
    pub fn fail_with(mut self, index: u64, error: PortError) -> Self {
        self.failure = Some((index, error));
        self
    }

    /// Delays every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of blocks in the chain.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the chain has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Direct access to a block by index, without counting a request.
    pub fn block(&self, index: u64) -> Option<&LedgerBlock> {
        self.blocks.get(index as usize)
    }

    /// Hash of the genesis block, if any.
    pub fn genesis_hash(&self) -> Option<BlockHash> {
        self.blocks.first().map(|b| b.hash)
    }

    /// Hash of the latest block, if any.
    pub fn head_hash(&self) -> Option<BlockHash> {
        self.blocks.last().map(|b| b.hash)
    }

    /// Total number of fetch requests served or failed so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Indices of the blocks requested so far, in request order.
    pub fn fetched_indices(&self) -> Vec<u64> {
        self.fetched
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, at: BlockRef) -> Result<&LedgerBlock, PortError> {
        let found = match at {
            BlockRef::Index(index) => self.blocks.get(index as usize),
            BlockRef::Hash(hash) => self.by_hash.get(&hash).map(|&pos| &self.blocks[pos]),
        };
        found.ok_or_else(|| match at {
            BlockRef::Index(index) => PortError::NotFound(format!("index {index}")),
            BlockRef::Hash(hash) => PortError::NotFound(format!("hash {hash}")),
        })
    }
}

#[async_trait]
impl LedgerPort for InMemoryLedger {
    fn chain_length(&self) -> Option<u64> {
        Some(self.blocks.len() as u64)
    }

    async fn fetch_block(&self, at: BlockRef) -> Result<LedgerBlock, PortError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let block = self.lookup(at)?;
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(block.index);
        }

        if let Some((index, error)) = &self.failure {
            if *index == block.index {
                return Err(error.clone());
            }
        }

        Ok(block.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn chain(len: usize) -> InMemoryLedger {
        let mut builder = ChainBuilder::new(2, 4);
        builder.push_empty(len);
        builder.build()
    }

    #[test]
    fn level_zero_links_connect_neighbours() {
        let ledger = chain(6);
        for index in 1..6u64 {
            let prev = ledger.block(index - 1).unwrap();
            let cur = ledger.block(index).unwrap();
            assert_eq!(cur.backlinks[0], prev.hash);
            assert_eq!(prev.forward_links[0].to, cur.hash);
        }
        assert!(ledger.block(0).unwrap().is_genesis());
        assert!(ledger.block(5).unwrap().is_head());
    }

    #[test]
    fn higher_levels_skip_base_powers() {
        let ledger = chain(9);
        let genesis = ledger.block(0).unwrap();
        // base 2, max height 4: genesis links to 1, 2, 4, 8
        let targets: Vec<u64> = genesis
            .forward_links
            .iter()
            .map(|l| ledger.by_hash[&l.to] as u64)
            .collect();
        assert_eq!(targets, vec![1, 2, 4, 8]);

        let b8 = ledger.block(8).unwrap();
        assert_eq!(b8.backlinks.len(), 4);
        assert_eq!(b8.backlinks[3], genesis.hash);

        // odd blocks only take part in level 0
        assert_eq!(ledger.block(3).unwrap().height, 1);
        assert_eq!(ledger.block(3).unwrap().forward_links.len(), 1);
    }

    #[tokio::test]
    async fn fetch_counts_requests_and_injects_failures() {
        let ledger = chain(4).fail_at(2);
        let genesis_hash = ledger.genesis_hash().unwrap();

        let b0 = ledger
            .fetch_block(BlockRef::Hash(genesis_hash))
            .await
            .expect("genesis fetch");
        let b1 = ledger
            .fetch_linked(&b0, 0, Direction::Forward)
            .await
            .expect("fetch b1")
            .expect("b1 exists");
        assert_eq!(b1.index, 1);

        let err = ledger
            .fetch_linked(&b1, 0, Direction::Forward)
            .await
            .expect_err("b2 should fail");
        assert!(matches!(err, PortError::Connection(_)));

        let none = ledger
            .fetch_linked(&b0, 0, Direction::Backward)
            .await
            .expect("genesis has no predecessor");
        assert!(none.is_none());

        assert_eq!(ledger.requests(), 3);
        assert_eq!(ledger.fetched_indices(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn unknown_block_is_not_found() {
        let ledger = chain(2);
        let err = ledger
            .fetch_block(BlockRef::Index(7))
            .await
            .expect_err("index out of range");
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
