// tracker/src/types/block.rs

//! Ledger blocks and skip-list links.
//!
//! A [`LedgerBlock`] is one position in the skip-chain. Besides its
//! transactions it carries links at several levels: `backlinks[i]` points
//! `base_height^i` indices back and `forward_links[i]` points the same
//! distance forward. Forward links only exist once a later block has been
//! appended. The tracker only ever follows level-0 links.
//!
//! Locally built blocks are hashed with **bincode 2** (serde integration,
//! `standard()` config) followed by BLAKE3-256, the same canonical encoding
//! everywhere we need block bytes.

use serde::{Deserialize, Serialize};

use super::{BlockHash, Hash256, TxResult};

/// Reference to a successor block, with the signature that attests it.
///
/// The signature is carried through untouched; checking it is left to the
/// ledger client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLink {
    /// Hash of the block this link points to.
    pub to: BlockHash,
    /// Collective signature over the link, opaque to the tracker.
    pub signature: Vec<u8>,
}

/// Which way along the chain a link points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards genesis, following backlinks.
    Backward,
    /// Towards the head, following forward links.
    Forward,
}

/// How a caller names a block when asking the ledger for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockRef {
    Hash(BlockHash),
    Index(u64),
}

/// One block of the skip-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBlock {
    /// Position in the chain, starting from 0 at genesis.
    pub index: u64,

    /// Unique identifier of the block.
    pub hash: BlockHash,

    /// Skip-list base: level `i` links span `base_height^i` indices.
    pub base_height: u32,

    /// Number of link levels this block takes part in.
    pub height: u32,

    /// Predecessor hashes, lowest level first. Empty for genesis.
    pub backlinks: Vec<BlockHash>,

    /// Successor references, lowest level first. Empty at the chain head.
    pub forward_links: Vec<ForwardLink>,

    /// Ordered transaction results committed in this block.
    pub transactions: Vec<TxResult>,
}

/// The part of a block covered by its hash.
///
/// Forward links are added after the fact, so they cannot be part of it.
#[derive(Serialize)]
struct BlockContent<'a> {
    index: u64,
    base_height: u32,
    height: u32,
    backlinks: &'a [BlockHash],
    transactions: &'a [TxResult],
}

impl LedgerBlock {
    /// Returns `true` for the first block of the chain.
    pub fn is_genesis(&self) -> bool {
        self.backlinks.is_empty()
    }

    /// Returns `true` when no later block has been linked yet.
    pub fn is_head(&self) -> bool {
        self.forward_links.is_empty()
    }

    /// Hash of the block reached by the link at `level` in `direction`.
    ///
    /// `None` means the chain ends there: genesis going backward, the
    /// current head going forward.
    pub fn linked_hash(&self, level: usize, direction: Direction) -> Option<BlockHash> {
        match direction {
            Direction::Backward => self.backlinks.get(level).copied(),
            Direction::Forward => self.forward_links.get(level).map(|link| link.to),
        }
    }

    /// Index distance covered by a link at `level`.
    ///
    /// Saturates instead of overflowing for absurd levels.
    pub fn link_distance(&self, level: usize) -> u64 {
        let base = u64::from(self.base_height.max(1));
        let level = u32::try_from(level).unwrap_or(u32::MAX);
        base.saturating_pow(level)
    }

    /// Canonical bytes of the hashed block content.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming error,
    /// because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let content = BlockContent {
            index: self.index,
            base_height: self.base_height,
            height: self.height,
            backlinks: &self.backlinks,
            transactions: &self.transactions,
        };
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(&content, cfg)
            .expect("block content should always be serializable with bincode 2 + serde")
    }

    /// BLAKE3-256 over [`LedgerBlock::canonical_bytes`].
    pub fn content_hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(&self.canonical_bytes()))
    }

    /// Total number of instructions across all transactions.
    pub fn instruction_count(&self) -> usize {
        self.transactions
            .iter()
            .map(|tx| tx.instructions.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HASH_LEN;

    fn bare_block(index: u64) -> LedgerBlock {
        LedgerBlock {
            index,
            hash: BlockHash(Hash256([0u8; HASH_LEN])),
            base_height: 4,
            height: 1,
            backlinks: Vec::new(),
            forward_links: Vec::new(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn content_hash_ignores_forward_links_and_reported_hash() {
        let mut block = bare_block(3);
        let h1 = block.content_hash();

        block.forward_links.push(ForwardLink {
            to: BlockHash(Hash256([9u8; HASH_LEN])),
            signature: vec![1, 2, 3],
        });
        block.hash = BlockHash(Hash256([7u8; HASH_LEN]));

        assert_eq!(block.content_hash(), h1);
        assert_eq!(
            block.linked_hash(0, Direction::Forward),
            Some(BlockHash(Hash256([9u8; HASH_LEN])))
        );
        assert_ne!(bare_block(4).content_hash(), h1);
    }

    #[test]
    fn link_distance_is_a_power_of_the_base() {
        let block = bare_block(0);
        assert_eq!(block.link_distance(0), 1);
        assert_eq!(block.link_distance(1), 4);
        assert_eq!(block.link_distance(3), 64);
        assert_eq!(block.link_distance(usize::MAX), u64::MAX);
    }

    #[test]
    fn genesis_and_head_are_detected_from_links() {
        let block = bare_block(0);
        assert!(block.is_genesis());
        assert!(block.is_head());
        assert_eq!(block.linked_hash(0, Direction::Backward), None);
        assert_eq!(block.linked_hash(0, Direction::Forward), None);
        assert_eq!(block.instruction_count(), 0);
    }
}
