//! Core domain types used by the tracker.
//!
//! This module defines strongly-typed hashes, block and instance
//! identifiers, and the roster of ledger nodes that the tracker talks to.
//! The goal is to avoid "naked" byte buffers in public APIs and instead use
//! domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ledger blocks and skip-list links.
pub mod block;
/// Transaction results and the instructions they carry.
pub mod tx;

pub use block::{BlockRef, Direction, ForwardLink, LedgerBlock};
pub use tx::{Argument, Instruction, InstructionKind, TxResult};

/// Length in bytes of all 256-bit identifiers used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This is the backing representation for block hashes and instance
/// identifiers. It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lower-case hex encoding of the hash.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string into a [`Hash256`].
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s.trim()).map_err(|_| HexError::InvalidEncoding)?;
        Self::from_slice(&bytes)
    }

    /// Copies a byte slice of exactly [`HASH_LEN`] bytes into a hash.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
        if bytes.len() != HASH_LEN {
            return Err(HexError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(bytes);
        Ok(Hash256(arr))
    }
}

/// Error returned when a textual identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// The input is not valid hex.
    InvalidEncoding,
    /// The decoded input does not have [`HASH_LEN`] bytes.
    InvalidLength(usize),
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexError::InvalidEncoding => write!(f, "invalid hex encoding"),
            HexError::InvalidLength(n) => {
                write!(f, "expected {HASH_LEN}-byte identifier, got {n} bytes")
            }
        }
    }
}

impl std::error::Error for HexError {}

/// Strongly-typed block hash.
///
/// Unique per block. Blocks built locally hash their content with
/// [`LedgerBlock::content_hash`]; blocks decoded from the network carry the
/// hash the node reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        Hash256::from_hex(s).map(BlockHash)
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of a logical stateful object on the ledger.
///
/// Instructions name the instance they operate on; the tracker compares
/// these identifiers byte-for-byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Hash256);

impl InstanceId {
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        Hash256::from_hex(s).map(InstanceId)
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Returns the underlying [`Hash256`] backing this identifier.
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The set of ledger nodes a client may query.
///
/// Each entry is the base URL of a node, e.g. `"http://127.0.0.1:7771"`.
/// Clients contact the first node in the list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub nodes: Vec<String>,
}

impl Roster {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }

    /// Parses a comma-separated list of node URLs, skipping empty entries.
    pub fn parse(list: &str) -> Self {
        let nodes = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { nodes }
    }

    /// Node the client talks to, if the roster is not empty.
    pub fn leader(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_roundtrip_and_errors() {
        let h = Hash256([0xAB; HASH_LEN]);
        let s = h.to_hex();
        assert_eq!(s.len(), HASH_LEN * 2);
        assert_eq!(Hash256::from_hex(&s).unwrap(), h);

        assert_eq!(Hash256::from_hex("zz"), Err(HexError::InvalidEncoding));
        assert_eq!(Hash256::from_hex("abcd"), Err(HexError::InvalidLength(2)));
    }

    #[test]
    fn roster_parse_skips_blanks_and_picks_first_node() {
        let roster = Roster::parse(" http://a:1 , ,http://b:2,");
        assert_eq!(roster.nodes, vec!["http://a:1", "http://b:2"]);
        assert_eq!(roster.leader(), Some("http://a:1"));
        assert_eq!(Roster::default().leader(), None);
    }
}
