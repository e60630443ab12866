//! HTTP-based ledger client.
//!
//! This implementation of [`LedgerPort`] talks to a ledger node's paginate
//! endpoint. It assumes the node exposes a JSON API of the form:
//!
//! ```json
//! POST /paginate
//! {
//!   "start_id": "hex-encoded-block-hash",
//!   "page_size": 1,
//!   "num_pages": 1,
//!   "backward": false
//! }
//!
//! Response:
//! {
//!   "error_code": 0,
//!   "error_text": "",
//!   "blocks": [
//!     {
//!       "index": 12,
//!       "hash": "…",
//!       "base_height": 4,
//!       "height": 2,
//!       "backlinks": ["…", "…"],
//!       "forward_links": [{ "to": "…", "signature": "…" }],
//!       "transactions": [
//!         {
//!           "accepted": true,
//!           "instructions": [
//!             {
//!               "instance_id": "…",
//!               "kind": "invoke",
//!               "contract_id": "coin",
//!               "command": "transfer",
//!               "args": [{ "name": "coins", "value": "0a00000000000000" }]
//!             }
//!           ]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Only the first roster node is contacted. Blocks are requested one page
//! of one block at a time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::port::{LedgerPort, PortError};
use crate::types::{
    Argument, BlockHash, BlockRef, ForwardLink, Hash256, InstanceId, Instruction,
    InstructionKind, LedgerBlock, Roster, TxResult,
};

/// HTTP client for a ledger node.
///
/// The underlying `reqwest` client pools connections and is cheap to share
/// between concurrent queries.
pub struct HttpLedgerClient {
    roster: Roster,
    genesis: BlockHash,
    client: Client,
    timeout: Duration,
}

impl HttpLedgerClient {
    /// Constructs a client for `roster`, rooted at the `genesis` block.
    pub fn new(roster: Roster, genesis: BlockHash, timeout: Duration) -> Result<Self, PortError> {
        if roster.leader().is_none() {
            return Err(PortError::Connection("roster is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            roster,
            genesis,
            client,
            timeout,
        })
    }

    /// Request timeout applied to every call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Node every request is sent to.
    pub fn leader(&self) -> Option<&str> {
        self.roster.leader()
    }

    fn endpoint(&self, path: &str) -> Result<String, PortError> {
        let base = self
            .roster
            .leader()
            .ok_or_else(|| PortError::Connection("roster is empty".to_string()))?;
        // Avoid accidental double slashes.
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    /// Fetches the single block identified by `hash`.
    async fn fetch_by_hash(&self, hash: BlockHash) -> Result<LedgerBlock, PortError> {
        let url = self.endpoint("/paginate")?;

        let req_body = PaginateRequest {
            start_id: hash.to_hex(),
            page_size: 1,
            num_pages: 1,
            backward: false,
        };

        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| PortError::Connection(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PortError::Protocol(format!(
                "ledger node returned HTTP status {status}"
            )));
        }

        let page = resp
            .json::<PaginateResponse>()
            .await
            .map_err(|e| PortError::Decode(format!("failed to parse JSON response: {e}")))?;

        let block = page.into_first_block()?;
        if block.hash != hash {
            return Err(PortError::Protocol(format!(
                "asked for block {hash}, node returned {}",
                block.hash
            )));
        }
        Ok(block)
    }

    /// Walks forward from genesis to `index`, taking the longest forward
    /// link that does not overshoot at every step.
    ///
    /// Every hop must land exactly `link_distance(level)` further, so a
    /// node serving looping links cannot keep the walk going.
    async fn fetch_by_index(&self, index: u64) -> Result<LedgerBlock, PortError> {
        let mut current = self.fetch_by_hash(self.genesis).await?;

        while current.index < index {
            let remaining = index - current.index;
            let level = (0..current.forward_links.len())
                .rev()
                .find(|&level| current.link_distance(level) <= remaining);

            let Some(level) = level else {
                return Err(PortError::NotFound(format!(
                    "index {index}: chain ends at index {}",
                    current.index
                )));
            };

            let expected = current.index.saturating_add(current.link_distance(level));
            let next = self.fetch_by_hash(current.forward_links[level].to).await?;
            if next.index != expected {
                return Err(PortError::Protocol(format!(
                    "level-{level} link from block {} led to block {}, expected {expected}",
                    current.index, next.index
                )));
            }
            current = next;
        }

        if current.index != index {
            return Err(PortError::Protocol(format!(
                "overshot index {index}, landed on {}",
                current.index
            )));
        }
        Ok(current)
    }
}

#[async_trait]
impl LedgerPort for HttpLedgerClient {
    async fn fetch_block(&self, at: BlockRef) -> Result<LedgerBlock, PortError> {
        match at {
            BlockRef::Hash(hash) => self.fetch_by_hash(hash).await,
            BlockRef::Index(0) => self.fetch_by_hash(self.genesis).await,
            BlockRef::Index(index) => self.fetch_by_index(index).await,
        }
    }
}

/// Internal request payload sent to the ledger node.
#[derive(Debug, Serialize)]
struct PaginateRequest {
    /// Hex-encoded hash of the first block of the page.
    start_id: String,
    page_size: u32,
    num_pages: u32,
    backward: bool,
}

/// Internal response payload returned by the ledger node.
#[derive(Debug, Deserialize)]
struct PaginateResponse {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_text: String,
    #[serde(default)]
    blocks: Vec<WireBlock>,
}

impl PaginateResponse {
    fn into_first_block(self) -> Result<LedgerBlock, PortError> {
        if self.error_code != 0 {
            return Err(PortError::Protocol(format!(
                "node error {}: {}",
                self.error_code, self.error_text
            )));
        }
        let wire = self
            .blocks
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Protocol("empty page".to_string()))?;
        LedgerBlock::try_from(wire).map_err(PortError::Decode)
    }
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    index: u64,
    hash: String,
    base_height: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default)]
    backlinks: Vec<String>,
    #[serde(default)]
    forward_links: Vec<WireForwardLink>,
    #[serde(default)]
    transactions: Vec<WireTx>,
}

fn default_height() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct WireForwardLink {
    to: String,
    #[serde(default)]
    signature: String,
}

#[derive(Debug, Deserialize)]
struct WireTx {
    accepted: bool,
    #[serde(default)]
    instructions: Vec<WireInstruction>,
}

#[derive(Debug, Deserialize)]
struct WireInstruction {
    instance_id: String,
    kind: String,
    contract_id: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<WireArgument>,
}

#[derive(Debug, Deserialize)]
struct WireArgument {
    name: String,
    #[serde(default)]
    value: String,
}

fn decode_hash(field: &str, s: &str) -> Result<Hash256, String> {
    Hash256::from_hex(s).map_err(|e| format!("{field}: {e}"))
}

fn decode_bytes(field: &str, s: &str) -> Result<Vec<u8>, String> {
    hex::decode(s).map_err(|e| format!("{field}: {e}"))
}

impl TryFrom<WireArgument> for Argument {
    type Error = String;

    fn try_from(wire: WireArgument) -> Result<Self, Self::Error> {
        let value = decode_bytes("argument value", &wire.value)?;
        Ok(Argument {
            name: wire.name,
            value,
        })
    }
}

impl TryFrom<WireInstruction> for Instruction {
    type Error = String;

    fn try_from(wire: WireInstruction) -> Result<Self, Self::Error> {
        let instance_id = InstanceId(decode_hash("instance_id", &wire.instance_id)?);
        let args = wire
            .args
            .into_iter()
            .map(Argument::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let kind = match wire.kind.as_str() {
            "spawn" => InstructionKind::Spawn {
                contract_id: wire.contract_id,
                args,
            },
            "invoke" => InstructionKind::Invoke {
                contract_id: wire.contract_id,
                command: wire
                    .command
                    .ok_or_else(|| "invoke instruction without command".to_string())?,
                args,
            },
            "delete" => InstructionKind::Delete {
                contract_id: wire.contract_id,
            },
            other => return Err(format!("unknown instruction kind {other:?}")),
        };

        Ok(Instruction { instance_id, kind })
    }
}

impl TryFrom<WireBlock> for LedgerBlock {
    type Error = String;

    fn try_from(wire: WireBlock) -> Result<Self, Self::Error> {
        let hash = BlockHash(decode_hash("hash", &wire.hash)?);

        let backlinks = wire
            .backlinks
            .iter()
            .map(|s| decode_hash("backlink", s).map(BlockHash))
            .collect::<Result<Vec<_>, _>>()?;

        let forward_links = wire
            .forward_links
            .into_iter()
            .map(|link| -> Result<ForwardLink, String> {
                Ok(ForwardLink {
                    to: BlockHash(decode_hash("forward link", &link.to)?),
                    signature: decode_bytes("forward link signature", &link.signature)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let transactions = wire
            .transactions
            .into_iter()
            .map(|tx| -> Result<TxResult, String> {
                let instructions = tx
                    .instructions
                    .into_iter()
                    .map(Instruction::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TxResult {
                    accepted: tx.accepted,
                    instructions,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LedgerBlock {
            index: wire.index,
            hash,
            base_height: wire.base_height,
            height: wire.height,
            backlinks,
            forward_links,
            transactions,
        })
    }
}
