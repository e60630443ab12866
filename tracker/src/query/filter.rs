//! Per-block instruction matching.

use std::sync::Arc;

use crate::types::{BlockHash, InstanceId, Instruction, LedgerBlock};

/// An instruction that targets the queried instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionMatch {
    /// Block the instruction was found in, shared between its matches.
    pub block: Arc<LedgerBlock>,
    /// Position of the transaction within the block.
    pub tx_index: usize,
    /// Position of the instruction within its transaction.
    pub instruction_index: usize,
    /// Whether the enclosing transaction was applied by the ledger.
    pub accepted: bool,
    pub instruction: Instruction,
}

impl InstructionMatch {
    pub fn block_index(&self) -> u64 {
        self.block.index
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block.hash
    }
}

/// Collects every instruction of `block` whose instance is `target`.
///
/// Rejected transactions are scanned like accepted ones. Results follow
/// transaction order, then instruction order.
pub fn filter_instructions(block: &Arc<LedgerBlock>, target: &InstanceId) -> Vec<InstructionMatch> {
    block
        .transactions
        .iter()
        .enumerate()
        .flat_map(move |(tx_index, tx)| {
            tx.instructions
                .iter()
                .enumerate()
                .filter(move |(_, ins)| ins.instance_id == *target)
                .map(move |(instruction_index, ins)| InstructionMatch {
                    block: Arc::clone(block),
                    tx_index,
                    instruction_index,
                    accepted: tx.accepted,
                    instruction: ins.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256, InstructionKind, TxResult};

    fn instance(byte: u8) -> InstanceId {
        InstanceId(Hash256([byte; HASH_LEN]))
    }

    fn invoke(byte: u8, command: &str) -> Instruction {
        Instruction {
            instance_id: instance(byte),
            kind: InstructionKind::Invoke {
                contract_id: "coin".to_string(),
                command: command.to_string(),
                args: vec![],
            },
        }
    }

    fn block(transactions: Vec<TxResult>) -> Arc<LedgerBlock> {
        Arc::new(LedgerBlock {
            index: 7,
            hash: BlockHash(Hash256([7u8; HASH_LEN])),
            base_height: 2,
            height: 1,
            backlinks: vec![],
            forward_links: vec![],
            transactions,
        })
    }

    #[test]
    fn matches_keep_tx_and_instruction_order_including_rejected() {
        let b = block(vec![
            TxResult {
                accepted: true,
                instructions: vec![invoke(1, "a"), invoke(2, "x"), invoke(1, "b")],
            },
            TxResult {
                accepted: false,
                instructions: vec![invoke(1, "c")],
            },
            TxResult {
                accepted: true,
                instructions: vec![invoke(3, "y")],
            },
        ]);

        let matches = filter_instructions(&b, &instance(1));
        let positions: Vec<(usize, usize, bool)> = matches
            .iter()
            .map(|m| (m.tx_index, m.instruction_index, m.accepted))
            .collect();
        assert_eq!(positions, vec![(0, 0, true), (0, 2, true), (1, 0, false)]);

        let commands: Vec<&str> = matches
            .iter()
            .map(|m| match &m.instruction.kind {
                InstructionKind::Invoke { command, .. } => command.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(commands, vec!["a", "b", "c"]);
        assert!(matches.iter().all(|m| m.block_index() == 7));
    }

    #[test]
    fn no_match_yields_empty_and_leaves_block_untouched() {
        let b = block(vec![TxResult {
            accepted: true,
            instructions: vec![invoke(2, "x")],
        }]);
        let before = (*b).clone();

        assert!(filter_instructions(&b, &instance(9)).is_empty());
        assert!(filter_instructions(&block(vec![]), &instance(9)).is_empty());
        assert_eq!(*b, before);
    }
}
