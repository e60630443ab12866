// tracker/src/types/tx.rs

//! Transaction results and instructions.
//!
//! Every block carries an ordered list of [`TxResult`]s. A transaction is
//! either accepted or rejected by the ledger; rejected ones had no effect
//! but stay visible, and the tracker reports their instructions too.
//! Each transaction holds an ordered list of [`Instruction`]s that spawn,
//! invoke, or delete an instance.

use serde::{Deserialize, Serialize};

use super::InstanceId;

/// Named argument passed to a contract. The value is opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: Vec<u8>,
}

/// What an instruction does to its instance.
///
/// The payloads are carried verbatim; the tracker never interprets them.
/// For binary formats (bincode 2) we use the default externally-tagged
/// representation, which is supported by `bincode::serde`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// Creates a new instance from a contract.
    Spawn {
        contract_id: String,
        args: Vec<Argument>,
    },

    /// Runs a command of the contract bound to the instance.
    Invoke {
        contract_id: String,
        command: String,
        args: Vec<Argument>,
    },

    /// Removes the instance.
    Delete { contract_id: String },
}

impl InstructionKind {
    /// Short lowercase label, e.g. for logs and JSON views.
    pub fn label(&self) -> &'static str {
        match self {
            InstructionKind::Spawn { .. } => "spawn",
            InstructionKind::Invoke { .. } => "invoke",
            InstructionKind::Delete { .. } => "delete",
        }
    }

    /// Contract the instruction is addressed to.
    pub fn contract_id(&self) -> &str {
        match self {
            InstructionKind::Spawn { contract_id, .. }
            | InstructionKind::Invoke { contract_id, .. }
            | InstructionKind::Delete { contract_id } => contract_id,
        }
    }
}

/// One atomic operation on an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Instance the instruction operates on.
    pub instance_id: InstanceId,
    /// Operation and its opaque payload.
    pub kind: InstructionKind,
}

/// A transaction as committed by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// Whether the ledger applied the transaction.
    pub accepted: bool,
    /// Instructions in execution order.
    pub instructions: Vec<Instruction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256};

    fn instance(byte: u8) -> InstanceId {
        InstanceId(Hash256([byte; HASH_LEN]))
    }

    #[test]
    fn kind_labels_and_contract_ids() {
        let spawn = InstructionKind::Spawn {
            contract_id: "value".to_string(),
            args: vec![],
        };
        let invoke = InstructionKind::Invoke {
            contract_id: "coin".to_string(),
            command: "transfer".to_string(),
            args: vec![Argument {
                name: "coins".to_string(),
                value: 10u64.to_le_bytes().to_vec(),
            }],
        };
        let delete = InstructionKind::Delete {
            contract_id: "darc".to_string(),
        };

        assert_eq!(spawn.label(), "spawn");
        assert_eq!(invoke.label(), "invoke");
        assert_eq!(delete.label(), "delete");
        assert_eq!(invoke.contract_id(), "coin");
        assert_eq!(delete.contract_id(), "darc");
    }

    #[test]
    fn tx_result_roundtrips_with_bincode2() {
        let tx = TxResult {
            accepted: false,
            instructions: vec![Instruction {
                instance_id: instance(5),
                kind: InstructionKind::Invoke {
                    contract_id: "coin".to_string(),
                    command: "mint".to_string(),
                    args: vec![],
                },
            }],
        };

        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(&tx, cfg).expect("TxResult encode");
        let (decoded, _): (TxResult, usize) =
            bincode::serde::decode_from_slice(&bytes, cfg).expect("TxResult decode");

        assert_eq!(decoded, tx);
        assert!(!decoded.accepted);
        assert_eq!(decoded.instructions[0].instance_id, instance(5));
    }
}
