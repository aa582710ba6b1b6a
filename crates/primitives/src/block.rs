//! Block-level types: headers, snapshots and the finished block object.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{
    buf::{Buf20, Buf32},
    hash,
    proof::Proof,
};

/// Height of the archive tree, which holds one leaf per block header.
pub const ARCHIVE_HEIGHT: usize = 29;

/// Length of the sibling path of the L1-to-L2 message subtree inserted per block.
pub const L1_TO_L2_MSG_SUBTREE_SIBLING_PATH_LENGTH: usize = 35;

/// A sibling path from a leaf or subtree up to some tree root.
pub type SiblingPath = Vec<Buf32>;

/// Snapshot of an append-only tree: its root and where the next leaf goes.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct AppendOnlyTreeSnapshot {
    pub root: Buf32,
    pub next_available_leaf_index: u64,
}

impl AppendOnlyTreeSnapshot {
    pub fn new(root: Buf32, next_available_leaf_index: u64) -> Self {
        Self {
            root,
            next_available_leaf_index,
        }
    }
}

/// Values that are constant for every transaction in a block.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct GlobalVariables {
    pub chain_id: u64,
    pub version: u64,
    pub block_number: u64,
    pub slot_number: u64,
    pub timestamp: u64,
    pub coinbase: Buf20,
    pub fee_recipient: Buf32,
}

#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct BlockHeader {
    pub last_archive: AppendOnlyTreeSnapshot,
    pub global_variables: GlobalVariables,
    pub out_hash: Buf32,
    pub l1_to_l2_message_tree: AppendOnlyTreeSnapshot,
}

impl BlockHeader {
    pub fn block_number(&self) -> u64 {
        self.global_variables.block_number
    }

    pub fn hash(&self) -> Buf32 {
        hash::compute_borsh_hash(self)
    }
}

/// Identifier of a transaction.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct TxHash(pub Buf32);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A transaction as submitted by a user, carrying the client-side proof that its tube proof
/// wraps.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct Tx {
    pub hash: TxHash,
    pub client_proof: Proof,
}

/// Side effects of a processed transaction that end up published in blobs.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct TxEffect {
    pub tx_hash: TxHash,
    pub blob_fields: Vec<Buf32>,
}

#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct BlockBody {
    pub tx_effects: Vec<TxEffect>,
}

/// A fully built block: its header, body and the archive snapshot after inserting it.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct L2Block {
    pub archive: AppendOnlyTreeSnapshot,
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl L2Block {
    pub fn number(&self) -> u64 {
        self.header.block_number()
    }

    /// All blob fields of the block, in transaction order.
    pub fn blob_fields(&self) -> Vec<Buf32> {
        self.body
            .tx_effects
            .iter()
            .flat_map(|effect| effect.blob_fields.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_fields_in_tx_order() {
        let block = L2Block {
            body: BlockBody {
                tx_effects: vec![
                    TxEffect {
                        tx_hash: TxHash(Buf32::from_u64(1)),
                        blob_fields: vec![Buf32::from_u64(10), Buf32::from_u64(11)],
                    },
                    TxEffect {
                        tx_hash: TxHash(Buf32::from_u64(2)),
                        blob_fields: vec![Buf32::from_u64(20)],
                    },
                ],
            },
            ..Default::default()
        };

        assert_eq!(
            block.blob_fields(),
            vec![
                Buf32::from_u64(10),
                Buf32::from_u64(11),
                Buf32::from_u64(20)
            ]
        );
    }
}
