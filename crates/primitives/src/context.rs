//! Per-block data known when a block starts being proven.

use arbitrary::Arbitrary;
use serde::{Deserialize, Serialize};

use crate::{
    block::{AppendOnlyTreeSnapshot, BlockHeader, GlobalVariables, SiblingPath},
    buf::Buf32,
};

/// Everything the orchestrator needs to register a block, before any of its txs are proven.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Arbitrary)]
pub struct BlockProvingContext {
    pub global_variables: GlobalVariables,
    pub l1_to_l2_messages: Vec<Buf32>,
    /// L1-to-L2 message tree before this block's messages are inserted.
    pub l1_to_l2_message_tree_before: AppendOnlyTreeSnapshot,
    /// L1-to-L2 message tree after insertion.
    pub l1_to_l2_message_tree_after: AppendOnlyTreeSnapshot,
    pub l1_to_l2_message_subtree_sibling_path: SiblingPath,
    pub last_archive: AppendOnlyTreeSnapshot,
    pub last_archive_sibling_path: SiblingPath,
    pub new_archive_sibling_path: SiblingPath,
    pub previous_block_header: BlockHeader,
    pub prover_id: Buf32,
}

impl BlockProvingContext {
    pub fn block_number(&self) -> u64 {
        self.global_variables.block_number
    }
}
