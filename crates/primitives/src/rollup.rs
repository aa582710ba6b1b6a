//! Inputs and public outputs of the epoch-level rollup circuits.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{
    block::{AppendOnlyTreeSnapshot, GlobalVariables, SiblingPath},
    buf::Buf32,
    proof::{PublicInputsAndRecursiveProof, RecursiveProof, VerificationKey},
};

/// Public inputs shared by block-root, padding block-root and block-merge proofs. A merge
/// spans the block range of both of its children.
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
pub struct BlockRootOrBlockMergePublicInputs {
    pub previous_archive: AppendOnlyTreeSnapshot,
    pub new_archive: AppendOnlyTreeSnapshot,
    pub start_block_number: u64,
    pub end_block_number: u64,
    pub out_hash: Buf32,
    pub prover_id: Buf32,
    pub vk_tree_root: Buf32,
}

/// Public inputs of the root rollup, the proof settled for the whole epoch.
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
pub struct RootRollupPublicInputs {
    pub previous_archive: AppendOnlyTreeSnapshot,
    pub end_archive: AppendOnlyTreeSnapshot,
    pub end_block_number: u64,
    pub out_hash: Buf32,
    pub prover_id: Buf32,
    pub vk_tree_root: Buf32,
}

/// A verification key together with its membership witness in the verification-key tree.
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
pub struct VkData {
    pub vk: VerificationKey,
    pub leaf_index: u64,
    pub sibling_path: SiblingPath,
}

impl VkData {
    pub fn new(vk: VerificationKey, leaf_index: u64, sibling_path: SiblingPath) -> Self {
        Self {
            vk,
            leaf_index,
            sibling_path,
        }
    }
}

/// A child proof as consumed by a block-merge or root rollup.
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
pub struct PreviousRollupBlockData {
    pub public_inputs: BlockRootOrBlockMergePublicInputs,
    pub proof: RecursiveProof,
    pub vk_data: VkData,
}

impl PreviousRollupBlockData {
    pub fn new(
        public_inputs: BlockRootOrBlockMergePublicInputs,
        proof: RecursiveProof,
        vk_data: VkData,
    ) -> Self {
        Self {
            public_inputs,
            proof,
            vk_data,
        }
    }
}

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
pub struct BlockMergeRollupInputs {
    pub previous_rollup_data: [PreviousRollupBlockData; 2],
}

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
pub struct RootRollupInputs {
    pub previous_rollup_data: [PreviousRollupBlockData; 2],
}

/// Inputs to the empty block-root circuit used to pad single-block epochs, so the root rollup
/// always has two children.
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
pub struct PaddingBlockRootRollupInputs {
    /// Archive after the padded block; the padding block starts and ends here.
    pub archive: AppendOnlyTreeSnapshot,
    pub global_variables: GlobalVariables,
    pub l1_to_l2_message_tree: AppendOnlyTreeSnapshot,
    pub vk_tree_root: Buf32,
    pub prover_id: Buf32,
    pub is_padding: bool,
}

/// Output of a block-root, padding block-root or block-merge proof.
pub type BlockRollupOutput = PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>;

/// Output of the root rollup proof.
pub type RootRollupOutput = PublicInputsAndRecursiveProof<RootRollupPublicInputs>;
