use rollup_primitives::{blob::BlobError, block::TxHash, buf::Buf32};
use rollup_unbalanced_tree::{TreeError, TreeNodeLocation};
use thiserror::Error;

use crate::lifecycle::ProvingStateLifecycle;

pub type EpochProvingResult<T> = Result<T, EpochProvingError>;

#[derive(Debug, Error)]
pub enum EpochProvingError {
    #[error("epoch must span at least one block")]
    EmptyEpoch,

    #[error(
        "block {block_number} is outside the epoch \
         (first block {first_block_number}, {total_num_blocks} blocks)"
    )]
    BlockOutOfRange {
        block_number: u64,
        first_block_number: u64,
        total_num_blocks: usize,
    },

    #[error("block {0} is already registered")]
    BlockAlreadyRegistered(u64),

    #[error("epoch is not accepting blocks in state {0}")]
    NotAcceptingBlocks(ProvingStateLifecycle),

    #[error("invalid lifecycle transition from {0} to {1}")]
    InvalidTransition(ProvingStateLifecycle, ProvingStateLifecycle),

    #[error("no block registered for block number {0}")]
    UnknownBlock(u64),

    #[error("at least one child of {0} is not ready")]
    ChildNotReady(TreeNodeLocation),

    #[error("epoch needs one completed block in order to be padded")]
    PaddingBlockNotReady,

    #[error("root rollup proof or final batched blob not set")]
    RootRollupNotReady,

    #[error("block at index {0} has no previous blob accumulator")]
    MissingPreviousAccumulator(usize),

    #[error("proof tree: {0}")]
    Tree(#[from] TreeError),

    #[error("vk tree: {0}")]
    VkTree(#[from] VkTreeError),

    #[error("block: {0}")]
    Block(#[from] BlockProvingError),

    #[error("blob: {0}")]
    Blob(#[from] BlobError),
}

#[derive(Debug, Error)]
pub enum BlockProvingError {
    #[error("expected block {expected}, got block {got}")]
    BlockNumberMismatch { expected: u64, got: u64 },

    #[error("block {0} was already set")]
    BlockAlreadySet(u64),

    #[error("block {0} is not complete")]
    MissingBlock(u64),

    #[error("block {0} has no start blob accumulator")]
    MissingStartAccumulator(u64),

    #[error("blob accumulation aborted: {0}")]
    AccumulationAborted(String),

    #[error("blob: {0}")]
    Blob(#[from] BlobError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VkTreeError {
    #[error("verification key {0} is not in the vk tree")]
    UnknownVerificationKey(Buf32),

    #[error("leaf index {index} out of range for a vk tree of {num_leaves} leaves")]
    LeafIndexOutOfRange { index: u64, num_leaves: usize },
}

/// Errors surfaced by an [`EpochProver`](crate::prover::EpochProver).
///
/// Cloneable so a single failed tube proof can be observed by every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProverError {
    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("invalid prover input: {0}")]
    InvalidInput(String),

    #[error("prover job was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no epoch is being proven")]
    NoActiveEpoch,

    #[error("no tube proof started for tx {0}")]
    UnknownTx(TxHash),

    #[error("epoch proving rejected: {0}")]
    Rejected(String),

    #[error("epoch proving failed: {0}")]
    Failed(String),

    #[error("blob accumulation incomplete for epoch {0}")]
    IncompleteBlobAccumulation(u64),

    #[error("epoch: {0}")]
    Epoch(#[from] EpochProvingError),

    #[error("prover: {0}")]
    Prover(#[from] ProverError),
}
