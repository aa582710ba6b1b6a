//! Interface to whatever actually generates the epoch-level proofs.

use async_trait::async_trait;
use rollup_primitives::{
    block::Tx,
    proof::ProofAndVerificationKey,
    rollup::{
        BlockMergeRollupInputs, BlockRollupOutput, PaddingBlockRootRollupInputs,
        RootRollupInputs, RootRollupOutput,
    },
};

use crate::errors::ProverError;

/// Proof generation backend used by the [`EpochOrchestrator`](crate::EpochOrchestrator).
///
/// Every call is independent and may run concurrently with the others.
#[async_trait]
pub trait EpochProver: Send + Sync + 'static {
    /// Merges two adjacent block-root or block-merge proofs.
    async fn prove_block_merge_rollup(
        &self,
        inputs: BlockMergeRollupInputs,
    ) -> Result<BlockRollupOutput, ProverError>;

    /// Proves the empty block root that pairs with the only block of a single-block epoch.
    async fn prove_padding_block_root_rollup(
        &self,
        inputs: PaddingBlockRootRollupInputs,
    ) -> Result<BlockRollupOutput, ProverError>;

    async fn prove_root_rollup(
        &self,
        inputs: RootRollupInputs,
    ) -> Result<RootRollupOutput, ProverError>;

    /// Wraps a tx's client proof so the rollup circuits can verify it.
    async fn prove_tube(&self, tx: Tx) -> Result<ProofAndVerificationKey, ProverError>;
}
