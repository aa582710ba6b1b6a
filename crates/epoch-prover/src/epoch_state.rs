//! Proving state of a whole epoch.
//!
//! Holds the partial results of the epoch's proof tree and blob accumulator chain. Block-root
//! proofs are leaves of an [`UnbalancedTreeStore`]; merges fill the internal nodes, and the two
//! children of the root feed the root rollup. An epoch of a single block has no merges: its
//! block root sits at the root location and is paired with a padding block root instead.
//!
//! Nothing in here proves anything. The surrounding pipeline queries readiness, assembles
//! inputs, runs the prover and feeds the outputs back through the setters.

use std::sync::Arc;

use rollup_primitives::{
    blob::{BatchedBlob, BlobAccumulator, FinalBlobBatchingChallenges},
    context::BlockProvingContext,
    proof::Proof,
    rollup::{
        BlockMergeRollupInputs, BlockRollupOutput, PaddingBlockRootRollupInputs,
        PreviousRollupBlockData, RootRollupInputs, RootRollupOutput, RootRollupPublicInputs,
    },
};
use rollup_unbalanced_tree::{TreeNodeLocation, UnbalancedTreeStore};
use tracing::*;

use crate::{
    block_state::BlockProvingState,
    errors::{EpochProvingError, EpochProvingResult},
    lifecycle::ProvingStateLifecycle,
    settlement::{ProvingResult, Settlement},
    tube_cache::TubeProofCache,
    vk_tree::VkTreeIndex,
};

/// Reason given to the settlement when proving is cancelled.
pub const CANCELLED_REASON: &str = "Proving cancelled";

/// Final artifacts of a proven epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochProofResult {
    pub proof: Proof,
    pub public_inputs: RootRollupPublicInputs,
    pub batched_blob_inputs: BatchedBlob,
}

pub struct EpochProvingState {
    epoch_number: u64,
    first_block_number: u64,
    total_num_blocks: usize,
    final_blob_batching_challenges: FinalBlobBatchingChallenges,
    lifecycle: ProvingStateLifecycle,

    /// Indexed by `block_number - first_block_number`.
    blocks: Vec<Option<BlockProvingState>>,

    block_root_or_merge_outputs: UnbalancedTreeStore<BlockRollupOutput>,
    padding_block_root_output: Option<BlockRollupOutput>,
    root_rollup_output: Option<RootRollupOutput>,
    final_batched_blob: Option<BatchedBlob>,

    cached_tube_proofs: TubeProofCache,
    vk_tree: Arc<dyn VkTreeIndex>,
    settlement: Settlement,
}

impl EpochProvingState {
    pub fn new(
        epoch_number: u64,
        first_block_number: u64,
        total_num_blocks: usize,
        final_blob_batching_challenges: FinalBlobBatchingChallenges,
        vk_tree: Arc<dyn VkTreeIndex>,
        settlement: Settlement,
    ) -> EpochProvingResult<Self> {
        if total_num_blocks == 0 {
            return Err(EpochProvingError::EmptyEpoch);
        }

        let mut blocks = Vec::with_capacity(total_num_blocks);
        blocks.resize_with(total_num_blocks, || None);

        Ok(Self {
            epoch_number,
            first_block_number,
            total_num_blocks,
            final_blob_batching_challenges,
            lifecycle: ProvingStateLifecycle::Created,
            blocks,
            block_root_or_merge_outputs: UnbalancedTreeStore::new(total_num_blocks)?,
            padding_block_root_output: None,
            root_rollup_output: None,
            final_batched_blob: None,
            cached_tube_proofs: TubeProofCache::new(),
            vk_tree,
            settlement,
        })
    }

    pub fn epoch_number(&self) -> u64 {
        self.epoch_number
    }

    pub fn first_block_number(&self) -> u64 {
        self.first_block_number
    }

    pub fn total_num_blocks(&self) -> usize {
        self.total_num_blocks
    }

    pub fn final_blob_batching_challenges(&self) -> &FinalBlobBatchingChallenges {
        &self.final_blob_batching_challenges
    }

    pub fn lifecycle(&self) -> ProvingStateLifecycle {
        self.lifecycle
    }

    /// Whether this epoch is still live. Work finishing after this turns false is discarded.
    pub fn verify_state(&self) -> bool {
        self.lifecycle.verify_state()
    }

    pub fn is_accepting_blocks(&self) -> bool {
        self.lifecycle.is_accepting_blocks()
    }

    pub fn cached_tube_proofs(&self) -> &TubeProofCache {
        &self.cached_tube_proofs
    }

    pub fn vk_tree(&self) -> &Arc<dyn VkTreeIndex> {
        &self.vk_tree
    }

    /// Slot of `block_number` within the epoch.
    pub fn block_index(&self, block_number: u64) -> EpochProvingResult<usize> {
        block_number
            .checked_sub(self.first_block_number)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < self.total_num_blocks)
            .ok_or(EpochProvingError::BlockOutOfRange {
                block_number,
                first_block_number: self.first_block_number,
                total_num_blocks: self.total_num_blocks,
            })
    }

    pub fn num_registered_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// Registers a block. Moves the epoch to `Full` once every slot is occupied.
    pub fn start_new_block(
        &mut self,
        context: BlockProvingContext,
    ) -> EpochProvingResult<&mut BlockProvingState> {
        if !self.is_accepting_blocks() {
            return Err(EpochProvingError::NotAcceptingBlocks(self.lifecycle));
        }

        let block_number = context.block_number();
        let index = self.block_index(block_number)?;
        if self.blocks[index].is_some() {
            return Err(EpochProvingError::BlockAlreadyRegistered(block_number));
        }

        let mut block = BlockProvingState::new(index, context);
        if index == 0 {
            block.set_start_blob_accumulator(BlobAccumulator::new_with_challenges(
                self.final_blob_batching_challenges,
            ));
        }

        if self.num_registered_blocks() + 1 == self.total_num_blocks {
            self.lifecycle.transition(ProvingStateLifecycle::Full)?;
            info!(epoch_number = %self.epoch_number, "all epoch blocks registered");
        }

        debug!(epoch_number = %self.epoch_number, %block_number, %index, "registered block");
        Ok(self.blocks[index].insert(block))
    }

    pub fn get_block_proving_state(&self, index: usize) -> Option<&BlockProvingState> {
        self.blocks.get(index).and_then(Option::as_ref)
    }

    pub fn get_block_proving_state_by_block_number(
        &self,
        block_number: u64,
    ) -> Option<&BlockProvingState> {
        let index = self.block_index(block_number).ok()?;
        self.get_block_proving_state(index)
    }

    pub fn get_block_proving_state_by_block_number_mut(
        &mut self,
        block_number: u64,
    ) -> EpochProvingResult<&mut BlockProvingState> {
        let index = self.block_index(block_number)?;
        self.blocks[index]
            .as_mut()
            .ok_or(EpochProvingError::UnknownBlock(block_number))
    }

    pub fn set_block_root_rollup_proof(
        &mut self,
        block_index: usize,
        output: BlockRollupOutput,
    ) -> EpochProvingResult<TreeNodeLocation> {
        Ok(self.block_root_or_merge_outputs.set_leaf(block_index, output)?)
    }

    pub fn set_block_merge_rollup_proof(
        &mut self,
        location: TreeNodeLocation,
        output: BlockRollupOutput,
    ) -> EpochProvingResult<()> {
        Ok(self.block_root_or_merge_outputs.set_node(location, output)?)
    }

    pub fn set_root_rollup_proof(&mut self, output: RootRollupOutput) {
        self.root_rollup_output = Some(output);
    }

    pub fn set_padding_block_root_proof(&mut self, output: BlockRollupOutput) {
        self.padding_block_root_output = Some(output);
    }

    pub fn set_final_batched_blob(&mut self, batched_blob: BatchedBlob) {
        self.final_batched_blob = Some(batched_blob);
    }

    /// Advances the blob accumulator chain over the contiguous prefix of finished blocks, up
    /// to and including `to_block` if given. Stops at the first block that is missing or not
    /// finished yet.
    pub async fn set_blob_accumulators(&mut self, to_block: Option<u64>) -> EpochProvingResult<()> {
        let end = match to_block {
            Some(block_number) => self.block_index(block_number)?,
            None => self.total_num_blocks - 1,
        };

        let mut previous: Option<BlobAccumulator> = None;
        for (i, slot) in self.blocks[..=end].iter_mut().enumerate() {
            let Some(block) = slot.as_mut().filter(|b| b.is_complete()) else {
                trace!(%i, "blob accumulation waiting on block");
                break;
            };

            if block.start_blob_accumulator().is_none() {
                let start = previous
                    .take()
                    .ok_or(EpochProvingError::MissingPreviousAccumulator(i))?;
                block.set_start_blob_accumulator(start);
            }

            if block.end_blob_accumulator().is_none() {
                block.accumulate_blobs().await?;
            }

            previous = block.end_blob_accumulator().cloned();
        }

        Ok(())
    }

    /// End accumulator of the last block, once the whole chain is accumulated.
    pub fn final_blob_accumulator(&self) -> Option<&BlobAccumulator> {
        self.blocks
            .last()
            .and_then(Option::as_ref)
            .and_then(BlockProvingState::end_blob_accumulator)
    }

    pub fn get_parent_location(
        &self,
        location: TreeNodeLocation,
    ) -> EpochProvingResult<TreeNodeLocation> {
        Ok(self.block_root_or_merge_outputs.get_parent_location(location)?)
    }

    pub fn get_block_merge_rollup_inputs(
        &self,
        location: TreeNodeLocation,
    ) -> EpochProvingResult<BlockMergeRollupInputs> {
        let (Some(left), Some(right)) = self.block_root_or_merge_outputs.get_children(location)
        else {
            return Err(EpochProvingError::ChildNotReady(location));
        };

        Ok(BlockMergeRollupInputs {
            previous_rollup_data: [
                self.get_previous_rollup_data(left)?,
                self.get_previous_rollup_data(right)?,
            ],
        })
    }

    pub fn get_root_rollup_inputs(&self) -> EpochProvingResult<RootRollupInputs> {
        let (Some(left), Some(right)) = self.get_child_proofs_for_root() else {
            return Err(EpochProvingError::ChildNotReady(TreeNodeLocation::ROOT));
        };

        Ok(RootRollupInputs {
            previous_rollup_data: [
                self.get_previous_rollup_data(left)?,
                self.get_previous_rollup_data(right)?,
            ],
        })
    }

    pub fn get_padding_block_root_inputs(
        &self,
    ) -> EpochProvingResult<PaddingBlockRootRollupInputs> {
        let block = self
            .get_block_proving_state(0)
            .filter(|b| b.is_complete())
            .ok_or(EpochProvingError::PaddingBlockNotReady)?;

        Ok(block.get_padding_block_root_inputs(self.vk_tree.vk_tree_root())?)
    }

    pub fn get_epoch_proof_result(&self) -> EpochProvingResult<EpochProofResult> {
        let (Some(root), Some(batched_blob)) = (&self.root_rollup_output, &self.final_batched_blob)
        else {
            return Err(EpochProvingError::RootRollupNotReady);
        };

        Ok(EpochProofResult {
            proof: root.proof.binary_proof().clone(),
            public_inputs: root.inputs.clone(),
            batched_blob_inputs: batched_blob.clone(),
        })
    }

    pub fn is_ready_for_block_merge(&self, location: TreeNodeLocation) -> bool {
        self.block_root_or_merge_outputs
            .get_sibling(location)
            .is_some()
    }

    pub fn is_ready_for_root_rollup(&self) -> bool {
        matches!(self.get_child_proofs_for_root(), (Some(_), Some(_)))
    }

    pub fn cancel(&mut self) {
        self.reject(CANCELLED_REASON.to_owned());
    }

    /// Rejects the epoch. Does nothing if it was already settled.
    pub fn reject(&mut self, reason: String) {
        if let Err(e) = self.lifecycle.transition(ProvingStateLifecycle::Rejected) {
            debug!(epoch_number = %self.epoch_number, %e, %reason, "ignoring rejection");
            return;
        }

        warn!(epoch_number = %self.epoch_number, %reason, "epoch proving rejected");
        self.settlement.reject(reason);
    }

    /// Resolves the epoch. Does nothing if it was already settled.
    pub fn resolve(&mut self, result: ProvingResult) {
        if let Err(e) = self.lifecycle.transition(ProvingStateLifecycle::Resolved) {
            debug!(epoch_number = %self.epoch_number, %e, "ignoring resolution");
            return;
        }

        info!(epoch_number = %self.epoch_number, ?result, "epoch proving resolved");
        self.settlement.complete(result);
    }

    /// The two proofs feeding the root rollup. A single-block epoch stores its block root at
    /// the root location and pairs it with the padding block root.
    fn get_child_proofs_for_root(
        &self,
    ) -> (Option<&BlockRollupOutput>, Option<&BlockRollupOutput>) {
        if self.total_num_blocks == 1 {
            (
                self.block_root_or_merge_outputs
                    .get_node(TreeNodeLocation::ROOT),
                self.padding_block_root_output.as_ref(),
            )
        } else {
            self.block_root_or_merge_outputs
                .get_children(TreeNodeLocation::ROOT)
        }
    }

    fn get_previous_rollup_data(
        &self,
        output: &BlockRollupOutput,
    ) -> EpochProvingResult<PreviousRollupBlockData> {
        let vk_data = self.vk_tree.vk_data(&output.verification_key)?;
        Ok(PreviousRollupBlockData::new(
            output.inputs.clone(),
            output.proof.clone(),
            vk_data,
        ))
    }
}

impl std::fmt::Debug for EpochProvingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochProvingState")
            .field("epoch_number", &self.epoch_number)
            .field("first_block_number", &self.first_block_number)
            .field("total_num_blocks", &self.total_num_blocks)
            .field("lifecycle", &self.lifecycle)
            .field("registered_blocks", &self.num_registered_blocks())
            .finish_non_exhaustive()
    }
}
