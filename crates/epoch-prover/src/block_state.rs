use rollup_primitives::{
    blob::BlobAccumulator,
    block::{GlobalVariables, L2Block},
    buf::Buf32,
    context::BlockProvingContext,
    rollup::{BlockRollupOutput, PaddingBlockRootRollupInputs},
};
use tracing::*;

use crate::errors::BlockProvingError;

/// Proving state of a single block within an epoch.
#[derive(Debug, Clone)]
pub struct BlockProvingState {
    /// Slot of the block within its epoch.
    index: usize,
    context: BlockProvingContext,
    block: Option<L2Block>,
    start_blob_accumulator: Option<BlobAccumulator>,
    end_blob_accumulator: Option<BlobAccumulator>,
    block_root_rollup_output: Option<BlockRollupOutput>,
}

impl BlockProvingState {
    pub fn new(index: usize, context: BlockProvingContext) -> Self {
        Self {
            index,
            context,
            block: None,
            start_blob_accumulator: None,
            end_blob_accumulator: None,
            block_root_rollup_output: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn block_number(&self) -> u64 {
        self.context.block_number()
    }

    pub fn global_variables(&self) -> &GlobalVariables {
        &self.context.global_variables
    }

    pub fn context(&self) -> &BlockProvingContext {
        &self.context
    }

    pub fn set_block(&mut self, block: L2Block) -> Result<(), BlockProvingError> {
        let expected = self.block_number();
        if block.number() != expected {
            return Err(BlockProvingError::BlockNumberMismatch {
                expected,
                got: block.number(),
            });
        }
        if self.block.is_some() {
            return Err(BlockProvingError::BlockAlreadySet(expected));
        }

        self.block = Some(block);
        Ok(())
    }

    pub fn block(&self) -> Option<&L2Block> {
        self.block.as_ref()
    }

    /// A block is complete once all of its txs have been processed into a finished block.
    pub fn is_complete(&self) -> bool {
        self.block.is_some()
    }

    pub fn start_blob_accumulator(&self) -> Option<&BlobAccumulator> {
        self.start_blob_accumulator.as_ref()
    }

    pub fn end_blob_accumulator(&self) -> Option<&BlobAccumulator> {
        self.end_blob_accumulator.as_ref()
    }

    pub fn set_start_blob_accumulator(&mut self, acc: BlobAccumulator) {
        self.start_blob_accumulator = Some(acc);
    }

    /// Absorbs this block's blob fields into the start accumulator, producing the end
    /// accumulator. Does nothing if the end accumulator is already set.
    pub async fn accumulate_blobs(&mut self) -> Result<(), BlockProvingError> {
        if self.end_blob_accumulator.is_some() {
            return Ok(());
        }

        let block_number = self.block_number();
        let block = self
            .block
            .as_ref()
            .ok_or(BlockProvingError::MissingBlock(block_number))?;
        let start = self
            .start_blob_accumulator
            .clone()
            .ok_or(BlockProvingError::MissingStartAccumulator(block_number))?;

        let blob_fields = block.blob_fields();
        let num_fields = blob_fields.len();
        let end = tokio::task::spawn_blocking(move || start.accumulate_blobs(&blob_fields))
            .await
            .map_err(|e| BlockProvingError::AccumulationAborted(e.to_string()))??;

        debug!(%block_number, %num_fields, num_blobs = end.num_blobs(), "accumulated block blobs");
        self.end_blob_accumulator = Some(end);
        Ok(())
    }

    pub fn set_block_root_rollup_proof(&mut self, output: BlockRollupOutput) {
        self.block_root_rollup_output = Some(output);
    }

    pub fn block_root_rollup_output(&self) -> Option<&BlockRollupOutput> {
        self.block_root_rollup_output.as_ref()
    }

    /// Inputs for the empty block root that pads an epoch made of only this block.
    pub fn get_padding_block_root_inputs(
        &self,
        vk_tree_root: Buf32,
    ) -> Result<PaddingBlockRootRollupInputs, BlockProvingError> {
        let block = self
            .block
            .as_ref()
            .ok_or(BlockProvingError::MissingBlock(self.block_number()))?;

        Ok(PaddingBlockRootRollupInputs {
            archive: block.archive,
            global_variables: self.context.global_variables.clone(),
            l1_to_l2_message_tree: self.context.l1_to_l2_message_tree_after,
            vk_tree_root,
            prover_id: self.context.prover_id,
            is_padding: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use rollup_primitives::blob::FinalBlobBatchingChallenges;
    use rollup_test_utils::epoch::{block_context, final_challenges, l2_block};

    use super::*;

    #[test]
    fn test_set_block_checks_number() {
        let mut state = BlockProvingState::new(0, block_context(5));
        let err = state.set_block(l2_block(6, 1)).unwrap_err();
        assert!(matches!(
            err,
            BlockProvingError::BlockNumberMismatch {
                expected: 5,
                got: 6
            }
        ));
        assert!(!state.is_complete());

        state.set_block(l2_block(5, 1)).unwrap();
        assert!(state.is_complete());
        assert!(matches!(
            state.set_block(l2_block(5, 1)),
            Err(BlockProvingError::BlockAlreadySet(5))
        ));
    }

    #[tokio::test]
    async fn test_accumulate_blobs_needs_block_and_start() {
        let mut state = BlockProvingState::new(0, block_context(1));
        assert!(matches!(
            state.accumulate_blobs().await,
            Err(BlockProvingError::MissingBlock(1))
        ));

        state.set_block(l2_block(1, 2)).unwrap();
        assert!(matches!(
            state.accumulate_blobs().await,
            Err(BlockProvingError::MissingStartAccumulator(1))
        ));

        let challenges: FinalBlobBatchingChallenges = final_challenges();
        let start = BlobAccumulator::new_with_challenges(challenges);
        state.set_start_blob_accumulator(start.clone());
        state.accumulate_blobs().await.unwrap();

        let block = state.block().unwrap();
        let expected = start.accumulate_blobs(&block.blob_fields()).unwrap();
        assert_eq!(state.end_blob_accumulator(), Some(&expected));
    }

    #[test]
    fn test_padding_inputs() {
        let mut state = BlockProvingState::new(0, block_context(3));
        assert!(state.get_padding_block_root_inputs(Buf32::zero()).is_err());

        let block = l2_block(3, 1);
        state.set_block(block.clone()).unwrap();
        let inputs = state
            .get_padding_block_root_inputs(Buf32::from_u64(9))
            .unwrap();
        assert!(inputs.is_padding);
        assert_eq!(inputs.archive, block.archive);
        assert_eq!(inputs.vk_tree_root, Buf32::from_u64(9));
        assert_eq!(inputs.prover_id, state.context().prover_id);
        assert_eq!(inputs.global_variables.block_number, 3);
    }
}
