//! Deterministic fixtures for epoch proving tests.
//!
//! Blocks chain by archive: the context of block `n` starts from [`archive_after`]`(n - 1)` and
//! block `n` ends at [`archive_after`]`(n)`.

use rollup_primitives::{
    blob::FinalBlobBatchingChallenges,
    block::{
        AppendOnlyTreeSnapshot, BlockBody, BlockHeader, GlobalVariables, L2Block, Tx, TxEffect,
        TxHash, ARCHIVE_HEIGHT, L1_TO_L2_MSG_SUBTREE_SIBLING_PATH_LENGTH,
    },
    buf::Buf32,
    context::BlockProvingContext,
    hash,
    proof::{Proof, RecursiveProof, VerificationKey},
    rollup::{BlockRollupOutput, BlockRootOrBlockMergePublicInputs},
};

use crate::ArbitraryGenerator;

pub const CHAIN_ID: u64 = 31337;
pub const PROVER_ID: u64 = 0xabc;

fn tagged(tag: &str, n: u64) -> Buf32 {
    hash::hash_pair(&hash::raw(tag.as_bytes()), &Buf32::from_u64(n))
}

/// Archive snapshot after inserting block `n`.
pub fn archive_after(n: u64) -> AppendOnlyTreeSnapshot {
    AppendOnlyTreeSnapshot::new(tagged("archive", n), n + 1)
}

pub fn global_variables(block_number: u64) -> GlobalVariables {
    GlobalVariables {
        chain_id: CHAIN_ID,
        version: 1,
        block_number,
        slot_number: block_number * 2,
        timestamp: 1_700_000_000 + block_number * 12,
        ..Default::default()
    }
}

pub fn block_context(block_number: u64) -> BlockProvingContext {
    let messages_before = block_number.saturating_sub(1) * 16;
    BlockProvingContext {
        global_variables: global_variables(block_number),
        l1_to_l2_messages: vec![tagged("msg", block_number)],
        l1_to_l2_message_tree_before: AppendOnlyTreeSnapshot::new(
            tagged("msgtree", block_number.saturating_sub(1)),
            messages_before,
        ),
        l1_to_l2_message_tree_after: AppendOnlyTreeSnapshot::new(
            tagged("msgtree", block_number),
            messages_before + 16,
        ),
        l1_to_l2_message_subtree_sibling_path: vec![
            Buf32::zero();
            L1_TO_L2_MSG_SUBTREE_SIBLING_PATH_LENGTH
        ],
        last_archive: archive_after(block_number.saturating_sub(1)),
        last_archive_sibling_path: vec![Buf32::zero(); ARCHIVE_HEIGHT],
        new_archive_sibling_path: vec![Buf32::zero(); ARCHIVE_HEIGHT],
        previous_block_header: BlockHeader {
            last_archive: archive_after(block_number.saturating_sub(2)),
            global_variables: global_variables(block_number.saturating_sub(1)),
            ..Default::default()
        },
        prover_id: Buf32::from_u64(PROVER_ID),
    }
}

/// A context with arbitrary contents, pinned to `block_number`.
pub fn arbitrary_block_context(gen: &ArbitraryGenerator, block_number: u64) -> BlockProvingContext {
    let mut ctx: BlockProvingContext = gen.generate();
    ctx.global_variables.block_number = block_number;
    ctx
}

pub fn tx(n: u64) -> Tx {
    Tx {
        hash: TxHash(tagged("tx", n)),
        client_proof: Proof::new(tagged("client-proof", n).as_slice().to_vec()),
    }
}

/// A finished block with `num_txs` txs, each publishing a couple of blob fields.
pub fn l2_block(block_number: u64, num_txs: usize) -> L2Block {
    let tx_effects = (0..num_txs as u64)
        .map(|i| {
            let n = block_number * 1_000 + i;
            TxEffect {
                tx_hash: tx(n).hash,
                blob_fields: vec![tagged("blob-a", n), tagged("blob-b", n)],
            }
        })
        .collect();

    L2Block {
        archive: archive_after(block_number),
        header: BlockHeader {
            last_archive: archive_after(block_number.saturating_sub(1)),
            global_variables: global_variables(block_number),
            out_hash: tagged("out", block_number),
            l1_to_l2_message_tree: block_context(block_number).l1_to_l2_message_tree_after,
        },
        body: BlockBody { tx_effects },
    }
}

pub fn final_challenges() -> FinalBlobBatchingChallenges {
    FinalBlobBatchingChallenges::new(tagged("z", 0), tagged("gamma", 0))
}

/// Stand-in verification keys, one per proof kind the epoch tree holds.
pub fn block_root_vk() -> VerificationKey {
    VerificationKey::new(vec![tagged("vk", 1)])
}

pub fn block_merge_vk() -> VerificationKey {
    VerificationKey::new(vec![tagged("vk", 2)])
}

pub fn padding_block_root_vk() -> VerificationKey {
    VerificationKey::new(vec![tagged("vk", 3)])
}

pub fn circuit_vks() -> Vec<VerificationKey> {
    vec![block_root_vk(), block_merge_vk(), padding_block_root_vk()]
}

fn stub_output(
    start: u64,
    end: u64,
    vk: VerificationKey,
    tag: &str,
) -> BlockRollupOutput {
    let inputs = BlockRootOrBlockMergePublicInputs {
        previous_archive: archive_after(start.saturating_sub(1)),
        new_archive: archive_after(end),
        start_block_number: start,
        end_block_number: end,
        out_hash: tagged("out", end),
        prover_id: Buf32::from_u64(PROVER_ID),
        vk_tree_root: Buf32::zero(),
    };
    let proof = RecursiveProof::new(
        vec![tagged(tag, start), tagged(tag, end)],
        Proof::new(tagged(tag, start * 1_000 + end).as_slice().to_vec()),
    );
    BlockRollupOutput::new(inputs, proof, vk)
}

/// Block-root output for a single block, not an actual proof.
pub fn block_root_output(block_number: u64) -> BlockRollupOutput {
    stub_output(block_number, block_number, block_root_vk(), "block-root")
}

/// Block-merge output spanning `start..=end`.
pub fn block_merge_output(start: u64, end: u64) -> BlockRollupOutput {
    stub_output(start, end, block_merge_vk(), "block-merge")
}

pub fn padding_block_root_output(block_number: u64) -> BlockRollupOutput {
    stub_output(block_number, block_number, padding_block_root_vk(), "padding")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_chain_by_archive() {
        for n in 1..5 {
            assert_eq!(block_context(n + 1).last_archive, l2_block(n, 1).archive);
            assert_eq!(l2_block(n, 1).number(), n);
        }
    }

    #[test]
    fn test_arbitrary_context_is_pinned() {
        let gen = ArbitraryGenerator::new();
        let ctx = arbitrary_block_context(&gen, 42);
        assert_eq!(ctx.block_number(), 42);
    }
}
