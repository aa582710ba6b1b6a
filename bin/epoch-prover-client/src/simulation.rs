//! Synthetic epoch fed through the orchestrator with the native prover.

use std::sync::Arc;

use anyhow::Context;
use futures::future::try_join_all;
use rollup_config::SimulationConfig;
use rollup_epoch_prover::{EpochOrchestrator, EpochProofResult, EpochProver, NativeEpochProver};
use rollup_primitives::{
    blob::FinalBlobBatchingChallenges,
    block::{
        AppendOnlyTreeSnapshot, BlockBody, BlockHeader, GlobalVariables, L2Block, Tx, TxEffect,
        TxHash, ARCHIVE_HEIGHT, L1_TO_L2_MSG_SUBTREE_SIBLING_PATH_LENGTH,
    },
    buf::Buf32,
    context::BlockProvingContext,
    hash,
    proof::Proof,
};
use tracing::*;

/// Number of L1-to-L2 messages inserted per block.
const MSGS_PER_BLOCK: u64 = 16;

pub struct SimulatedBlock {
    pub context: BlockProvingContext,
    pub txs: Vec<Tx>,
    pub block: L2Block,
}

pub struct SimulatedEpoch {
    pub epoch_number: u64,
    pub first_block_number: u64,
    pub challenges: FinalBlobBatchingChallenges,
    pub blocks: Vec<SimulatedBlock>,
}

fn derive(tag: &str, n: u64) -> Buf32 {
    hash::hash_pair(&hash::raw(tag.as_bytes()), &Buf32::from_u64(n))
}

fn archive_after(block_number: u64) -> AppendOnlyTreeSnapshot {
    AppendOnlyTreeSnapshot::new(derive("archive", block_number), block_number + 1)
}

fn message_tree_after(block_number: u64) -> AppendOnlyTreeSnapshot {
    AppendOnlyTreeSnapshot::new(
        derive("l1-to-l2", block_number),
        (block_number + 1) * MSGS_PER_BLOCK,
    )
}

fn global_variables(block_number: u64) -> GlobalVariables {
    GlobalVariables {
        chain_id: 1,
        version: 1,
        block_number,
        slot_number: block_number,
        timestamp: block_number * 12,
        ..Default::default()
    }
}

/// Builds an epoch of chained blocks: each block starts from the archive the previous ended at.
pub fn build_epoch(sim: &SimulationConfig, prover_id: Buf32) -> SimulatedEpoch {
    let first = sim.first_block_number;
    let blocks = (first..first + sim.num_blocks)
        .map(|block_number| {
            let prev = block_number.saturating_sub(1);
            let txs: Vec<Tx> = (0..sim.txs_per_block as u64)
                .map(|i| {
                    let seed = block_number << 32 | i;
                    Tx {
                        hash: TxHash(derive("tx", seed)),
                        client_proof: Proof::new(derive("client-proof", seed).as_slice().to_vec()),
                    }
                })
                .collect();

            let tx_effects = txs
                .iter()
                .map(|tx| TxEffect {
                    tx_hash: tx.hash,
                    blob_fields: vec![tx.hash.0, hash::raw(tx.client_proof.as_bytes())],
                })
                .collect();

            let context = BlockProvingContext {
                global_variables: global_variables(block_number),
                l1_to_l2_messages: (0..MSGS_PER_BLOCK)
                    .map(|i| derive("msg", block_number * MSGS_PER_BLOCK + i))
                    .collect(),
                l1_to_l2_message_tree_before: message_tree_after(prev),
                l1_to_l2_message_tree_after: message_tree_after(block_number),
                l1_to_l2_message_subtree_sibling_path: vec![
                    Buf32::zero();
                    L1_TO_L2_MSG_SUBTREE_SIBLING_PATH_LENGTH
                ],
                last_archive: archive_after(prev),
                last_archive_sibling_path: vec![Buf32::zero(); ARCHIVE_HEIGHT],
                new_archive_sibling_path: vec![Buf32::zero(); ARCHIVE_HEIGHT],
                previous_block_header: BlockHeader {
                    last_archive: archive_after(prev.saturating_sub(1)),
                    global_variables: global_variables(prev),
                    out_hash: derive("out", prev),
                    l1_to_l2_message_tree: message_tree_after(prev),
                },
                prover_id,
            };

            let block = L2Block {
                archive: archive_after(block_number),
                header: BlockHeader {
                    last_archive: archive_after(prev),
                    global_variables: global_variables(block_number),
                    out_hash: derive("out", block_number),
                    l1_to_l2_message_tree: message_tree_after(block_number),
                },
                body: BlockBody { tx_effects },
            };

            SimulatedBlock {
                context,
                txs,
                block,
            }
        })
        .collect();

    SimulatedEpoch {
        epoch_number: sim.epoch_number,
        first_block_number: first,
        challenges: FinalBlobBatchingChallenges::new(
            derive("z", sim.epoch_number),
            derive("gamma", sim.epoch_number),
        ),
        blocks,
    }
}

/// Drives a simulated epoch through the orchestrator and returns its final proof.
pub async fn run_epoch(
    orchestrator: &EpochOrchestrator<NativeEpochProver>,
    prover: &Arc<NativeEpochProver>,
    epoch: SimulatedEpoch,
) -> anyhow::Result<EpochProofResult> {
    let handle = orchestrator
        .start_new_epoch(
            epoch.epoch_number,
            epoch.first_block_number,
            epoch.blocks.len(),
            epoch.challenges,
        )
        .await?;

    for sim in &epoch.blocks {
        orchestrator.start_new_block(sim.context.clone()).await?;
        orchestrator.start_tube_circuits(sim.txs.clone()).await?;
    }

    let kickoff = orchestrator.config().kickoff_tube_proofs;
    for sim in epoch.blocks {
        let block_number = sim.block.number();

        // Tube proofs gate tx processing; the block is only finished once they are in.
        let tube_proofs = try_join_all(sim.txs.iter().map(|tx| {
            let tx = tx.clone();
            async move {
                if kickoff {
                    orchestrator.get_tube_proof(&tx.hash).await.map_err(anyhow::Error::from)
                } else {
                    prover.prove_tube(tx).await.map_err(anyhow::Error::from)
                }
            }
        }))
        .await
        .with_context(|| format!("tube proofs for block {block_number}"))?;
        debug!(%block_number, num_tube_proofs = tube_proofs.len(), "tube proofs ready");

        let block_root = prover.prove_block_root(&sim.context, &sim.block)?;
        orchestrator
            .set_block_completed(block_number, sim.block)
            .await?;
        orchestrator
            .set_block_root_rollup_proof(block_number, block_root)
            .await?;
    }

    Ok(orchestrator.finalize_epoch(handle).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_chain() {
        let sim = SimulationConfig {
            num_blocks: 4,
            ..Default::default()
        };
        let epoch = build_epoch(&sim, Buf32::zero());
        assert_eq!(epoch.blocks.len(), 4);
        for pair in epoch.blocks.windows(2) {
            assert_eq!(pair[0].block.archive, pair[1].context.last_archive);
            assert_eq!(pair[0].block.number() + 1, pair[1].block.number());
        }
    }
}
