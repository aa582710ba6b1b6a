//! Deterministic in-process prover.
//!
//! Does no real proving. Public inputs are composed the way the rollup circuits compose them,
//! and proofs are hashes of those public inputs bound to the circuit's verification key. Useful
//! for simulating an epoch end to end and for tests.

use std::time::Duration;

use async_trait::async_trait;
use rollup_primitives::{
    block::{L2Block, Tx},
    buf::Buf32,
    context::BlockProvingContext,
    hash,
    proof::{Proof, ProofAndVerificationKey, RecursiveProof, VerificationKey},
    rollup::{
        BlockMergeRollupInputs, BlockRollupOutput, BlockRootOrBlockMergePublicInputs,
        PaddingBlockRootRollupInputs, PreviousRollupBlockData, RootRollupInputs,
        RootRollupOutput, RootRollupPublicInputs,
    },
};
use tracing::*;

use crate::{
    errors::ProverError,
    prover::EpochProver,
    vk_tree::{StaticVkTree, VkTreeIndex},
};

/// Circuits the native prover knows the verification keys of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollupCircuit {
    BlockRoot,
    PaddingBlockRoot,
    BlockMerge,
    Root,
    Tube,
}

impl RollupCircuit {
    pub const ALL: [RollupCircuit; 5] = [
        RollupCircuit::BlockRoot,
        RollupCircuit::PaddingBlockRoot,
        RollupCircuit::BlockMerge,
        RollupCircuit::Root,
        RollupCircuit::Tube,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RollupCircuit::BlockRoot => "block-root",
            RollupCircuit::PaddingBlockRoot => "padding-block-root",
            RollupCircuit::BlockMerge => "block-merge",
            RollupCircuit::Root => "root",
            RollupCircuit::Tube => "tube",
        }
    }

    /// Well-known verification key of the circuit.
    pub fn verification_key(&self) -> VerificationKey {
        let seed = hash::raw(self.name().as_bytes());
        VerificationKey::new(vec![seed, hash::hash_pair(&seed, &seed)])
    }
}

#[derive(Debug, Clone)]
pub struct NativeEpochProver {
    vk_tree: StaticVkTree,
    delay: Option<Duration>,
}

impl Default for NativeEpochProver {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEpochProver {
    pub fn new() -> Self {
        let vks: Vec<_> = RollupCircuit::ALL
            .iter()
            .map(RollupCircuit::verification_key)
            .collect();
        Self {
            vk_tree: StaticVkTree::new(&vks),
            delay: None,
        }
    }

    /// Makes every proof take at least `delay`, to simulate proving time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Tree over the keys of every circuit this prover emits proofs for.
    pub fn vk_tree(&self) -> StaticVkTree {
        self.vk_tree.clone()
    }

    /// Produces the block-root proof of a finished block.
    pub fn prove_block_root(
        &self,
        context: &BlockProvingContext,
        block: &L2Block,
    ) -> Result<BlockRollupOutput, ProverError> {
        if block.number() != context.block_number() {
            return Err(ProverError::InvalidInput(format!(
                "block {} does not match context for block {}",
                block.number(),
                context.block_number()
            )));
        }

        let inputs = BlockRootOrBlockMergePublicInputs {
            previous_archive: context.last_archive,
            new_archive: block.archive,
            start_block_number: block.number(),
            end_block_number: block.number(),
            out_hash: block.header.out_hash,
            prover_id: context.prover_id,
            vk_tree_root: self.vk_tree.vk_tree_root(),
        };
        Ok(make_output(RollupCircuit::BlockRoot, inputs))
    }

    async fn simulate_work(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Checks a child proof was produced by a known circuit under the expected key.
    fn check_child(&self, child: &PreviousRollupBlockData) -> Result<(), ProverError> {
        let expected = self
            .vk_tree
            .vk_data(&child.vk_data.vk)
            .map_err(|e| ProverError::InvalidInput(e.to_string()))?;
        if expected != child.vk_data {
            return Err(ProverError::InvalidInput(format!(
                "bad vk membership witness at leaf {}",
                child.vk_data.leaf_index
            )));
        }
        if child.public_inputs.vk_tree_root != self.vk_tree.vk_tree_root() {
            return Err(ProverError::InvalidInput(
                "child proven against a different vk tree".to_owned(),
            ));
        }
        Ok(())
    }

    /// Checks `right` continues where `left` ends.
    fn check_adjacent(
        &self,
        left: &BlockRootOrBlockMergePublicInputs,
        right: &PreviousRollupBlockData,
    ) -> Result<(), ProverError> {
        let right_inputs = &right.public_inputs;
        if left.new_archive != right_inputs.previous_archive {
            return Err(ProverError::InvalidInput(format!(
                "archive of blocks ..={} does not chain into blocks {}..",
                left.end_block_number, right_inputs.start_block_number
            )));
        }

        let is_padding = right.vk_data.vk == RollupCircuit::PaddingBlockRoot.verification_key();
        if !is_padding && left.end_block_number + 1 != right_inputs.start_block_number {
            return Err(ProverError::InvalidInput(format!(
                "block ranges ..={} and {}.. are not contiguous",
                left.end_block_number, right_inputs.start_block_number
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EpochProver for NativeEpochProver {
    async fn prove_block_merge_rollup(
        &self,
        inputs: BlockMergeRollupInputs,
    ) -> Result<BlockRollupOutput, ProverError> {
        self.simulate_work().await;

        let [left, right] = &inputs.previous_rollup_data;
        self.check_child(left)?;
        self.check_child(right)?;
        self.check_adjacent(&left.public_inputs, right)?;

        let (l, r) = (&left.public_inputs, &right.public_inputs);
        let merged = BlockRootOrBlockMergePublicInputs {
            previous_archive: l.previous_archive,
            new_archive: r.new_archive,
            start_block_number: l.start_block_number,
            end_block_number: r.end_block_number,
            out_hash: hash::hash_pair(&l.out_hash, &r.out_hash),
            prover_id: l.prover_id,
            vk_tree_root: self.vk_tree.vk_tree_root(),
        };
        trace!(
            start = %merged.start_block_number,
            end = %merged.end_block_number,
            "proved block merge"
        );
        Ok(make_output(RollupCircuit::BlockMerge, merged))
    }

    async fn prove_padding_block_root_rollup(
        &self,
        inputs: PaddingBlockRootRollupInputs,
    ) -> Result<BlockRollupOutput, ProverError> {
        self.simulate_work().await;

        if !inputs.is_padding {
            return Err(ProverError::InvalidInput(
                "padding block root requires padding inputs".to_owned(),
            ));
        }

        let block_number = inputs.global_variables.block_number;
        let padding = BlockRootOrBlockMergePublicInputs {
            previous_archive: inputs.archive,
            new_archive: inputs.archive,
            start_block_number: block_number,
            end_block_number: block_number,
            out_hash: Buf32::zero(),
            prover_id: inputs.prover_id,
            vk_tree_root: inputs.vk_tree_root,
        };
        Ok(make_output(RollupCircuit::PaddingBlockRoot, padding))
    }

    async fn prove_root_rollup(
        &self,
        inputs: RootRollupInputs,
    ) -> Result<RootRollupOutput, ProverError> {
        self.simulate_work().await;

        let [left, right] = &inputs.previous_rollup_data;
        self.check_child(left)?;
        self.check_child(right)?;
        self.check_adjacent(&left.public_inputs, right)?;

        let (l, r) = (&left.public_inputs, &right.public_inputs);
        let root = RootRollupPublicInputs {
            previous_archive: l.previous_archive,
            end_archive: r.new_archive,
            end_block_number: l.end_block_number.max(r.end_block_number),
            out_hash: hash::hash_pair(&l.out_hash, &r.out_hash),
            prover_id: l.prover_id,
            vk_tree_root: self.vk_tree.vk_tree_root(),
        };
        let vk = RollupCircuit::Root.verification_key();
        let proof = make_proof(&vk, hash::compute_borsh_hash(&root));
        Ok(RootRollupOutput::new(root, proof, vk))
    }

    async fn prove_tube(&self, tx: Tx) -> Result<ProofAndVerificationKey, ProverError> {
        self.simulate_work().await;

        if tx.client_proof.is_empty() {
            return Err(ProverError::InvalidInput(format!(
                "tx {} has an empty client proof",
                tx.hash
            )));
        }

        let digest = hash::hash_pair(&tx.hash.0, &hash::raw(tx.client_proof.as_bytes()));
        let vk = RollupCircuit::Tube.verification_key();
        Ok(ProofAndVerificationKey::new(make_proof(&vk, digest), vk))
    }
}

fn make_output(
    circuit: RollupCircuit,
    inputs: BlockRootOrBlockMergePublicInputs,
) -> BlockRollupOutput {
    let vk = circuit.verification_key();
    let proof = make_proof(&vk, hash::compute_borsh_hash(&inputs));
    BlockRollupOutput::new(inputs, proof, vk)
}

fn make_proof(vk: &VerificationKey, digest: Buf32) -> RecursiveProof {
    let binding = hash::hash_pair(&vk.hash(), &digest);
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(digest.as_slice());
    bytes.extend_from_slice(binding.as_slice());
    RecursiveProof::new(vec![digest, binding], Proof::new(bytes))
}

#[cfg(test)]
mod tests {
    use rollup_primitives::rollup::VkData;
    use rollup_test_utils::epoch::{block_context, l2_block, tx};

    use super::*;

    fn child(prover: &NativeEpochProver, output: &BlockRollupOutput) -> PreviousRollupBlockData {
        let tree = prover.vk_tree();
        PreviousRollupBlockData::new(
            output.inputs.clone(),
            output.proof.clone(),
            tree.vk_data(&output.verification_key).unwrap(),
        )
    }

    fn block_root(prover: &NativeEpochProver, n: u64) -> BlockRollupOutput {
        prover
            .prove_block_root(&block_context(n), &l2_block(n, 1))
            .unwrap()
    }

    #[test]
    fn test_circuit_keys_are_distinct() {
        let tree = NativeEpochProver::new().vk_tree();
        for (i, circuit) in RollupCircuit::ALL.iter().enumerate() {
            assert_eq!(
                tree.vk_leaf_index(&circuit.verification_key()).unwrap(),
                i as u64
            );
        }
    }

    #[tokio::test]
    async fn test_merge_spans_both_children() {
        let prover = NativeEpochProver::new();
        let left = block_root(&prover, 1);
        let right = block_root(&prover, 2);

        let merged = prover
            .prove_block_merge_rollup(BlockMergeRollupInputs {
                previous_rollup_data: [child(&prover, &left), child(&prover, &right)],
            })
            .await
            .unwrap();

        assert_eq!(merged.inputs.start_block_number, 1);
        assert_eq!(merged.inputs.end_block_number, 2);
        assert_eq!(merged.inputs.previous_archive, left.inputs.previous_archive);
        assert_eq!(merged.inputs.new_archive, right.inputs.new_archive);
        assert_eq!(
            merged.verification_key,
            RollupCircuit::BlockMerge.verification_key()
        );
    }

    #[tokio::test]
    async fn test_merge_rejects_swapped_children() {
        let prover = NativeEpochProver::new();
        let left = block_root(&prover, 1);
        let right = block_root(&prover, 2);

        let res = prover
            .prove_block_merge_rollup(BlockMergeRollupInputs {
                previous_rollup_data: [child(&prover, &right), child(&prover, &left)],
            })
            .await;
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_merge_rejects_bad_vk_witness() {
        let prover = NativeEpochProver::new();
        let left = block_root(&prover, 1);
        let right = block_root(&prover, 2);

        let mut bad = child(&prover, &left);
        bad.vk_data = VkData::new(bad.vk_data.vk.clone(), 3, bad.vk_data.sibling_path.clone());
        let res = prover
            .prove_block_merge_rollup(BlockMergeRollupInputs {
                previous_rollup_data: [bad, child(&prover, &right)],
            })
            .await;
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_tube_requires_client_proof() {
        let prover = NativeEpochProver::new();
        let good = prover.prove_tube(tx(1)).await.unwrap();
        assert_eq!(good.verification_key, RollupCircuit::Tube.verification_key());

        let mut empty = tx(2);
        empty.client_proof = Proof::default();
        assert!(prover.prove_tube(empty).await.is_err());
    }
}
