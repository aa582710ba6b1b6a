use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use rand::{seq::SliceRandom, thread_rng};
use rollup_config::OrchestratorConfig;
use rollup_epoch_prover::{
    epoch_state::CANCELLED_REASON, EpochOrchestrator, EpochProver, NativeEpochProver,
    OrchestratorError, ProverError, ProvingStateLifecycle, VkTreeIndex,
};
use rollup_primitives::{
    block::Tx,
    proof::ProofAndVerificationKey,
    rollup::{
        BlockMergeRollupInputs, BlockRollupOutput, PaddingBlockRootRollupInputs,
        RootRollupInputs, RootRollupOutput,
    },
};
use rollup_test_utils::epoch::{archive_after, block_context, final_challenges, l2_block, tx};

/// Native prover that counts calls and can be told to fail merges.
struct InstrumentedProver {
    inner: NativeEpochProver,
    fail_merges: bool,
    merge_calls: AtomicUsize,
    tube_calls: AtomicUsize,
}

impl InstrumentedProver {
    fn new(fail_merges: bool) -> Self {
        Self {
            inner: NativeEpochProver::new().with_delay(Duration::from_millis(2)),
            fail_merges,
            merge_calls: AtomicUsize::new(0),
            tube_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EpochProver for InstrumentedProver {
    async fn prove_block_merge_rollup(
        &self,
        inputs: BlockMergeRollupInputs,
    ) -> Result<BlockRollupOutput, ProverError> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_merges {
            return Err(ProverError::ProofGeneration("merge circuit crashed".to_owned()));
        }
        self.inner.prove_block_merge_rollup(inputs).await
    }

    async fn prove_padding_block_root_rollup(
        &self,
        inputs: PaddingBlockRootRollupInputs,
    ) -> Result<BlockRollupOutput, ProverError> {
        self.inner.prove_padding_block_root_rollup(inputs).await
    }

    async fn prove_root_rollup(
        &self,
        inputs: RootRollupInputs,
    ) -> Result<RootRollupOutput, ProverError> {
        self.inner.prove_root_rollup(inputs).await
    }

    async fn prove_tube(&self, tx: Tx) -> Result<ProofAndVerificationKey, ProverError> {
        self.tube_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.prove_tube(tx).await
    }
}

fn setup(fail_merges: bool) -> (Arc<InstrumentedProver>, EpochOrchestrator<InstrumentedProver>) {
    let prover = Arc::new(InstrumentedProver::new(fail_merges));
    let vk_tree = Arc::new(prover.inner.vk_tree());
    let config = OrchestratorConfig {
        max_concurrent_jobs: 2,
        ..Default::default()
    };
    let orch = EpochOrchestrator::new(prover.clone(), vk_tree, config);
    (prover, orch)
}

/// Feeds every block of an epoch in random order and returns the block numbers.
async fn feed_blocks(
    prover: &InstrumentedProver,
    orch: &EpochOrchestrator<InstrumentedProver>,
    first: u64,
    total: u64,
) -> Vec<u64> {
    let mut rng = thread_rng();
    let mut blocks: Vec<u64> = (first..first + total).collect();

    blocks.shuffle(&mut rng);
    for n in &blocks {
        orch.start_new_block(block_context(*n)).await.unwrap();
    }

    blocks.shuffle(&mut rng);
    for n in &blocks {
        orch.set_block_completed(*n, l2_block(*n, 2)).await.unwrap();
    }

    blocks.shuffle(&mut rng);
    for n in &blocks {
        let output = prover
            .inner
            .prove_block_root(&block_context(*n), &l2_block(*n, 2))
            .unwrap();
        orch.set_block_root_rollup_proof(*n, output).await.unwrap();
    }

    blocks
}

async fn prove_epoch(total: u64) {
    let (prover, orch) = setup(false);
    let first = 100;
    let handle = orch
        .start_new_epoch(9, first, total as usize, final_challenges())
        .await
        .unwrap();

    feed_blocks(&prover, &orch, first, total).await;
    let result = orch.finalize_epoch(handle).await.unwrap();

    let last = first + total - 1;
    assert_eq!(result.public_inputs.end_block_number, last);
    assert_eq!(
        result.public_inputs.previous_archive,
        block_context(first).last_archive
    );
    assert_eq!(result.public_inputs.end_archive, archive_after(last));
    assert_eq!(result.public_inputs.vk_tree_root, prover.inner.vk_tree().vk_tree_root());
    assert_eq!(result.batched_blob_inputs.num_blobs, total);
    assert_eq!(result.batched_blob_inputs.z, final_challenges().z);
    assert!(!result.proof.is_empty());

    // One merge per internal node below the root.
    let expected_merges = total.saturating_sub(2) as usize;
    assert_eq!(prover.merge_calls.load(Ordering::SeqCst), expected_merges);

    let state = orch.current_epoch().await.unwrap();
    assert_eq!(state.lock().await.lifecycle(), ProvingStateLifecycle::Resolved);
}

#[tokio::test]
async fn test_single_block_epoch() {
    prove_epoch(1).await;
}

#[tokio::test]
async fn test_two_block_epoch() {
    prove_epoch(2).await;
}

#[tokio::test]
async fn test_three_block_epoch() {
    prove_epoch(3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unbalanced_epochs() {
    for total in [5, 6, 7, 11] {
        prove_epoch(total).await;
    }
}

#[tokio::test]
async fn test_finalize_settled_epoch_after_next_started() {
    let (prover, orch) = setup(false);
    let first = orch
        .start_new_epoch(1, 1, 1, final_challenges())
        .await
        .unwrap();
    assert_eq!(first.epoch_number(), 1);
    feed_blocks(&prover, &orch, 1, 1).await;

    // Let the padding and root jobs settle the epoch before the next one starts.
    let epoch_one = first.state().clone();
    while epoch_one.lock().await.verify_state() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(
        epoch_one.lock().await.lifecycle(),
        ProvingStateLifecycle::Resolved
    );

    let _second = orch
        .start_new_epoch(2, 2, 3, final_challenges())
        .await
        .unwrap();
    let result = orch.finalize_epoch(first).await.unwrap();
    assert_eq!(result.public_inputs.end_block_number, 1);
    assert_eq!(result.public_inputs.end_archive, archive_after(1));
    assert_eq!(result.batched_blob_inputs.num_blobs, 1);

    let current = orch.current_epoch().await.unwrap();
    let current = current.lock().await;
    assert_eq!(current.epoch_number(), 2);
    assert!(current.verify_state());
}

#[tokio::test]
async fn test_cancelled_epoch_discards_results() {
    let (prover, orch) = setup(false);
    let handle = orch
        .start_new_epoch(1, 1, 2, final_challenges())
        .await
        .unwrap();
    orch.start_new_block(block_context(1)).await.unwrap();
    orch.cancel().await;

    // Late results are accepted and ignored.
    let output = prover
        .inner
        .prove_block_root(&block_context(1), &l2_block(1, 1))
        .unwrap();
    orch.set_block_root_rollup_proof(1, output).await.unwrap();

    match orch.finalize_epoch(handle).await {
        Err(OrchestratorError::Rejected(reason)) => assert_eq!(reason, CANCELLED_REASON),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_prover_failure_rejects_epoch() {
    let (prover, orch) = setup(true);
    let handle = orch
        .start_new_epoch(1, 1, 4, final_challenges())
        .await
        .unwrap();

    feed_blocks(&prover, &orch, 1, 4).await;

    match orch.finalize_epoch(handle).await {
        Err(OrchestratorError::Rejected(reason)) => {
            assert!(reason.contains("block merge"), "unexpected reason {reason}");
            assert!(reason.contains("merge circuit crashed"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(prover.merge_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_tube_proofs_started_once() {
    let (prover, orch) = setup(false);
    orch.start_new_epoch(1, 1, 1, final_challenges())
        .await
        .unwrap();

    let txs: Vec<_> = (0..3).map(tx).collect();
    orch.start_tube_circuits(txs.clone()).await.unwrap();
    orch.start_tube_circuits(txs.clone()).await.unwrap();

    let first = orch.get_tube_proof(&txs[0].hash).await.unwrap();
    let again = orch.get_tube_proof(&txs[0].hash).await.unwrap();
    assert_eq!(first, again);
    for t in &txs {
        orch.get_tube_proof(&t.hash).await.unwrap();
    }
    assert_eq!(prover.tube_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_tube_kickoff_disabled() {
    let prover = Arc::new(InstrumentedProver::new(false));
    let vk_tree = Arc::new(prover.inner.vk_tree());
    let config = OrchestratorConfig {
        kickoff_tube_proofs: false,
        ..Default::default()
    };
    let orch = EpochOrchestrator::new(prover.clone(), vk_tree, config);
    orch.start_new_epoch(1, 1, 1, final_challenges())
        .await
        .unwrap();

    let t = tx(1);
    orch.start_tube_circuits(vec![t.clone()]).await.unwrap();
    assert!(matches!(
        orch.get_tube_proof(&t.hash).await,
        Err(OrchestratorError::UnknownTx(_))
    ));
    assert_eq!(prover.tube_calls.load(Ordering::SeqCst), 0);
}
