//! Asynchronous pipeline around an [`EpochProvingState`].
//!
//! Callers push block-level results in any order. After each one, the orchestrator checks
//! which reduction proofs became ready and spawns a job for each on the tokio runtime. Every
//! readiness check and setter runs under the epoch's state lock, so each parent node is
//! enqueued by exactly one flow. Prover calls run outside the lock, bounded by a semaphore.

use std::{future::Future, sync::Arc};

use rollup_config::OrchestratorConfig;
use rollup_primitives::{
    blob::FinalBlobBatchingChallenges,
    block::{L2Block, Tx, TxHash},
    context::BlockProvingContext,
    proof::ProofAndVerificationKey,
    rollup::BlockRollupOutput,
};
use rollup_unbalanced_tree::TreeNodeLocation;
use tokio::sync::{Mutex, Semaphore};
use tracing::*;

use crate::{
    epoch_state::{EpochProofResult, EpochProvingState},
    errors::{EpochProvingError, EpochProvingResult, OrchestratorError, ProverError},
    prover::EpochProver,
    settlement::{settlement_channel, EpochOutcome, EpochProvingHandle, ProvingResult},
    vk_tree::VkTreeIndex,
};

pub type SharedEpochState = Arc<Mutex<EpochProvingState>>;

/// Returned by [`EpochOrchestrator::start_new_epoch`]. Ties the settlement of one epoch to
/// that epoch's state, so it can be finalized after a later epoch has started.
#[derive(Debug)]
pub struct EpochHandle {
    epoch_number: u64,
    state: SharedEpochState,
    outcome: EpochProvingHandle,
}

impl EpochHandle {
    pub fn epoch_number(&self) -> u64 {
        self.epoch_number
    }

    pub fn state(&self) -> &SharedEpochState {
        &self.state
    }

    /// Waits for the epoch to settle without finalizing it.
    pub async fn wait(self) -> EpochOutcome {
        self.outcome.wait().await
    }
}

pub struct EpochOrchestrator<P> {
    prover: Arc<P>,
    vk_tree: Arc<dyn VkTreeIndex>,
    config: OrchestratorConfig,
    job_permits: Arc<Semaphore>,
    proving_state: Mutex<Option<SharedEpochState>>,
}

impl<P: EpochProver> EpochOrchestrator<P> {
    pub fn new(prover: Arc<P>, vk_tree: Arc<dyn VkTreeIndex>, config: OrchestratorConfig) -> Self {
        let job_permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            prover,
            vk_tree,
            config,
            job_permits,
            proving_state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// State of the epoch currently being proven, if any.
    pub async fn current_epoch(&self) -> Option<SharedEpochState> {
        self.proving_state.lock().await.clone()
    }

    /// Starts proving a new epoch, cancelling the previous one if it has not settled yet.
    pub async fn start_new_epoch(
        &self,
        epoch_number: u64,
        first_block_number: u64,
        total_num_blocks: usize,
        final_blob_batching_challenges: FinalBlobBatchingChallenges,
    ) -> Result<EpochHandle, OrchestratorError> {
        let mut current = self.proving_state.lock().await;
        if let Some(previous) = current.as_ref() {
            let mut previous = previous.lock().await;
            if previous.verify_state() {
                warn!(
                    previous_epoch = %previous.epoch_number(),
                    %epoch_number,
                    "cancelling unfinished epoch"
                );
                previous.cancel();
            }
        }

        let (settlement, outcome) = settlement_channel();
        let state = EpochProvingState::new(
            epoch_number,
            first_block_number,
            total_num_blocks,
            final_blob_batching_challenges,
            self.vk_tree.clone(),
            settlement,
        )?;
        let state = Arc::new(Mutex::new(state));
        *current = Some(state.clone());

        info!(%epoch_number, %first_block_number, %total_num_blocks, "started epoch");
        Ok(EpochHandle {
            epoch_number,
            state,
            outcome,
        })
    }

    pub async fn start_new_block(
        &self,
        context: BlockProvingContext,
    ) -> Result<(), OrchestratorError> {
        let state = self.active_state().await?;
        let mut state = state.lock().await;
        let block_number = context.block_number();
        let index = state.start_new_block(context)?.index();
        info!(epoch_number = %state.epoch_number(), %block_number, %index, "started block");
        Ok(())
    }

    /// Kicks off tube proofs for `txs` ahead of time. Txs already started are skipped.
    pub async fn start_tube_circuits(&self, txs: Vec<Tx>) -> Result<(), OrchestratorError> {
        if !self.config.kickoff_tube_proofs {
            debug!(num_txs = txs.len(), "tube proof kickoff disabled");
            return Ok(());
        }

        let state = self.active_state().await?;
        let state = state.lock().await;
        let cache = state.cached_tube_proofs();
        for tx in txs {
            let tx_hash = tx.hash;
            if cache.get(&tx_hash).is_some() {
                continue;
            }

            let prover = self.prover.clone();
            let permits = self.job_permits.clone();
            let handle = cache.get_or_start(tx_hash, move || async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| ProverError::Cancelled)?;
                prover.prove_tube(tx).await
            });

            // Drive it in the background so it progresses before anyone awaits it.
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    warn!(%tx_hash, %e, "tube proof failed");
                }
            });
        }

        Ok(())
    }

    /// Waits for the tube proof of a tx started through [`Self::start_tube_circuits`].
    pub async fn get_tube_proof(
        &self,
        tx_hash: &TxHash,
    ) -> Result<ProofAndVerificationKey, OrchestratorError> {
        let handle = {
            let state = self.active_state().await?;
            let state = state.lock().await;
            state
                .cached_tube_proofs()
                .get(tx_hash)
                .ok_or(OrchestratorError::UnknownTx(*tx_hash))?
        };
        Ok(handle.await?)
    }

    /// Marks a block as finished, advances blob accumulation up to it and, for a single-block
    /// epoch, enqueues the padding block root.
    pub async fn set_block_completed(
        &self,
        block_number: u64,
        block: L2Block,
    ) -> Result<(), OrchestratorError> {
        let shared = self.active_state().await?;
        let mut state = shared.lock().await;
        if !state.verify_state() {
            debug!(%block_number, "ignoring completed block of settled epoch");
            return Ok(());
        }

        state
            .get_block_proving_state_by_block_number_mut(block_number)?
            .set_block(block)
            .map_err(EpochProvingError::from)?;
        state.set_blob_accumulators(Some(block_number)).await?;
        info!(epoch_number = %state.epoch_number(), %block_number, "block completed");

        if state.total_num_blocks() == 1 {
            self.jobs(shared.clone())
                .enqueue_padding_block_root_rollup(&mut state)?;
        }
        Ok(())
    }

    /// Stores a block-root proof and enqueues whatever it makes ready.
    pub async fn set_block_root_rollup_proof(
        &self,
        block_number: u64,
        output: BlockRollupOutput,
    ) -> Result<(), OrchestratorError> {
        let shared = self.active_state().await?;
        let mut state = shared.lock().await;
        if !state.verify_state() {
            debug!(%block_number, "ignoring block root proof of settled epoch");
            return Ok(());
        }

        let index = state
            .get_block_proving_state_by_block_number_mut(block_number)?
            .index();
        let location = state.set_block_root_rollup_proof(index, output.clone())?;
        state
            .get_block_proving_state_by_block_number_mut(block_number)?
            .set_block_root_rollup_proof(output);
        debug!(%block_number, %location, "stored block root proof");

        let jobs = self.jobs(shared.clone());
        let res = if state.total_num_blocks() == 1 {
            jobs.check_and_enqueue_root_rollup(&mut state)
        } else {
            jobs.check_and_enqueue_next_block_merge(&mut state, location)
        };
        Ok(res?)
    }

    pub async fn cancel(&self) {
        if let Some(state) = self.current_epoch().await {
            state.lock().await.cancel();
        }
    }

    /// Waits for the epoch behind `handle` to settle, closes its blob accumulation and returns
    /// the final proof. Later epochs started in the meantime are left alone.
    pub async fn finalize_epoch(
        &self,
        handle: EpochHandle,
    ) -> Result<EpochProofResult, OrchestratorError> {
        let EpochHandle { state, outcome, .. } = handle;
        match outcome.wait().await {
            EpochOutcome::Completed(ProvingResult::Success) => {}
            EpochOutcome::Completed(ProvingResult::Failure { reason }) => {
                return Err(OrchestratorError::Failed(reason));
            }
            EpochOutcome::Rejected(reason) => return Err(OrchestratorError::Rejected(reason)),
        }

        let mut state = state.lock().await;
        let epoch_number = state.epoch_number();
        state.set_blob_accumulators(None).await?;

        let batched_blob = state
            .final_blob_accumulator()
            .ok_or(OrchestratorError::IncompleteBlobAccumulation(epoch_number))?
            .finalize(state.final_blob_batching_challenges())
            .map_err(EpochProvingError::from)?;
        info!(%epoch_number, num_blobs = %batched_blob.num_blobs, "finalized epoch blobs");
        state.set_final_batched_blob(batched_blob);

        Ok(state.get_epoch_proof_result()?)
    }

    async fn active_state(&self) -> Result<SharedEpochState, OrchestratorError> {
        self.current_epoch()
            .await
            .ok_or(OrchestratorError::NoActiveEpoch)
    }

    fn jobs(&self, state: SharedEpochState) -> EpochJobs<P> {
        EpochJobs {
            prover: self.prover.clone(),
            permits: self.job_permits.clone(),
            state,
        }
    }
}

/// Everything a spawned prover job needs to report back into its epoch.
struct EpochJobs<P> {
    prover: Arc<P>,
    permits: Arc<Semaphore>,
    state: SharedEpochState,
}

impl<P> Clone for EpochJobs<P> {
    fn clone(&self) -> Self {
        Self {
            prover: self.prover.clone(),
            permits: self.permits.clone(),
            state: self.state.clone(),
        }
    }
}

impl<P: EpochProver> EpochJobs<P> {
    fn check_and_enqueue_next_block_merge(
        &self,
        state: &mut EpochProvingState,
        location: TreeNodeLocation,
    ) -> EpochProvingResult<()> {
        if !state.is_ready_for_block_merge(location) {
            return Ok(());
        }

        let parent = state.get_parent_location(location)?;
        if parent.is_root() {
            self.check_and_enqueue_root_rollup(state)
        } else {
            self.enqueue_block_merge_rollup(state, parent)
        }
    }

    fn enqueue_block_merge_rollup(
        &self,
        state: &mut EpochProvingState,
        location: TreeNodeLocation,
    ) -> EpochProvingResult<()> {
        let inputs = state.get_block_merge_rollup_inputs(location)?;
        debug!(epoch_number = %state.epoch_number(), %location, "enqueuing block merge");

        self.deferred_proving(
            "block merge rollup",
            move |prover| async move { prover.prove_block_merge_rollup(inputs).await },
            move |jobs, state, output| {
                state.set_block_merge_rollup_proof(location, output)?;
                jobs.check_and_enqueue_next_block_merge(state, location)
            },
        );
        Ok(())
    }

    fn enqueue_padding_block_root_rollup(
        &self,
        state: &mut EpochProvingState,
    ) -> EpochProvingResult<()> {
        let inputs = state.get_padding_block_root_inputs()?;
        debug!(epoch_number = %state.epoch_number(), "enqueuing padding block root");

        self.deferred_proving(
            "padding block root rollup",
            move |prover| async move { prover.prove_padding_block_root_rollup(inputs).await },
            |jobs, state, output| {
                state.set_padding_block_root_proof(output);
                jobs.check_and_enqueue_root_rollup(state)
            },
        );
        Ok(())
    }

    fn check_and_enqueue_root_rollup(
        &self,
        state: &mut EpochProvingState,
    ) -> EpochProvingResult<()> {
        if !state.is_ready_for_root_rollup() {
            debug!(epoch_number = %state.epoch_number(), "not ready for root rollup");
            return Ok(());
        }

        let inputs = state.get_root_rollup_inputs()?;
        info!(epoch_number = %state.epoch_number(), "enqueuing root rollup");

        self.deferred_proving(
            "root rollup",
            move |prover| async move { prover.prove_root_rollup(inputs).await },
            |_, state, output| {
                state.set_root_rollup_proof(output);
                state.resolve(ProvingResult::Success);
                Ok(())
            },
        );
        Ok(())
    }

    /// Spawns `prove` on the runtime. Once it completes and the epoch is still live, `on_done`
    /// runs under the state lock. Prover failures and errors from `on_done` reject the epoch.
    fn deferred_proving<T, F, Fut, D>(&self, job_name: &'static str, prove: F, on_done: D)
    where
        T: Send + 'static,
        F: FnOnce(Arc<P>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProverError>> + Send + 'static,
        D: FnOnce(&Self, &mut EpochProvingState, T) -> EpochProvingResult<()> + Send + 'static,
    {
        let jobs = self.clone();
        tokio::spawn(async move {
            let Ok(_permit) = jobs.permits.clone().acquire_owned().await else {
                warn!(%job_name, "job semaphore closed");
                return;
            };

            if !jobs.state.lock().await.verify_state() {
                debug!(%job_name, "epoch settled before job started, skipping");
                return;
            }

            let res = prove(jobs.prover.clone()).await;

            let mut state = jobs.state.lock().await;
            if !state.verify_state() {
                debug!(
                    %job_name,
                    epoch_number = %state.epoch_number(),
                    "discarding result of settled epoch"
                );
                return;
            }

            match res {
                Ok(output) => {
                    trace!(%job_name, "job completed");
                    if let Err(e) = on_done(&jobs, &mut *state, output) {
                        error!(%job_name, %e, "failed to process job output");
                        state.reject(format!("Error processing {job_name}: {e}"));
                    }
                }
                Err(e) => {
                    error!(%job_name, %e, "prover job failed");
                    state.reject(format!("Error proving {job_name}: {e}"));
                }
            }
        });
    }
}
