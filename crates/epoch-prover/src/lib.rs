//! Epoch proof composition.
//!
//! Tracks the block-root, block-merge and root rollup proofs of one epoch as they arrive out
//! of order, threads the blob accumulator through the epoch's blocks in order, and settles the
//! epoch exactly once. Proof generation itself is delegated to an [`EpochProver`].

pub mod block_state;
pub mod epoch_state;
pub mod errors;
pub mod lifecycle;
pub mod native;
pub mod orchestrator;
pub mod prover;
pub mod settlement;
pub mod tube_cache;
pub mod vk_tree;

pub use block_state::BlockProvingState;
pub use epoch_state::{EpochProofResult, EpochProvingState};
pub use errors::{
    BlockProvingError, EpochProvingError, OrchestratorError, ProverError, VkTreeError,
};
pub use lifecycle::ProvingStateLifecycle;
pub use native::NativeEpochProver;
pub use orchestrator::{EpochHandle, EpochOrchestrator, SharedEpochState};
pub use prover::EpochProver;
pub use settlement::{
    settlement_channel, EpochOutcome, EpochProvingHandle, ProvingResult, Settlement,
};
pub use tube_cache::{TubeProofCache, TubeProofHandle};
pub use vk_tree::{StaticVkTree, VkTreeIndex};
