//! Memoization of tube proofs, keyed by tx hash.
//!
//! Tube proofs can be kicked off before the txs of a block are processed. Whoever asks first
//! starts the computation; everyone after that awaits the same shared future.

use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
    sync::Mutex,
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use rollup_primitives::{block::TxHash, proof::ProofAndVerificationKey};
use tracing::*;

use crate::errors::ProverError;

/// Cloneable handle to a tube proof computation.
pub type TubeProofHandle = Shared<BoxFuture<'static, Result<ProofAndVerificationKey, ProverError>>>;

#[derive(Default)]
pub struct TubeProofCache {
    proofs: Mutex<HashMap<TxHash, TubeProofHandle>>,
}

impl TubeProofCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `tx_hash`, starting the computation with `start_fn` if none
    /// exists yet. `start_fn` is only invoked by the first caller.
    pub fn get_or_start<F, Fut>(&self, tx_hash: TxHash, start_fn: F) -> TubeProofHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProofAndVerificationKey, ProverError>> + Send + 'static,
    {
        let mut proofs = self.lock();
        match proofs.entry(tx_hash) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                debug!(%tx_hash, "starting tube proof");
                let handle = start_fn().boxed().shared();
                entry.insert(handle.clone());
                handle
            }
        }
    }

    pub fn get(&self, tx_hash: &TxHash) -> Option<TubeProofHandle> {
        self.lock().get(tx_hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TxHash, TubeProofHandle>> {
        // Nothing panics while holding the lock, so a poisoned map is still consistent.
        self.proofs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TubeProofCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TubeProofCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use rollup_primitives::{
        buf::Buf32,
        proof::{RecursiveProof, VerificationKey},
    };

    use super::*;

    fn tx(n: u64) -> TxHash {
        TxHash(Buf32::from_u64(n))
    }

    fn proof(n: u64) -> ProofAndVerificationKey {
        ProofAndVerificationKey::new(
            RecursiveProof::new(vec![Buf32::from_u64(n)], Default::default()),
            VerificationKey::default(),
        )
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let cache = TubeProofCache::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..4 {
            let starts = starts.clone();
            handles.push(cache.get_or_start(tx(1), move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async move { Ok(proof(i)) }
            }));
        }

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        for handle in handles {
            assert_eq!(handle.await.unwrap(), proof(0));
        }
    }

    #[tokio::test]
    async fn test_error_is_shared() {
        let cache = TubeProofCache::new();
        let handle = cache.get_or_start(tx(2), || async {
            Err(ProverError::ProofGeneration("bad client proof".to_owned()))
        });
        let again = cache.get(&tx(2)).unwrap();

        assert_eq!(handle.await, again.await);
        assert!(cache.get(&tx(3)).is_none());
        assert!(!cache.is_empty());
    }
}
