//! Batched blob accumulation across the blocks of an epoch.
//!
//! The accumulator here is a hash-chained commitment to every blob published in the epoch.
//! It keeps the shape of the batched-KZG accumulator (running commitment, evaluation and
//! challenge accumulators, then a finalisation against the epoch-wide challenges) without
//! doing any curve arithmetic.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{buf::Buf32, hash};

/// Number of field elements in a single blob.
pub const FIELDS_PER_BLOB: usize = 4096;

/// Maximum number of blobs a single block may publish.
pub const BLOBS_PER_BLOCK: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("block publishes {0} blob fields, more than fit in {max} blobs", max = BLOBS_PER_BLOCK)]
    TooManyBlobFields(usize),

    #[error("accumulator was seeded with different final challenges")]
    ChallengeMismatch,
}

/// Challenges fixed for the whole epoch, used to finalise the batched blob.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct FinalBlobBatchingChallenges {
    pub z: Buf32,
    pub gamma: Buf32,
}

impl FinalBlobBatchingChallenges {
    pub fn new(z: Buf32, gamma: Buf32) -> Self {
        Self { z, gamma }
    }
}

/// Running accumulator over blob commitments, chained strictly in block order.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct BlobAccumulator {
    blob_commitments_hash: Buf32,
    z_acc: Buf32,
    y_acc: Buf32,
    c_acc: Buf32,
    gamma_acc: Buf32,
    num_blobs: u64,
    final_challenges: FinalBlobBatchingChallenges,
}

impl BlobAccumulator {
    /// Empty accumulator bound to the epoch's final challenges. Only the first block of an
    /// epoch starts from here; every later block starts from its predecessor's end state.
    pub fn new_with_challenges(final_challenges: FinalBlobBatchingChallenges) -> Self {
        Self {
            blob_commitments_hash: Buf32::zero(),
            z_acc: Buf32::zero(),
            y_acc: Buf32::zero(),
            c_acc: Buf32::zero(),
            gamma_acc: Buf32::zero(),
            num_blobs: 0,
            final_challenges,
        }
    }

    pub fn num_blobs(&self) -> u64 {
        self.num_blobs
    }

    pub fn blob_commitments_hash(&self) -> Buf32 {
        self.blob_commitments_hash
    }

    pub fn final_challenges(&self) -> &FinalBlobBatchingChallenges {
        &self.final_challenges
    }

    /// Absorbs one block's blob fields, split into blobs of [`FIELDS_PER_BLOB`], and returns
    /// the accumulator after them. `self` is left untouched.
    pub fn accumulate_blobs(&self, blob_fields: &[Buf32]) -> Result<Self, BlobError> {
        if blob_fields.len() > FIELDS_PER_BLOB * BLOBS_PER_BLOCK {
            return Err(BlobError::TooManyBlobFields(blob_fields.len()));
        }

        let mut acc = self.clone();
        for blob in blob_fields.chunks(FIELDS_PER_BLOB) {
            let commitment = hash::hash_fields(blob);
            acc.blob_commitments_hash = hash::hash_pair(&acc.blob_commitments_hash, &commitment);
            acc.z_acc = hash::hash_fields(&[acc.z_acc, commitment, self.final_challenges.z]);
            acc.y_acc = hash::hash_fields(&[acc.y_acc, commitment, acc.z_acc]);
            acc.c_acc = hash::hash_fields(&[acc.c_acc, commitment, acc.gamma_acc]);
            acc.gamma_acc =
                hash::hash_fields(&[acc.gamma_acc, commitment, self.final_challenges.gamma]);
            acc.num_blobs += 1;
        }
        Ok(acc)
    }

    /// Closes the accumulator against the epoch's final challenges.
    pub fn finalize(
        &self,
        challenges: &FinalBlobBatchingChallenges,
    ) -> Result<BatchedBlob, BlobError> {
        if challenges != &self.final_challenges {
            return Err(BlobError::ChallengeMismatch);
        }

        Ok(BatchedBlob {
            blob_commitments_hash: self.blob_commitments_hash,
            z: challenges.z,
            y: self.y_acc,
            commitment: self.c_acc,
            gamma: challenges.gamma,
            num_blobs: self.num_blobs,
        })
    }
}

/// The finalised batch of every blob in the epoch, published next to the epoch proof.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct BatchedBlob {
    pub blob_commitments_hash: Buf32,
    pub z: Buf32,
    pub y: Buf32,
    pub commitment: Buf32,
    pub gamma: Buf32,
    pub num_blobs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenges() -> FinalBlobBatchingChallenges {
        FinalBlobBatchingChallenges::new(Buf32::from_u64(3), Buf32::from_u64(5))
    }

    #[test]
    fn test_accumulation_is_order_sensitive() {
        let start = BlobAccumulator::new_with_challenges(challenges());
        let a = vec![Buf32::from_u64(1)];
        let b = vec![Buf32::from_u64(2)];

        let ab = start
            .accumulate_blobs(&a)
            .unwrap()
            .accumulate_blobs(&b)
            .unwrap();
        let ba = start
            .accumulate_blobs(&b)
            .unwrap()
            .accumulate_blobs(&a)
            .unwrap();

        assert_eq!(ab.num_blobs(), 2);
        assert_ne!(ab.blob_commitments_hash(), ba.blob_commitments_hash());
    }

    #[test]
    fn test_splits_into_blobs() {
        let start = BlobAccumulator::new_with_challenges(challenges());
        let fields = vec![Buf32::from_u64(9); FIELDS_PER_BLOB + 1];
        let end = start.accumulate_blobs(&fields).unwrap();
        assert_eq!(end.num_blobs(), 2);
    }

    #[test]
    fn test_empty_block_leaves_accumulator_unchanged() {
        let start = BlobAccumulator::new_with_challenges(challenges());
        assert_eq!(start.accumulate_blobs(&[]).unwrap(), start);
    }

    #[test]
    fn test_too_many_fields() {
        let start = BlobAccumulator::new_with_challenges(challenges());
        let fields = vec![Buf32::zero(); FIELDS_PER_BLOB * BLOBS_PER_BLOCK + 1];
        assert!(matches!(
            start.accumulate_blobs(&fields),
            Err(BlobError::TooManyBlobFields(_))
        ));
    }

    #[test]
    fn test_finalize_checks_challenges() {
        let acc = BlobAccumulator::new_with_challenges(challenges())
            .accumulate_blobs(&[Buf32::from_u64(1)])
            .unwrap();

        let other = FinalBlobBatchingChallenges::new(Buf32::from_u64(4), Buf32::from_u64(5));
        assert_eq!(acc.finalize(&other), Err(BlobError::ChallengeMismatch));

        let batched = acc.finalize(&challenges()).unwrap();
        assert_eq!(batched.num_blobs, 1);
        assert_eq!(batched.z, challenges().z);
        assert_eq!(batched.blob_commitments_hash, acc.blob_commitments_hash());
    }
}
