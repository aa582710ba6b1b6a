//! Proof artifacts passed between the prover and the orchestrator.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{buf::Buf32, hash};

/// Macro to define a newtype wrapper around `Vec<u8>` with common implementations.
macro_rules! define_byte_wrapper {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Serialize,
            Deserialize,
            BorshSerialize,
            BorshDeserialize,
            PartialEq,
            Eq,
            Arbitrary,
            Default,
        )]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Creates a new instance from a `Vec<u8>`.
            pub fn new(data: Vec<u8>) -> Self {
                Self(data)
            }

            /// Returns a reference to the inner byte slice.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Consumes the wrapper and returns the inner `Vec<u8>`.
            pub fn into_inner(self) -> Vec<u8> {
                self.0
            }

            /// Checks if the byte vector is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<$name> for Vec<u8> {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<&[u8]> for $name {
            fn from(value: &[u8]) -> Self {
                Self(value.to_vec())
            }
        }
    };
}

// Binary encoding of a proof, as submitted on L1.
define_byte_wrapper!(Proof);

/// A verification key in its field-element representation.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct VerificationKey {
    key_as_fields: Vec<Buf32>,
}

impl VerificationKey {
    pub fn new(key_as_fields: Vec<Buf32>) -> Self {
        Self { key_as_fields }
    }

    pub fn key_as_fields(&self) -> &[Buf32] {
        &self.key_as_fields
    }

    /// Hash committing to the key, used as its leaf in the verification-key tree.
    pub fn hash(&self) -> Buf32 {
        hash::hash_fields(&self.key_as_fields)
    }
}

/// A proof that can be verified inside another circuit.
///
/// Carries both the field-element form consumed by recursive verifiers and the binary form
/// that gets published.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct RecursiveProof {
    fields: Vec<Buf32>,
    binary_proof: Proof,
}

impl RecursiveProof {
    pub fn new(fields: Vec<Buf32>, binary_proof: Proof) -> Self {
        Self {
            fields,
            binary_proof,
        }
    }

    pub fn fields(&self) -> &[Buf32] {
        &self.fields
    }

    pub fn binary_proof(&self) -> &Proof {
        &self.binary_proof
    }
}

/// Output of a rollup circuit: its public inputs, the proof and the key that verifies it.
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
pub struct PublicInputsAndRecursiveProof<T> {
    pub inputs: T,
    pub proof: RecursiveProof,
    pub verification_key: VerificationKey,
}

impl<T> PublicInputsAndRecursiveProof<T> {
    pub fn new(inputs: T, proof: RecursiveProof, verification_key: VerificationKey) -> Self {
        Self {
            inputs,
            proof,
            verification_key,
        }
    }
}

/// A proof paired with its verification key, with no public inputs attached.
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
pub struct ProofAndVerificationKey {
    pub proof: RecursiveProof,
    pub verification_key: VerificationKey,
}

impl ProofAndVerificationKey {
    pub fn new(proof: RecursiveProof, verification_key: VerificationKey) -> Self {
        Self {
            proof,
            verification_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_hash_depends_on_fields() {
        let a = VerificationKey::new(vec![Buf32::from_u64(1)]);
        let b = VerificationKey::new(vec![Buf32::from_u64(2)]);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
    }
}
