//! Functionality for building challenge scalars.
//!
//! Supports challenges on single proofs and on conjunctions of proofs. Public information that a
//! proof must be bound to (keys, commitments, context bytes) is incorporated the same way.

use crate::{
    common::*,
    pedersen::Commitment,
    pointcheval_sanders::{BlindedSignature, PublicKey},
};
use sha3::{Digest, Sha3_256};

/// A challenge scalar for use in a Schnorr-style proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge(Scalar);

impl Challenge {
    /// Retrieve the internal scalar value.
    pub fn to_scalar(self) -> Scalar {
        self.0
    }
}

/// A trait implemented by types which can feed their public components into a
/// [`ChallengeBuilder`].
pub trait ChallengeInput {
    /// Incorporate public components of this type into a [`ChallengeBuilder`].
    fn consume(&self, builder: &mut ChallengeBuilder);
}

impl<T: ChallengeInput> ChallengeInput for [T] {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        for item in self {
            item.consume(builder);
        }
    }
}

impl ChallengeInput for Scalar {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_bytes());
    }
}

impl ChallengeInput for G1Projective {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(G1Affine::from(self).to_compressed());
    }
}

impl ChallengeInput for G2Projective {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(G2Affine::from(self).to_compressed());
    }
}

impl ChallengeInput for Commitment {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_bytes());
    }
}

impl ChallengeInput for BlindedSignature {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_bytes());
    }
}

impl<const N: usize> ChallengeInput for PublicKey<N> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_bytes());
    }
}

/// Holds state used when building a [`Challenge`] using the Fiat-Shamir heuristic, as in a
/// non-interactive Schnorr proof.
#[derive(Debug)]
#[allow(missing_copy_implementations)]
pub struct ChallengeBuilder {
    hasher: Sha3_256,
}

impl Default for ChallengeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeBuilder {
    /// Initialize a new, empty challenge.
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    /// Incorporate public data from some given type into the challenge.
    pub fn consume<T: ChallengeInput + ?Sized>(&mut self, object: &T) {
        object.consume(self);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::consume`].
    pub fn with<T: ChallengeInput + ?Sized>(mut self, object: &T) -> Self {
        object.consume(&mut self);
        self
    }

    /// Incorporate arbitrary bytes into the challenge.
    ///
    /// Each call is length-prefixed, so distinct sequences of calls never collide.
    pub fn digest_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::digest_bytes`].
    pub fn with_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.digest_bytes(bytes);
        self
    }

    /// Consume the builder and generate a [`Challenge`] from the accumulated data.
    pub fn finish(self) -> Challenge {
        let digested = self.hasher.finalize();
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(digested.chunks_exact(8)) {
            let mut word = [0; 8];
            word.copy_from_slice(chunk);
            *limb = u64::from_le_bytes(word);
        }
        Challenge(Scalar::from_raw(limbs))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn challenge_depends_on_call_boundaries() {
        let joined = ChallengeBuilder::new().with_bytes(b"abcd").finish();
        let split = ChallengeBuilder::new()
            .with_bytes(b"ab")
            .with_bytes(b"cd")
            .finish();
        assert_ne!(joined, split);
        assert_eq!(joined, ChallengeBuilder::new().with_bytes(b"abcd").finish());
    }
}
