//! This crate defines the cryptographic engine used by the bidirectional payment channel protocol
//! and a reference implementation of it over the pairing-friendly curve BLS12-381:
//! - Pedersen commitments instantiated using G1.
//! - Pointcheval Sanders signatures and blind signatures (CT-RSA 2016).
//! - Schnorr signatures over G1, used for long-term and per-revision signing keys.
//! - Schnorr-style proofs of knowledge of a commitment opening with selective disclosure.
//! - Zero-knowledge proofs of knowledge of a signature, with range constraints, combined into
//!   proofs that a commitment holds a public update of a hidden, signed message.
//!
//! The protocol layer only talks to these primitives through the [`CryptoEngine`] trait, so an
//! alternative engine (or a mock) can be injected without touching protocol code.

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod engine;
pub mod pedersen;
pub mod pointcheval_sanders;
pub mod proofs;
pub mod schnorr;

mod serde;

pub use crate::engine::{Bls12Engine, CryptoEngine};
pub use crate::serde::SerializeElement;

use crate::common::*;
use ::serde::*;
use ff::Field;
use sha3::{Digest, Sha3_512};
use std::ops::Deref;
use thiserror::*;

/// Error types that may arise from cryptographic operations.
///
/// Every [`CryptoEngine`] operation returns one of these in place of its payload when it cannot
/// produce a result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caused by a request whose shape does not match what the operation expects.
    #[error("expected a message of length {expected}, got {got}")]
    MessageLengthMismatch {
        /// The length of the parameters, and expected length of the message.
        expected: usize,
        /// The actual length of the message.
        got: usize,
    },
    /// Caused by a request that is structurally invalid (e.g. an out-of-range message index or an
    /// element that fails to decode).
    #[error("malformed request: {0}")]
    Malformed(String),
    /// An internal failure of the engine that is not attributable to its inputs.
    #[error("engine fault: {0}")]
    Fault(String),
}

/// The result of a verification of some property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "the result of a verification should always be checked"]
pub enum Verification {
    /// A verification succeeded.
    Verified,
    /// A verification failed.
    Failed,
}

impl From<bool> for Verification {
    fn from(b: bool) -> Self {
        if b {
            Verification::Verified
        } else {
            Verification::Failed
        }
    }
}

impl Verification {
    /// Whether the verification succeeded.
    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }
}

/// Fixed-length message type used across schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<const N: usize>([Scalar; N]);

impl<const N: usize> Deref for Message<N> {
    type Target = [Scalar; N];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> Message<N> {
    /// Create a new message from an array of scalars.
    pub fn new(scalars: [Scalar; N]) -> Self {
        Message(scalars)
    }

    /// Create a message of uniformly random scalars.
    pub fn random(rng: &mut impl Rng) -> Self {
        Message(std::array::from_fn(|_| Scalar::random(&mut *rng)))
    }
}

impl From<Scalar> for Message<1> {
    fn from(scalar: Scalar) -> Self {
        Self([scalar])
    }
}

/// Blinding factor for a commitment, message, or signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindingFactor(#[serde(with = "SerializeElement")] Scalar);

impl BlindingFactor {
    /// Generate a new blinding factor uniformly at random from the set of possible [`Scalar`]s.
    pub fn new(rng: &mut impl Rng) -> Self {
        Self(Scalar::random(rng))
    }

    /// Construct a blinding factor from the scalar representing it.
    ///
    /// **warning:** this should never be used unless unblinding something!
    pub fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    /// Convert to the inner scalar representing this blinding factor.
    pub fn as_scalar(&self) -> Scalar {
        self.0
    }
}

/// Hash arbitrary bytes to a [`Scalar`] under a domain separation tag.
///
/// The 512-bit SHA3 digest is reduced modulo the group order, so the output is close to uniform.
pub fn hash_to_scalar(domain: &[u8], bytes: &[u8]) -> Scalar {
    let digest = Sha3_512::new()
        .chain((domain.len() as u64).to_le_bytes())
        .chain(domain)
        .chain(bytes)
        .finalize();
    let mut wide = [0; 64];
    wide.copy_from_slice(digest.as_ref());
    Scalar::from_bytes_wide(&wide)
}

pub use common::Rng;

mod common {
    //! Common types used internally.

    pub use crate::{BlindingFactor, Message};
    pub use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
    pub use group::Group;

    /// A trait synonym for a cryptographically secure random number generator. This trait is
    /// blanket-implemented for all valid types and will never need to be implemented by-hand.
    pub trait Rng: rand_core::CryptoRng + rand_core::RngCore {}
    impl<T: rand_core::CryptoRng + rand_core::RngCore> Rng for T {}

    /// Select a non-identity element from the group uniformly at random.
    pub fn random_non_identity<G>(rng: &mut impl Rng) -> G
    where
        G: Group<Scalar = Scalar>,
    {
        loop {
            let g = G::random(&mut *rng);
            if !bool::from(g.is_identity()) {
                return g;
            }
        }
    }

    /// Select a non-zero scalar uniformly at random.
    pub fn random_non_zero(rng: &mut impl Rng) -> Scalar {
        use ff::Field;
        loop {
            let r = Scalar::random(&mut *rng);
            if !r.is_zero() {
                return r;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use rand::SeedableRng;

    /// Seeded rng for replicable tests.
    pub fn rng() -> impl crate::Rng {
        const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
        rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_to_scalar_separates_domains() {
        let a = hash_to_scalar(b"domain-a", b"payload");
        let b = hash_to_scalar(b"domain-b", b"payload");
        let c = hash_to_scalar(b"domain-a", b"payload");
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn verification_from_bool() {
        assert!(Verification::from(true).is_verified());
        assert!(!Verification::from(false).is_verified());
    }
}
