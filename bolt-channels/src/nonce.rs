//! Cryptographically random nonces.
use crate::types::*;
use ff::Field;
use serde::*;

/// A random nonce chosen by the merchant for each channel, so that channels sharing a merchant key
/// still get distinct channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(#[serde(with = "SerializeElement")] Scalar);

impl Nonce {
    /// Generate a new cryptographically random nonce with the given random number generator. This
    /// is not part of the public API and may change between major releases.
    #[doc(hidden)]
    pub fn new(rng: &mut impl Rng) -> Self {
        Self(Scalar::random(rng))
    }

    /// Canonical byte encoding of the nonce.
    pub(crate) fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }
}
