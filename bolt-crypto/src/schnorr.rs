//! Schnorr signatures over the G1 group of BLS12-381, using the standard generator.
//!
//! These sign arbitrary byte strings. They back the long-term identity keys of both parties and
//! the per-revision wallet keys that the customer later revokes.

use crate::{common::*, hash_to_scalar, serde::SerializeElement};
use serde::*;
use std::hash::{Hash, Hasher};

const SCHNORR_DOMAIN: &[u8] = b"bolt-crypto/schnorr/v1";

/// A Schnorr secret key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(#[serde(with = "SerializeElement")] Scalar);

/// A Schnorr public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "SerializeElement")] G1Affine);

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state)
    }
}

impl PublicKey {
    /// Compressed encoding of the key.
    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.to_compressed()
    }

    /// Verify `signature` on `msg` under this key.
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> bool {
        let c = challenge(&signature.r, &self.0, msg);
        G1Affine::generator() * signature.s == signature.r + self.0 * c
    }
}

/// A Schnorr keypair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair with a non-zero secret.
    pub fn new(rng: &mut impl Rng) -> Self {
        let x = random_non_zero(rng);
        KeyPair {
            secret: SecretKey(x),
            public: PublicKey((G1Affine::generator() * x).into()),
        }
    }

    /// The public half of the keypair.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign `msg`.
    pub fn sign(&self, rng: &mut impl Rng, msg: &[u8]) -> Signature {
        let k = random_non_zero(rng);
        let r: G1Affine = (G1Affine::generator() * k).into();
        let c = challenge(&r, &self.public.0, msg);
        Signature {
            r,
            s: k + c * self.secret.0,
        }
    }
}

/// A Schnorr signature `(R, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "SerializeElement")]
    r: G1Affine,
    #[serde(with = "SerializeElement")]
    s: Scalar,
}

impl Signature {
    /// Convert to a bytewise representation.
    pub fn to_bytes(&self) -> [u8; 80] {
        let mut buf = [0; 80];
        buf[..48].copy_from_slice(&self.r.to_compressed());
        buf[48..].copy_from_slice(&self.s.to_bytes());
        buf
    }
}

fn challenge(r: &G1Affine, public: &G1Affine, msg: &[u8]) -> Scalar {
    let mut bytes = Vec::with_capacity(96 + msg.len());
    bytes.extend_from_slice(&r.to_compressed());
    bytes.extend_from_slice(&public.to_compressed());
    bytes.extend_from_slice(msg);
    hash_to_scalar(SCHNORR_DOMAIN, &bytes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    #[test]
    fn signature_verifies() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let sig = kp.sign(&mut rng, b"revoked");
        assert!(kp.public_key().verify(b"revoked", &sig));
    }

    #[test]
    fn signature_is_bound_to_message_and_key() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let other = KeyPair::new(&mut rng);
        let sig = kp.sign(&mut rng, b"revoked");

        assert!(!kp.public_key().verify(b"revoked!", &sig));
        assert!(!other.public_key().verify(b"revoked", &sig));
    }
}
