//! Pedersen commitments \[1\] over the G1 group of BLS12-381 \[2\].
//!
//! Commitments are formed with [`PedersenParameters::commit`] and checked with
//! [`Commitment::verify_opening`]. Parameters are either sampled uniformly at random with
//! [`PedersenParameters::new`] or derived from a Pointcheval-Sanders public key, which is how the
//! wallet commitments are made signable by the merchant.
//! ```
//! # use bolt_crypto::{BlindingFactor, Message, pedersen::PedersenParameters};
//! # let mut rng = rand::thread_rng();
//! let params = PedersenParameters::<5>::new(&mut rng);
//! let msg = Message::<5>::random(&mut rng);
//! let bf = BlindingFactor::new(&mut rng);
//! let commitment = params.commit(&msg, bf);
//! assert!(commitment.verify_opening(&params, bf, &msg).is_verified());
//! ```
//!
//! ## References
//!
//! 1. Torben Pyrds Pedersen. "Non-interactive and information-theoretic secure verifiable secret
//!    sharing". 1992. URL: <https://www.cs.cornell.edu/courses/cs754/2001fa/129.PDF>
//!
//! 2. D. Boneh, S. Gorbunov, R. Wahby, H. Wee, and Z. Zhang. "BLS Signatures, Version 4".
//!    Internet-draft, IETF. 2021. URL:
//!    <https://datatracker.ietf.org/doc/html/draft-irtf-cfrg-bls-signature-04>

use crate::{common::*, serde::SerializeElement, Error, Verification};
use serde::{Deserialize, Serialize};

/// A Pedersen commitment to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "SerializeElement")] pub(crate) G1Projective);

impl Commitment {
    /// Verify a provided opening of the commitment.
    pub fn verify_opening<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        bf: BlindingFactor,
        msg: &Message<N>,
    ) -> Verification {
        (params.commit(msg, bf) == *self).into()
    }

    /// Add `value` to the committed message at position `index`, without knowing the opening.
    ///
    /// The result opens to the original message with `value` added at `index`, under the same
    /// blinding factor.
    pub fn extend<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        index: usize,
        value: Scalar,
    ) -> Result<Self, Error> {
        let g = params.gs.get(index).ok_or_else(|| {
            Error::Malformed(format!("message index {} out of range for {} slots", index, N))
        })?;
        Ok(Commitment(self.0 + g * value))
    }

    /// Get the inner group element representing the commitment.
    pub fn to_element(self) -> G1Projective {
        self.0
    }

    /// Compressed encoding of the commitment.
    pub fn to_bytes(&self) -> [u8; 48] {
        G1Affine::from(self.0).to_compressed()
    }
}

/// Parameters for Pedersen commitments over G1.
///
/// Uses Box to avoid stack overflows with large parameter sets.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PedersenParameters<const N: usize> {
    #[serde(with = "SerializeElement")]
    pub(crate) h: G1Projective,
    #[serde(with = "SerializeElement")]
    pub(crate) gs: Box<[G1Affine; N]>,
}

impl<const N: usize> PedersenParameters<N> {
    /// Generate a new, random set of Pedersen parameters.
    ///
    /// These are chosen uniformly at random, such that no discrete logarithm relationships
    /// are known among the generators.
    pub fn new(rng: &mut impl Rng) -> Self {
        let h: G1Projective = random_non_identity(&mut *rng);
        let gs = std::array::from_fn(|_| {
            let g: G1Projective = random_non_identity(&mut *rng);
            G1Affine::from(g)
        });
        Self {
            h,
            gs: Box::new(gs),
        }
    }

    /// Form a commitment to a message and blinding factor.
    pub fn commit(&self, msg: &Message<N>, bf: BlindingFactor) -> Commitment {
        Commitment(self.h * bf.as_scalar() + self.inner_product(msg))
    }

    /// The generator used for the blinding factor.
    pub fn h(&self) -> G1Projective {
        self.h
    }

    /// The generators used for each message slot.
    pub fn gs(&self) -> &[G1Affine; N] {
        &self.gs
    }

    /// Σ g_i · m_i over the message slots.
    pub(crate) fn inner_product(&self, scalars: &[Scalar; N]) -> G1Projective {
        self.gs
            .iter()
            .zip(scalars.iter())
            .map(|(g, m)| g * m)
            .sum()
    }

    /// Concatenated compressed encodings of every generator, for hashing into challenges.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(48 * (N + 1));
        buf.extend_from_slice(&G1Affine::from(self.h).to_compressed());
        for g in self.gs.iter() {
            buf.extend_from_slice(&g.to_compressed());
        }
        buf
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;
    use ff::Field;

    #[test]
    fn commit_opens() {
        let mut rng = rng();
        let params = PedersenParameters::<3>::new(&mut rng);
        let msg = Message::random(&mut rng);
        let bf = BlindingFactor::new(&mut rng);

        let com = params.commit(&msg, bf);
        assert!(com.verify_opening(&params, bf, &msg).is_verified());
    }

    #[test]
    fn commit_does_not_open_on_wrong_msg() {
        let mut rng = rng();
        let params = PedersenParameters::<3>::new(&mut rng);
        let msg = Message::random(&mut rng);
        let bf = BlindingFactor::new(&mut rng);
        let bad_msg = Message::random(&mut rng);
        assert_ne!(
            &*msg, &*bad_msg,
            "unfortunate RNG seed: bad_msg should be different"
        );

        let com = params.commit(&msg, bf);
        assert!(!com.verify_opening(&params, bf, &bad_msg).is_verified());
    }

    #[test]
    fn commit_does_not_open_on_wrong_bf() {
        let mut rng = rng();
        let params = PedersenParameters::<3>::new(&mut rng);
        let msg = Message::random(&mut rng);
        let bf = BlindingFactor::new(&mut rng);
        let bad_bf = BlindingFactor::new(&mut rng);

        let com = params.commit(&msg, bf);
        assert!(!com.verify_opening(&params, bad_bf, &msg).is_verified());
    }

    #[test]
    fn extended_commitment_opens_to_extended_message() {
        let mut rng = rng();
        let params = PedersenParameters::<3>::new(&mut rng);
        let mut scalars = [Scalar::random(&mut rng), Scalar::random(&mut rng), Scalar::zero()];
        let bf = BlindingFactor::new(&mut rng);
        let com = params.commit(&Message::new(scalars), bf);

        let tag = Scalar::random(&mut rng);
        let extended = com.extend(&params, 2, tag).unwrap();
        scalars[2] = tag;

        assert!(extended
            .verify_opening(&params, bf, &Message::new(scalars))
            .is_verified());
        assert!(matches!(
            com.extend(&params, 3, tag),
            Err(Error::Malformed(_))
        ));
    }
}
