//! Proofs of knowledge of the opening of a Pedersen commitment, with selective disclosure of
//! message slots.
//!
//! A prover that knows `(m_1, ..., m_n, t)` with `C = h·t + Σ g_i·m_i` proves knowledge of every
//! value while revealing a chosen subset of the `m_i`. The verifier supplies the values it
//! expects in the revealed slots; the proof only verifies if the committed values match.
//!
//! The challenge covers the commitment parameters, the commitment, the prover's scalar
//! commitment, the revealed slots, and caller-chosen context bytes that bind the proof to a
//! particular protocol step and channel.

use crate::{
    common::*,
    pedersen::{Commitment, PedersenParameters},
    proofs::{Challenge, ChallengeBuilder},
    serde::SerializeElement,
    Error, Verification,
};
use ff::Field;
use serde::*;

/// A revealed message slot: its index and the prover's commitment scalar for that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedSlot {
    index: usize,
    #[serde(with = "SerializeElement")]
    commitment_scalar: Scalar,
}

/// Proof of knowledge of the opening of a [`Commitment`], revealing a subset of its slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningProof<const N: usize> {
    #[serde(with = "SerializeElement")]
    scalar_commitment: G1Projective,
    #[serde(with = "SerializeElement")]
    blinding_factor_response: Scalar,
    #[serde(with = "SerializeElement")]
    message_responses: Box<[Scalar; N]>,
    revealed: Vec<RevealedSlot>,
}

impl<const N: usize> OpeningProof<N> {
    /// Prove knowledge of `msg` and `bf` opening `commitment`, revealing the slots listed in
    /// `reveal` (which must be strictly increasing and in range).
    pub fn new(
        rng: &mut impl Rng,
        params: &PedersenParameters<N>,
        msg: &Message<N>,
        bf: BlindingFactor,
        commitment: &Commitment,
        reveal: &[usize],
        context: &[u8],
    ) -> Result<Self, Error> {
        check_indices::<N>(reveal.iter().copied())?;

        let bf_commitment_scalar = Scalar::random(&mut *rng);
        let commitment_scalars: [Scalar; N] = std::array::from_fn(|_| Scalar::random(&mut *rng));
        let scalar_commitment =
            params.h() * bf_commitment_scalar + params.inner_product(&commitment_scalars);

        let revealed: Vec<RevealedSlot> = reveal
            .iter()
            .map(|&index| RevealedSlot {
                index,
                commitment_scalar: commitment_scalars[index],
            })
            .collect();
        let revealed_values: Vec<(usize, Scalar)> =
            reveal.iter().map(|&index| (index, msg[index])).collect();

        let challenge = challenge(
            params,
            commitment,
            &scalar_commitment,
            &revealed_values,
            context,
        )
        .to_scalar();

        Ok(OpeningProof {
            scalar_commitment,
            blinding_factor_response: bf_commitment_scalar + challenge * bf.as_scalar(),
            message_responses: Box::new(std::array::from_fn(|i| {
                commitment_scalars[i] + challenge * msg[i]
            })),
            revealed,
        })
    }

    /// Verify the proof against `commitment`, checking that each revealed slot holds the value the
    /// verifier expects. The expected slots must match the revealed slots exactly, in order.
    pub fn verify(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        expected: &[(usize, Scalar)],
        context: &[u8],
    ) -> Result<Verification, Error> {
        check_indices::<N>(expected.iter().map(|(index, _)| *index))?;

        let slots_match = self.revealed.len() == expected.len()
            && self
                .revealed
                .iter()
                .zip(expected)
                .all(|(slot, (index, _))| slot.index == *index);
        if !slots_match {
            return Ok(Verification::Failed);
        }

        let challenge = challenge(
            params,
            commitment,
            &self.scalar_commitment,
            expected,
            context,
        )
        .to_scalar();

        let opens = params.h() * self.blinding_factor_response
            + params.inner_product(&self.message_responses)
            == self.scalar_commitment + commitment.to_element() * challenge;

        let reveals = self
            .revealed
            .iter()
            .zip(expected)
            .all(|(slot, (index, value))| {
                self.message_responses[*index] == slot.commitment_scalar + challenge * value
            });

        Ok((opens && reveals).into())
    }
}

fn check_indices<const N: usize>(indices: impl Iterator<Item = usize>) -> Result<(), Error> {
    let mut previous = None;
    for index in indices {
        if index >= N || previous.map_or(false, |p| index <= p) {
            return Err(Error::Malformed(format!(
                "revealed slot {} is out of range or out of order",
                index
            )));
        }
        previous = Some(index);
    }
    Ok(())
}

fn challenge<const N: usize>(
    params: &PedersenParameters<N>,
    commitment: &Commitment,
    scalar_commitment: &G1Projective,
    revealed: &[(usize, Scalar)],
    context: &[u8],
) -> Challenge {
    let mut builder = ChallengeBuilder::new()
        .with_bytes(params.to_bytes())
        .with_bytes(commitment.to_bytes())
        .with_bytes(G1Affine::from(scalar_commitment).to_compressed());
    for (index, value) in revealed {
        builder.digest_bytes((*index as u64).to_le_bytes());
        builder.digest_bytes(value.to_bytes());
    }
    builder.with_bytes(context).finish()
}
