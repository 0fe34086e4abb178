//! Proof of knowledge of the opening of a commitment, for use in conjunctions.
//!
//! Unlike [`OpeningProof`](crate::proofs::OpeningProof), this proof reveals nothing and computes
//! no challenge of its own. The caller links it to other proofs by choosing commitment scalars and
//! builds one challenge over all of them.

use crate::{
    common::*,
    pedersen::{Commitment, PedersenParameters},
    proofs::{Challenge, ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use ff::Field;
use serde::*;

/// Fully constructed proof of knowledge of the opening of a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentProof<const N: usize> {
    /// The commitment to the commitment scalars.
    #[serde(with = "SerializeElement")]
    scalar_commitment: G1Projective,
    /// The response scalar for the blinding factor, conceptually prepended to the tuple of response
    /// scalars for this commitment proof.
    #[serde(with = "SerializeElement")]
    blinding_factor_response_scalar: Scalar,
    /// The remaining response scalars.
    #[serde(with = "SerializeElement")]
    message_response_scalars: Box<[Scalar; N]>,
}

impl<const N: usize> CommitmentProof<N> {
    /// Verify knowledge of the opening of `commitment`.
    pub fn verify_knowledge_of_opening(
        &self,
        pedersen_params: &PedersenParameters<N>,
        commitment: &Commitment,
        challenge: Challenge,
    ) -> bool {
        let rhs = pedersen_params.h() * self.blinding_factor_response_scalar
            + pedersen_params.inner_product(&self.message_response_scalars);
        rhs == self.scalar_commitment + commitment.to_element() * challenge.to_scalar()
    }

    /// Get the response scalars corresponding to the message to verify conjunctions of proofs.
    ///
    /// This does not include the response scalar for the blinding factor.
    pub fn conjunction_response_scalars(&self) -> &[Scalar; N] {
        &self.message_response_scalars
    }
}

impl<const N: usize> ChallengeInput for CommitmentProof<N> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.scalar_commitment);
    }
}

/// A partially-built [`CommitmentProof`].
///
/// Built up to (but not including) the challenge phase of a Schnorr proof.
#[derive(Debug, Clone)]
pub struct CommitmentProofBuilder<const N: usize> {
    msg: Message<N>,
    message_blinding_factor: BlindingFactor,
    scalar_commitment: G1Projective,
    blinding_factor_commitment_scalar: Scalar,
    message_commitment_scalars: Box<[Scalar; N]>,
}

impl<const N: usize> CommitmentProofBuilder<N> {
    /// Run the commitment phase of a Schnorr-style proof of knowledge of the opening `(msg, bf)`
    /// of a commitment.
    ///
    /// The `conjunction_commitment_scalars` argument allows the caller to choose particular
    /// commitment scalars for the message tuple. Equality of two message elements across proofs
    /// is enforced by using the same commitment scalar for both; a public offset between them is
    /// checked by the caller from the response scalars.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        msg: Message<N>,
        bf: BlindingFactor,
        conjunction_commitment_scalars: &[Option<Scalar>; N],
        pedersen_params: &PedersenParameters<N>,
    ) -> Self {
        let blinding_factor_commitment_scalar = Scalar::random(&mut *rng);
        let message_commitment_scalars: [Scalar; N] = std::array::from_fn(|i| {
            conjunction_commitment_scalars[i].unwrap_or_else(|| Scalar::random(&mut *rng))
        });
        let scalar_commitment = pedersen_params.h() * blinding_factor_commitment_scalar
            + pedersen_params.inner_product(&message_commitment_scalars);

        Self {
            msg,
            message_blinding_factor: bf,
            scalar_commitment,
            blinding_factor_commitment_scalar,
            message_commitment_scalars: Box::new(message_commitment_scalars),
        }
    }

    /// Get the commitment scalars corresponding to the message tuple to use when constructing
    /// conjunctions of proofs.
    ///
    /// This does not include the commitment scalar corresponding to the blinding factor.
    pub fn conjunction_commitment_scalars(&self) -> &[Scalar; N] {
        &self.message_commitment_scalars
    }

    /// Run the response phase of the Schnorr-style commitment proof to complete the proof.
    pub fn generate_proof_response(self, challenge: Challenge) -> CommitmentProof<N> {
        let challenge = challenge.to_scalar();
        let message_response_scalars = std::array::from_fn(|i| {
            self.message_commitment_scalars[i] + challenge * self.msg[i]
        });

        CommitmentProof {
            scalar_commitment: self.scalar_commitment,
            blinding_factor_response_scalar: self.blinding_factor_commitment_scalar
                + challenge * self.message_blinding_factor.as_scalar(),
            message_response_scalars: Box::new(message_response_scalars),
        }
    }
}

impl<const N: usize> ChallengeInput for CommitmentProofBuilder<N> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.scalar_commitment);
    }
}
