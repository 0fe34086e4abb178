//! Proof of knowledge of a Pointcheval-Sanders signature.
//!
//! The prover commits to the signed message in G2, under the public key's G2 generators, and
//! randomizes and blinds the signature with the commitment's blinding factor. The blinded
//! signature verifies against the commitment, and a Schnorr proof shows knowledge of its opening.
//! The verifier learns that the prover holds a signature on some message, and nothing else.

use crate::{
    common::*,
    pointcheval_sanders::{BlindedSignature, PublicKey, Signature},
    proofs::{Challenge, ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use bls12_381::{multi_miller_loop, Gt};
use ff::Field;
use serde::*;

/// Fully constructed proof of knowledge of a signature
/// (that is, of a [`Signature`] and the underlying [`Message`] tuple).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureProof<const N: usize> {
    /// Blinded, randomized version of the signature.
    blinded_signature: BlindedSignature,
    /// Commitment to the signed message in G2.
    #[serde(with = "SerializeElement")]
    message_commitment: G2Projective,
    /// Commitment to the commitment scalars.
    #[serde(with = "SerializeElement")]
    scalar_commitment: G2Projective,
    #[serde(with = "SerializeElement")]
    blinding_factor_response: Scalar,
    #[serde(with = "SerializeElement")]
    message_responses: Box<[Scalar; N]>,
}

/// A partially-built [`SignatureProof`].
///
/// Built up to (but not including) the challenge phase of a Schnorr proof.
#[derive(Debug, Clone)]
pub struct SignatureProofBuilder<const N: usize> {
    message: Message<N>,
    message_blinding_factor: BlindingFactor,
    blinded_signature: BlindedSignature,
    message_commitment: G2Projective,
    scalar_commitment: G2Projective,
    blinding_factor_commitment_scalar: Scalar,
    message_commitment_scalars: Box<[Scalar; N]>,
}

/// `g~·t + Σ Y~_i·m_i` under the G2 half of `params`.
fn commit_in_g2<const N: usize>(
    params: &PublicKey<N>,
    blinding: Scalar,
    scalars: &[Scalar; N],
) -> G2Projective {
    params.g2 * blinding
        + params
            .y2s
            .iter()
            .zip(scalars.iter())
            .map(|(y2, m)| y2 * m)
            .sum::<G2Projective>()
}

impl<const N: usize> SignatureProofBuilder<N> {
    /// Run the commitment phase of a Schnorr-style signature proof
    /// to prove knowledge of the message tuple `message` and the `signature`.
    ///
    /// The `conjunction_commitment_scalars` argument allows the caller to choose particular
    /// commitment scalars to create additional constraints.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        message: Message<N>,
        signature: Signature,
        conjunction_commitment_scalars: &[Option<Scalar>; N],
        params: &PublicKey<N>,
    ) -> Self {
        let message_blinding_factor = BlindingFactor::new(&mut *rng);
        let message_commitment =
            commit_in_g2(params, message_blinding_factor.as_scalar(), &message);

        let blinding_factor_commitment_scalar = Scalar::random(&mut *rng);
        let message_commitment_scalars: [Scalar; N] = std::array::from_fn(|i| {
            conjunction_commitment_scalars[i].unwrap_or_else(|| Scalar::random(&mut *rng))
        });
        let scalar_commitment = commit_in_g2(
            params,
            blinding_factor_commitment_scalar,
            &message_commitment_scalars,
        );

        let blinded_signature = signature.blind_and_randomize(rng, message_blinding_factor);

        Self {
            message,
            message_blinding_factor,
            blinded_signature,
            message_commitment,
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

    /// Executes the response phase of a Schnorr-style signature proof to complete the proof.
    pub fn generate_proof_response(self, challenge: Challenge) -> SignatureProof<N> {
        let challenge = challenge.to_scalar();
        let message_responses = std::array::from_fn(|i| {
            self.message_commitment_scalars[i] + challenge * self.message[i]
        });

        SignatureProof {
            blinded_signature: self.blinded_signature,
            message_commitment: self.message_commitment,
            scalar_commitment: self.scalar_commitment,
            blinding_factor_response: self.blinding_factor_commitment_scalar
                + challenge * self.message_blinding_factor.as_scalar(),
            message_responses: Box::new(message_responses),
        }
    }
}

impl<const N: usize> ChallengeInput for SignatureProofBuilder<N> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.blinded_signature);
        builder.consume(&self.message_commitment);
        builder.consume(&self.scalar_commitment);
    }
}

impl<const N: usize> SignatureProof<N> {
    /// Check that a [`SignatureProof`] is valid.
    ///
    /// Checks that:
    ///
    /// - the blinded signature is correctly formed (first element is non-identity)
    /// - the proof of knowledge of the opening of the message commitment is valid
    /// - the blinded signature verifies against the message commitment
    pub fn verify_knowledge_of_signature(
        &self,
        params: &PublicKey<N>,
        challenge: Challenge,
    ) -> bool {
        let valid_signature = self.blinded_signature.is_well_formed();

        let opens = commit_in_g2(
            params,
            self.blinding_factor_response,
            &self.message_responses,
        ) == self.scalar_commitment + self.message_commitment * challenge.to_scalar();

        // e(sigma1, X~ + C) == e(sigma2, g~)
        let signature = self.blinded_signature.0;
        let signature_matches_commitment = multi_miller_loop(&[
            (
                &signature.sigma1(),
                &G2Affine::from(G2Projective::from(params.x2) + self.message_commitment).into(),
            ),
            (&signature.sigma2(), &(-params.g2).into()),
        ])
        .final_exponentiation()
            == Gt::identity();

        valid_signature && opens && signature_matches_commitment
    }

    /// Get the response scalars corresponding to the message to verify conjunctions of proofs.
    ///
    /// This does not include the response scalar for the blinding factor.
    pub fn conjunction_response_scalars(&self) -> &[Scalar; N] {
        &self.message_responses
    }
}

impl<const N: usize> ChallengeInput for SignatureProof<N> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.blinded_signature);
        builder.consume(&self.message_commitment);
        builder.consume(&self.scalar_commitment);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{pointcheval_sanders::KeyPair, test::rng};

    fn prove<const N: usize>(
        rng: &mut impl Rng,
        kp: &KeyPair<N>,
        msg: Message<N>,
        sig: Signature,
    ) -> (SignatureProof<N>, Challenge) {
        let builder = SignatureProofBuilder::generate_proof_commitments(
            &mut *rng,
            msg,
            sig,
            &[None; N],
            kp.public_key(),
        );
        let challenge = ChallengeBuilder::new().with(&builder).finish();
        (builder.generate_proof_response(challenge), challenge)
    }

    #[test]
    fn signature_proof_verifies() {
        run_signature_proof_verifies::<1>();
        run_signature_proof_verifies::<3>();
        run_signature_proof_verifies::<6>();
    }

    fn run_signature_proof_verifies<const N: usize>() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<N>::random(&mut rng);
        let sig = kp.sign(&mut rng, &msg);

        let (proof, challenge) = prove(&mut rng, &kp, msg, sig);
        assert_eq!(
            ChallengeBuilder::new().with(&proof).finish(),
            challenge,
            "builder and proof feed the challenge differently"
        );
        assert!(proof.verify_knowledge_of_signature(kp.public_key(), challenge));
    }

    #[test]
    fn signature_proof_fails_for_a_different_key() {
        let mut rng = rng();
        let kp = KeyPair::<3>::new(&mut rng);
        let other = KeyPair::<3>::new(&mut rng);
        let msg = Message::random(&mut rng);
        let sig = kp.sign(&mut rng, &msg);

        let (proof, challenge) = prove(&mut rng, &kp, msg, sig);
        assert!(!proof.verify_knowledge_of_signature(other.public_key(), challenge));
    }

    #[test]
    fn signature_proof_requires_a_valid_signature() {
        let mut rng = rng();
        let kp = KeyPair::<3>::new(&mut rng);
        let msg = Message::random(&mut rng);
        let other_msg = Message::random(&mut rng);
        let sig_on_other = kp.sign(&mut rng, &other_msg);

        let (proof, challenge) = prove(&mut rng, &kp, msg, sig_on_other);
        assert!(!proof.verify_knowledge_of_signature(kp.public_key(), challenge));
    }
}
