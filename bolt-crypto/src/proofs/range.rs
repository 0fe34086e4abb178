//! Schnorr-style constraints that a value lies within the range `[0, 2^64)`.
//!
//! **This range constraint cannot be used alone!** It is only meaningful in conjunction with a
//! [`CommitmentProof`](crate::proofs::CommitmentProof) or
//! [`SignatureProof`](crate::proofs::SignatureProof), to show that a message slot _in that proof_
//! lies within the range.
//!
//! These are Camenisch, Chaabouni, and shelat-style range constraints \[1\] built using standard
//! Schnorr, with single-message Pointcheval-Sanders signatures \[2\] in place of the signature
//! scheme in \[1\]. The prover writes the value in base 256 as 8 digits and shows knowledge of a
//! signature on each digit; signatures exist only on the 256 valid digits, because the verifier
//! signs exactly those once and discards the secret key. The digits are tied to the value through
//! the response scalars: the weighted sum of the digits' responses must equal the value's
//! response in the linked proof.
//!
//! ## References
//!
//! 1. Jan Camenisch, Rafik Chaabouni, and abhi shelat. Efficient protocols for set membership and
//!    range proofs. In Josef Pieprzyk, editor, Advances in Cryptology - ASIACRYPT 2008, pages
//!    234–252, Berlin, Heidelberg, 2008. Springer Berlin Heidelberg.
//!
//! 2. David Pointcheval and Olivier Sanders. Short Randomizable Signatures. In Kazue Sako, editor,
//!    Topics in Cryptology - CT-RSA 2016, volume 9610, pages 111–126. Springer International
//!    Publishing, Cham, 2016.

use crate::{
    common::*,
    pointcheval_sanders::{KeyPair, PublicKey, Signature},
    proofs::{Challenge, ChallengeBuilder, ChallengeInput, SignatureProof, SignatureProofBuilder},
    Error,
};
use arrayvec::ArrayVec;
use serde::*;

/// The arity of the digits used in the range constraint.
const RANGE_BASE: u64 = 256;

/// Number of digits used in the range constraint.
const RANGE_DIGITS: usize = 8;

/// Parameters for use in a [`RangeConstraint`].
///
/// These are generated by the verifier and shared with any potential prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeParameters {
    /// A signature on every digit, indexed by the digit.
    digit_signatures: Vec<Signature>,
    /// Public key corresponding _exclusively_ with the signatures above.
    public_key: PublicKey<1>,
}

impl RangeParameters {
    /// Generate new parameters for use in range constraints.
    ///
    /// This generates a keypair to produce the digit signatures, and discards the secret half
    /// after use so it can never sign anything else.
    pub fn new(rng: &mut impl Rng) -> Self {
        let keypair = KeyPair::<1>::new(&mut *rng);
        let digit_signatures = (0..RANGE_BASE)
            .map(|digit| keypair.sign(&mut *rng, &Message::from(Scalar::from(digit))))
            .collect();

        Self {
            digit_signatures,
            public_key: keypair.public_key().clone(),
        }
    }

    /// Return the public key used to form the digit signatures.
    pub fn public_key(&self) -> &PublicKey<1> {
        &self.public_key
    }
}

/// A partially-built [`RangeConstraint`].
#[derive(Debug, Clone)]
pub struct RangeConstraintBuilder {
    digit_proof_builders: ArrayVec<SignatureProofBuilder<1>, RANGE_DIGITS>,
    commitment_scalar: Scalar,
}

/// Constraint that the base-256 representation of a value has 8 digits.
///
/// This is **not** a complete range proof unless supplied in conjunction with a proof that
/// carries the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConstraint {
    digit_proofs: ArrayVec<SignatureProof<1>, RANGE_DIGITS>,
}

impl RangeConstraintBuilder {
    /// Run the commitment phase of a Schnorr-style range constraint on `value`.
    ///
    /// Fails if `params` does not hold a signature for one of the value's digits.
    pub fn generate_constraint_commitments(
        value: u64,
        params: &RangeParameters,
        rng: &mut impl Rng,
    ) -> Result<Self, Error> {
        let mut decomposing_value = value;
        let mut digit_proof_builders = ArrayVec::new();
        for _ in 0..RANGE_DIGITS {
            let digit = decomposing_value % RANGE_BASE;
            decomposing_value /= RANGE_BASE;

            let signature = params.digit_signatures.get(digit as usize).ok_or_else(|| {
                Error::Malformed(format!("range parameters hold no signature on digit {}", digit))
            })?;
            digit_proof_builders.push(SignatureProofBuilder::generate_proof_commitments(
                &mut *rng,
                Message::from(Scalar::from(digit)),
                *signature,
                &[None],
                &params.public_key,
            ));
        }

        // sum( u^j * commitment_scalar[j] )
        let commitment_scalar = weighted_sum(
            digit_proof_builders
                .iter()
                .map(|builder| builder.conjunction_commitment_scalars()[0]),
        );

        Ok(Self {
            digit_proof_builders,
            commitment_scalar,
        })
    }

    /// Run the response phase of the range constraint.
    pub fn generate_constraint_response(self, challenge: Challenge) -> RangeConstraint {
        RangeConstraint {
            digit_proofs: self
                .digit_proof_builders
                .into_iter()
                .map(|builder| builder.generate_proof_response(challenge))
                .collect(),
        }
    }

    /// The commitment scalar for the value, to be used for it in the linked proof.
    pub fn commitment_scalar(&self) -> Scalar {
        self.commitment_scalar
    }
}

impl ChallengeInput for RangeConstraintBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.digit_proof_builders[..]);
    }
}

impl RangeConstraint {
    /// Verify the digit proofs, and that they add up to the value whose response scalar in the
    /// linked proof is `expected_response_scalar`.
    pub fn verify_range_constraint(
        &self,
        params: &RangeParameters,
        challenge: Challenge,
        expected_response_scalar: Scalar,
    ) -> bool {
        let valid_digits = self.digit_proofs.len() == RANGE_DIGITS
            && self
                .digit_proofs
                .iter()
                .all(|proof| proof.verify_knowledge_of_signature(&params.public_key, challenge));

        let response_scalar = weighted_sum(
            self.digit_proofs
                .iter()
                .map(|proof| proof.conjunction_response_scalars()[0]),
        );

        valid_digits && response_scalar == expected_response_scalar
    }
}

impl ChallengeInput for RangeConstraint {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.digit_proofs[..]);
    }
}

/// `sum( u^j * x_j )` for the digits `x_j`, least significant first.
fn weighted_sum(digits: impl Iterator<Item = Scalar>) -> Scalar {
    let mut sum = Scalar::zero();
    let mut u_pow = Scalar::one();
    for digit in digits {
        sum += u_pow * digit;
        u_pow *= Scalar::from(RANGE_BASE);
    }
    sum
}
