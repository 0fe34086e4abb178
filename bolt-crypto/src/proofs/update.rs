//! Proof that a committed message is a public update of a hidden, signed message.
//!
//! The prover holds a Pointcheval-Sanders signature on an old message and a commitment, under the
//! signing key's Pedersen parameters, to a new one. An [`UpdateStatement`] says, slot by slot, how
//! the two relate; the [`UpdateProof`] shows that they do without revealing either message or the
//! signature. It is a conjunction of a [`SignatureProof`] on the old message, a
//! [`CommitmentProof`] on the new one, and a [`RangeConstraint`] on each new slot the statement
//! bounds, under one challenge:
//!
//! - slots that are equal, or differ by a public offset, share a commitment scalar across the
//!   signature and commitment proofs;
//! - a slot whose value the verifier knows has its commitment scalar disclosed, so the verifier
//!   can check the response against the value it expects;
//! - a range-constrained slot takes its commitment scalar from the range constraint.

use crate::{
    common::*,
    pedersen::Commitment,
    pointcheval_sanders::{PublicKey, Signature},
    proofs::{
        Challenge, ChallengeBuilder, ChallengeInput, CommitmentProof, CommitmentProofBuilder,
        RangeConstraint, RangeConstraintBuilder, RangeParameters, SignatureProof,
        SignatureProofBuilder,
    },
    serde::SerializeElement,
    Error, Verification,
};
use ff::Field;
use serde::*;

/// How one slot of the new message relates to the same slot of the old message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    /// Both messages hold this value, which the verifier knows.
    Public(Scalar),
    /// The old message holds this value, which the verifier knows; the new value is hidden and
    /// unconstrained.
    Replaced(Scalar),
    /// The new value is the hidden old value plus this public offset.
    Offset(Scalar),
}

impl SlotUpdate {
    /// Whether the commitment scalar of this slot is disclosed in the proof.
    fn is_disclosed(self) -> bool {
        !matches!(self, SlotUpdate::Offset(_))
    }
}

/// The public statement an [`UpdateProof`] is about. Both prover and verifier build it from
/// values they know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatement<const N: usize> {
    slots: [SlotUpdate; N],
    range_constrained: Vec<usize>,
}

impl<const N: usize> UpdateStatement<N> {
    /// A statement relating each slot as given, with no range constraints.
    pub fn new(slots: [SlotUpdate; N]) -> Self {
        Self {
            slots,
            range_constrained: Vec::new(),
        }
    }

    /// Additionally require slot `index` of the new message to lie in `[0, 2^64)`.
    pub fn with_range_constraint(mut self, index: usize) -> Result<Self, Error> {
        if index >= N || self.range_constrained.contains(&index) {
            return Err(Error::Malformed(format!(
                "cannot range-constrain slot {} of a {}-slot message twice or out of range",
                index, N
            )));
        }
        self.range_constrained.push(index);
        Ok(self)
    }

    /// Whether `old` and `new` satisfy the slot relations.
    fn holds(&self, old: &Message<N>, new: &Message<N>) -> bool {
        self.slots
            .iter()
            .zip(old.iter().zip(new.iter()))
            .all(|(slot, (old, new))| match *slot {
                SlotUpdate::Public(value) => *old == value && *new == value,
                SlotUpdate::Replaced(value) => *old == value,
                SlotUpdate::Offset(offset) => *new == old + offset,
            })
    }

    fn disclosed_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_disclosed()).count()
    }
}

impl<const N: usize> ChallengeInput for UpdateStatement<N> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        for slot in self.slots.iter() {
            let (tag, value) = match slot {
                SlotUpdate::Public(value) => (0u8, value),
                SlotUpdate::Replaced(value) => (1, value),
                SlotUpdate::Offset(offset) => (2, offset),
            };
            builder.digest_bytes([tag]);
            builder.consume(value);
        }
        for index in &self.range_constrained {
            builder.digest_bytes((*index as u64).to_le_bytes());
        }
    }
}

/// The prover's secrets for an [`UpdateProof`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateWitness<'a, const N: usize> {
    /// The signed old message.
    pub old: &'a Message<N>,
    /// The signature on `old`.
    pub signature: &'a Signature,
    /// The new message.
    pub new: &'a Message<N>,
    /// The blinding factor of the commitment to `new`.
    pub blinding_factor: BlindingFactor,
}

/// Zero-knowledge proof that a commitment opens to an update of a signed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProof<const N: usize> {
    /// Commitment scalars of the slots whose old value the verifier knows, in slot order.
    #[serde(with = "SerializeElement")]
    disclosed_commitment_scalars: Vec<Scalar>,
    signature_proof: SignatureProof<N>,
    commitment_proof: CommitmentProof<N>,
    range_constraints: Vec<RangeConstraint>,
}

impl<const N: usize> UpdateProof<N> {
    /**
    Prove that `commitment` opens to `witness.new`, that `witness.signature` is a signature under
    `public_key` on `witness.old`, and that the two messages are related as `statement` says.

    Fails with [`Error::Malformed`] if the witness does not satisfy the statement, including a
    range-constrained slot holding a value of 2^64 or more.
    */
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rng: &mut impl Rng,
        public_key: &PublicKey<N>,
        range_parameters: &RangeParameters,
        statement: &UpdateStatement<N>,
        witness: UpdateWitness<'_, N>,
        commitment: &Commitment,
        context: &[u8],
    ) -> Result<Self, Error> {
        if !statement.holds(witness.old, witness.new) {
            return Err(Error::Malformed(
                "messages do not satisfy the update statement".to_string(),
            ));
        }

        let range_builders = statement
            .range_constrained
            .iter()
            .map(|&index| {
                let value = to_u64(witness.new[index]).ok_or_else(|| {
                    Error::Malformed(format!("slot {} is outside the constrained range", index))
                })?;
                RangeConstraintBuilder::generate_constraint_commitments(
                    value,
                    range_parameters,
                    &mut *rng,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Commitment scalars for the new message: from the range constraints where there is one.
        let mut ranged_scalars = [None; N];
        for (&index, builder) in statement.range_constrained.iter().zip(&range_builders) {
            ranged_scalars[index] = Some(builder.commitment_scalar());
        }
        let new_scalars: [Scalar; N] = std::array::from_fn(|i| {
            ranged_scalars[i].unwrap_or_else(|| Scalar::random(&mut *rng))
        });

        // The old message shares them wherever the slot is not replaced outright.
        let old_scalars: [Option<Scalar>; N] = std::array::from_fn(|i| match statement.slots[i] {
            SlotUpdate::Replaced(_) => None,
            SlotUpdate::Public(_) | SlotUpdate::Offset(_) => Some(new_scalars[i]),
        });

        let signature_builder = SignatureProofBuilder::generate_proof_commitments(
            &mut *rng,
            *witness.old,
            *witness.signature,
            &old_scalars,
            public_key,
        );
        let commitment_builder = CommitmentProofBuilder::generate_proof_commitments(
            &mut *rng,
            *witness.new,
            witness.blinding_factor,
            &new_scalars.map(Some),
            &public_key.to_pedersen_parameters(),
        );

        let disclosed_commitment_scalars: Vec<Scalar> = statement
            .slots
            .iter()
            .zip(signature_builder.conjunction_commitment_scalars().iter())
            .filter(|(slot, _)| slot.is_disclosed())
            .map(|(_, scalar)| *scalar)
            .collect();

        let challenge = challenge(
            public_key,
            range_parameters,
            statement,
            commitment,
            &disclosed_commitment_scalars,
            &signature_builder,
            &commitment_builder,
            &range_builders,
            context,
        );

        Ok(Self {
            disclosed_commitment_scalars,
            signature_proof: signature_builder.generate_proof_response(challenge),
            commitment_proof: commitment_builder.generate_proof_response(challenge),
            range_constraints: range_builders
                .into_iter()
                .map(|builder| builder.generate_constraint_response(challenge))
                .collect(),
        })
    }

    /// Verify the proof against `commitment` and the public `statement`.
    pub fn verify(
        &self,
        public_key: &PublicKey<N>,
        range_parameters: &RangeParameters,
        statement: &UpdateStatement<N>,
        commitment: &Commitment,
        context: &[u8],
    ) -> Verification {
        if self.disclosed_commitment_scalars.len() != statement.disclosed_slots()
            || self.range_constraints.len() != statement.range_constrained.len()
        {
            return Verification::Failed;
        }

        let challenge = challenge(
            public_key,
            range_parameters,
            statement,
            commitment,
            &self.disclosed_commitment_scalars,
            &self.signature_proof,
            &self.commitment_proof,
            &self.range_constraints,
            context,
        );
        let c = challenge.to_scalar();
        let old = self.signature_proof.conjunction_response_scalars();
        let new = self.commitment_proof.conjunction_response_scalars();

        let mut disclosed = self.disclosed_commitment_scalars.iter();
        let slots_hold = statement
            .slots
            .iter()
            .enumerate()
            .all(|(i, slot)| match *slot {
                SlotUpdate::Public(value) => disclosed
                    .next()
                    .map_or(false, |k| old[i] == k + c * value && new[i] == old[i]),
                SlotUpdate::Replaced(value) => disclosed
                    .next()
                    .map_or(false, |k| old[i] == k + c * value),
                SlotUpdate::Offset(offset) => new[i] == old[i] + c * offset,
            });

        let ranges_hold = statement
            .range_constrained
            .iter()
            .zip(&self.range_constraints)
            .all(|(&i, range)| range.verify_range_constraint(range_parameters, challenge, new[i]));

        let signature_holds = self
            .signature_proof
            .verify_knowledge_of_signature(public_key, challenge);
        let commitment_holds = self.commitment_proof.verify_knowledge_of_opening(
            &public_key.to_pedersen_parameters(),
            commitment,
            challenge,
        );

        (slots_hold && ranges_hold && signature_holds && commitment_holds).into()
    }
}

#[allow(clippy::too_many_arguments)]
fn challenge<const N: usize, S, C, R>(
    public_key: &PublicKey<N>,
    range_parameters: &RangeParameters,
    statement: &UpdateStatement<N>,
    commitment: &Commitment,
    disclosed_commitment_scalars: &[Scalar],
    signature_proof: &S,
    commitment_proof: &C,
    range_constraints: &[R],
    context: &[u8],
) -> Challenge
where
    S: ChallengeInput,
    C: ChallengeInput,
    R: ChallengeInput,
{
    ChallengeBuilder::new()
        .with(public_key)
        .with(range_parameters.public_key())
        .with(statement)
        .with(commitment)
        .with(disclosed_commitment_scalars)
        .with(signature_proof)
        .with(commitment_proof)
        .with(range_constraints)
        .with_bytes(context)
        .finish()
}

/// The scalar as an integer, if it is less than 2^64.
fn to_u64(scalar: Scalar) -> Option<u64> {
    let bytes = scalar.to_bytes();
    if bytes[8..].iter().any(|&b| b != 0) {
        return None;
    }
    let mut low = [0; 8];
    low.copy_from_slice(&bytes[..8]);
    Some(u64::from_le_bytes(low))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{pointcheval_sanders::KeyPair, test::rng};

    struct Setup {
        kp: KeyPair<4>,
        range: RangeParameters,
        old: Message<4>,
        signature: Signature,
        new: Message<4>,
        bf: BlindingFactor,
        commitment: Commitment,
    }

    // old = [id, serial, 30, 70], new = [id, fresh, 20, 80]
    fn setup(rng: &mut impl Rng) -> Setup {
        let kp = KeyPair::new(&mut *rng);
        let range = RangeParameters::new(&mut *rng);
        let id = Scalar::random(&mut *rng);
        let old = Message::new([id, Scalar::from(5u64), Scalar::from(30u64), Scalar::from(70u64)]);
        let new = Message::new([
            id,
            Scalar::random(&mut *rng),
            Scalar::from(20u64),
            Scalar::from(80u64),
        ]);
        let signature = kp.sign(&mut *rng, &old);
        let bf = BlindingFactor::new(&mut *rng);
        let commitment = kp.public_key().to_pedersen_parameters().commit(&new, bf);
        Setup {
            kp,
            range,
            old,
            signature,
            new,
            bf,
            commitment,
        }
    }

    fn statement(id: Scalar, serial: u64, amount: u64) -> UpdateStatement<4> {
        let amount = Scalar::from(amount);
        UpdateStatement::new([
            SlotUpdate::Public(id),
            SlotUpdate::Replaced(Scalar::from(serial)),
            SlotUpdate::Offset(-amount),
            SlotUpdate::Offset(amount),
        ])
        .with_range_constraint(2)
        .unwrap()
        .with_range_constraint(3)
        .unwrap()
    }

    fn prove(rng: &mut impl Rng, s: &Setup, statement: &UpdateStatement<4>) -> UpdateProof<4> {
        UpdateProof::new(
            rng,
            s.kp.public_key(),
            &s.range,
            statement,
            UpdateWitness {
                old: &s.old,
                signature: &s.signature,
                new: &s.new,
                blinding_factor: s.bf,
            },
            &s.commitment,
            b"context",
        )
        .unwrap()
    }

    #[test]
    fn update_proof_verifies() {
        let mut rng = rng();
        let s = setup(&mut rng);
        let statement = statement(s.old[0], 5, 10);
        let proof = prove(&mut rng, &s, &statement);

        assert!(proof
            .verify(s.kp.public_key(), &s.range, &statement, &s.commitment, b"context")
            .is_verified());
        assert!(!proof
            .verify(s.kp.public_key(), &s.range, &statement, &s.commitment, b"elsewhere")
            .is_verified());
    }

    #[test]
    fn update_proof_is_bound_to_the_statement() {
        let mut rng = rng();
        let s = setup(&mut rng);
        let proof = prove(&mut rng, &s, &statement(s.old[0], 5, 10));
        let verify = |statement: &UpdateStatement<4>| {
            proof
                .verify(s.kp.public_key(), &s.range, statement, &s.commitment, b"context")
                .is_verified()
        };

        assert!(!verify(&statement(s.old[0], 5, 11)));
        assert!(!verify(&statement(s.old[0], 6, 10)));
        assert!(!verify(&statement(Scalar::one(), 5, 10)));
        assert!(!verify(&UpdateStatement::new([
            SlotUpdate::Public(s.old[0]),
            SlotUpdate::Replaced(Scalar::from(5u64)),
            SlotUpdate::Offset(-Scalar::from(10u64)),
            SlotUpdate::Offset(Scalar::from(10u64)),
        ])));
    }

    #[test]
    fn update_proof_rejects_an_unsigned_message() {
        let mut rng = rng();
        let mut s = setup(&mut rng);
        let other = KeyPair::new(&mut rng);
        s.signature = other.sign(&mut rng, &s.old);
        let statement = statement(s.old[0], 5, 10);

        let proof = prove(&mut rng, &s, &statement);
        assert!(!proof
            .verify(s.kp.public_key(), &s.range, &statement, &s.commitment, b"context")
            .is_verified());
    }

    #[test]
    fn prover_refuses_a_false_statement() {
        let mut rng = rng();
        let s = setup(&mut rng);
        // Paying more than the old balance wraps slot 2 below zero, which no range admits.
        let overdrawn = Message::new([
            s.new[0],
            s.new[1],
            -Scalar::from(10u64),
            Scalar::from(110u64),
        ]);

        for (new, statement) in [
            (&s.new, statement(s.old[0], 5, 9)),
            (&overdrawn, statement(s.old[0], 5, 40)),
        ] {
            let result = UpdateProof::new(
                &mut rng,
                s.kp.public_key(),
                &s.range,
                &statement,
                UpdateWitness {
                    old: &s.old,
                    signature: &s.signature,
                    new,
                    blinding_factor: s.bf,
                },
                &s.commitment,
                b"context",
            );
            assert!(matches!(result, Err(Error::Malformed(_))));
        }

        assert!(matches!(
            UpdateStatement::new([SlotUpdate::Offset(Scalar::zero()); 4]).with_range_constraint(4),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            statement(s.old[0], 5, 10).with_range_constraint(2),
            Err(Error::Malformed(_))
        ));
    }
}
