//! The cryptographic engine consumed by the channel protocol.
//!
//! [`CryptoEngine`] collects every cryptographic capability the protocol needs behind one seam, so
//! protocol code can be run against an alternative implementation, a deterministic mock, or a
//! wrapper that injects faults. Every operation returns a `Result`: an `Err` means the engine
//! produced no payload and the caller must not act on the request.
//!
//! [`Bls12Engine`] is the reference implementation built from the primitives in this crate.

use crate::{
    common::*,
    pedersen::{Commitment, PedersenParameters},
    pointcheval_sanders::{self, BlindedSignature},
    proofs::{OpeningProof, RangeParameters, UpdateProof, UpdateStatement, UpdateWitness},
    schnorr, Error, Verification,
};
use std::fmt::Debug;

/// Cryptographic capabilities used by the payment channel protocol.
pub trait CryptoEngine: Debug {
    /// Generate a Pointcheval-Sanders keypair for blind signatures on `N`-slot messages.
    fn blind_signing_keypair<const N: usize>(
        &self,
        rng: &mut impl Rng,
    ) -> Result<pointcheval_sanders::KeyPair<N>, Error>;

    /// Generate a Schnorr keypair.
    fn signing_keypair(&self, rng: &mut impl Rng) -> Result<schnorr::KeyPair, Error>;

    /// Commit to `msg` under `params` with blinding factor `bf`.
    fn commit<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        msg: &Message<N>,
        bf: BlindingFactor,
    ) -> Result<Commitment, Error>;

    /// Add `value` at slot `index` of a commitment without opening it.
    fn extend_commitment<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        index: usize,
        value: Scalar,
    ) -> Result<Commitment, Error>;

    /// Prove knowledge of the opening of `commitment`, revealing the slots in `reveal`.
    #[allow(clippy::too_many_arguments)]
    fn prove_opening<const N: usize>(
        &self,
        rng: &mut impl Rng,
        params: &PedersenParameters<N>,
        msg: &Message<N>,
        bf: BlindingFactor,
        commitment: &Commitment,
        reveal: &[usize],
        context: &[u8],
    ) -> Result<OpeningProof<N>, Error>;

    /// Verify an opening proof, checking the revealed slots hold the `expected` values.
    fn verify_opening<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        proof: &OpeningProof<N>,
        expected: &[(usize, Scalar)],
        context: &[u8],
    ) -> Result<Verification, Error>;

    /// Generate parameters for range constraints, signing every digit under a fresh key.
    fn range_parameters(&self, rng: &mut impl Rng) -> Result<RangeParameters, Error>;

    /// Prove that `commitment` opens to `witness.new` and that it relates to the signed
    /// `witness.old` as `statement` says, without revealing either message.
    #[allow(clippy::too_many_arguments)]
    fn prove_update<const N: usize>(
        &self,
        rng: &mut impl Rng,
        public_key: &pointcheval_sanders::PublicKey<N>,
        range_parameters: &RangeParameters,
        statement: &UpdateStatement<N>,
        witness: UpdateWitness<'_, N>,
        commitment: &Commitment,
        context: &[u8],
    ) -> Result<UpdateProof<N>, Error>;

    /// Verify an update proof against `commitment` and the public `statement`.
    fn verify_update<const N: usize>(
        &self,
        public_key: &pointcheval_sanders::PublicKey<N>,
        range_parameters: &RangeParameters,
        statement: &UpdateStatement<N>,
        commitment: &Commitment,
        proof: &UpdateProof<N>,
        context: &[u8],
    ) -> Result<Verification, Error>;

    /// Blind-sign a commitment formed under the Pedersen parameters of `keypair`.
    fn blind_sign<const N: usize>(
        &self,
        rng: &mut impl Rng,
        keypair: &pointcheval_sanders::KeyPair<N>,
        commitment: &Commitment,
    ) -> Result<BlindedSignature, Error>;

    /// Remove the commitment blinding factor from a blind signature.
    fn unblind(
        &self,
        signature: BlindedSignature,
        bf: BlindingFactor,
    ) -> Result<pointcheval_sanders::Signature, Error>;

    /// Verify an unblinded Pointcheval-Sanders signature on `msg`.
    fn verify_blind_signature<const N: usize>(
        &self,
        public_key: &pointcheval_sanders::PublicKey<N>,
        msg: &Message<N>,
        signature: &pointcheval_sanders::Signature,
    ) -> Result<Verification, Error>;

    /// Re-randomize a Pointcheval-Sanders signature so it cannot be linked to the original.
    fn randomize(
        &self,
        rng: &mut impl Rng,
        signature: &pointcheval_sanders::Signature,
    ) -> Result<pointcheval_sanders::Signature, Error>;

    /// Schnorr-sign `msg`.
    fn sign(
        &self,
        rng: &mut impl Rng,
        keypair: &schnorr::KeyPair,
        msg: &[u8],
    ) -> Result<schnorr::Signature, Error>;

    /// Verify a Schnorr signature on `msg`.
    fn verify(
        &self,
        public_key: &schnorr::PublicKey,
        msg: &[u8],
        signature: &schnorr::Signature,
    ) -> Result<Verification, Error>;
}

/// Reference engine over BLS12-381.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bls12Engine;

impl CryptoEngine for Bls12Engine {
    fn blind_signing_keypair<const N: usize>(
        &self,
        rng: &mut impl Rng,
    ) -> Result<pointcheval_sanders::KeyPair<N>, Error> {
        Ok(pointcheval_sanders::KeyPair::new(rng))
    }

    fn signing_keypair(&self, rng: &mut impl Rng) -> Result<schnorr::KeyPair, Error> {
        Ok(schnorr::KeyPair::new(rng))
    }

    fn commit<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        msg: &Message<N>,
        bf: BlindingFactor,
    ) -> Result<Commitment, Error> {
        Ok(params.commit(msg, bf))
    }

    fn extend_commitment<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        index: usize,
        value: Scalar,
    ) -> Result<Commitment, Error> {
        commitment.extend(params, index, value)
    }

    fn prove_opening<const N: usize>(
        &self,
        rng: &mut impl Rng,
        params: &PedersenParameters<N>,
        msg: &Message<N>,
        bf: BlindingFactor,
        commitment: &Commitment,
        reveal: &[usize],
        context: &[u8],
    ) -> Result<OpeningProof<N>, Error> {
        OpeningProof::new(rng, params, msg, bf, commitment, reveal, context)
    }

    fn verify_opening<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        proof: &OpeningProof<N>,
        expected: &[(usize, Scalar)],
        context: &[u8],
    ) -> Result<Verification, Error> {
        proof.verify(params, commitment, expected, context)
    }

    fn range_parameters(&self, rng: &mut impl Rng) -> Result<RangeParameters, Error> {
        Ok(RangeParameters::new(rng))
    }

    fn prove_update<const N: usize>(
        &self,
        rng: &mut impl Rng,
        public_key: &pointcheval_sanders::PublicKey<N>,
        range_parameters: &RangeParameters,
        statement: &UpdateStatement<N>,
        witness: UpdateWitness<'_, N>,
        commitment: &Commitment,
        context: &[u8],
    ) -> Result<UpdateProof<N>, Error> {
        UpdateProof::new(
            rng,
            public_key,
            range_parameters,
            statement,
            witness,
            commitment,
            context,
        )
    }

    fn verify_update<const N: usize>(
        &self,
        public_key: &pointcheval_sanders::PublicKey<N>,
        range_parameters: &RangeParameters,
        statement: &UpdateStatement<N>,
        commitment: &Commitment,
        proof: &UpdateProof<N>,
        context: &[u8],
    ) -> Result<Verification, Error> {
        Ok(proof.verify(public_key, range_parameters, statement, commitment, context))
    }

    fn blind_sign<const N: usize>(
        &self,
        rng: &mut impl Rng,
        keypair: &pointcheval_sanders::KeyPair<N>,
        commitment: &Commitment,
    ) -> Result<BlindedSignature, Error> {
        Ok(keypair.blind_sign(rng, commitment))
    }

    fn unblind(
        &self,
        signature: BlindedSignature,
        bf: BlindingFactor,
    ) -> Result<pointcheval_sanders::Signature, Error> {
        if !signature.is_well_formed() {
            return Err(Error::Malformed("blinded signature has an identity component".into()));
        }
        Ok(signature.unblind(bf))
    }

    fn verify_blind_signature<const N: usize>(
        &self,
        public_key: &pointcheval_sanders::PublicKey<N>,
        msg: &Message<N>,
        signature: &pointcheval_sanders::Signature,
    ) -> Result<Verification, Error> {
        Ok(public_key.verify(msg, signature).into())
    }

    fn randomize(
        &self,
        rng: &mut impl Rng,
        signature: &pointcheval_sanders::Signature,
    ) -> Result<pointcheval_sanders::Signature, Error> {
        Ok(signature.randomize(rng))
    }

    fn sign(
        &self,
        rng: &mut impl Rng,
        keypair: &schnorr::KeyPair,
        msg: &[u8],
    ) -> Result<schnorr::Signature, Error> {
        Ok(keypair.sign(rng, msg))
    }

    fn verify(
        &self,
        public_key: &schnorr::PublicKey,
        msg: &[u8],
        signature: &schnorr::Signature,
    ) -> Result<Verification, Error> {
        Ok(public_key.verify(msg, signature).into())
    }
}
