#![allow(dead_code)]

use bls12_381::Scalar;
use bolt_channels::{
    protocol, setup, setup_with_engine, ChannelState, CustState, MerchState, Result,
};
use bolt_crypto::{
    pedersen::{Commitment, PedersenParameters},
    pointcheval_sanders::{self, BlindedSignature},
    proofs::{OpeningProof, RangeParameters, UpdateProof, UpdateStatement, UpdateWitness},
    schnorr, BlindingFactor, Bls12Engine, CryptoEngine, Error, Message, Rng, Verification,
};
use rand::SeedableRng;
use std::cell::Cell;

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

// Show protocol logs when running with RUST_LOG set.
pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

// A merchant and customer on a fresh channel, not yet established.
pub fn new_channel<E: CryptoEngine>(
    rng: &mut impl Rng,
    channel: &ChannelState<E>,
    customer_balance: u64,
    merchant_balance: u64,
) -> (CustState, MerchState) {
    let (token, merchant) = MerchState::init(&mut *rng, channel, merchant_balance, "merchant")
        .expect("merchant init");
    let (_, customer) = CustState::init(
        &mut *rng,
        channel,
        &token,
        customer_balance,
        merchant_balance,
        "customer",
    )
    .expect("customer init");
    (customer, merchant)
}

// An established channel on the reference engine.
pub fn established(
    rng: &mut impl Rng,
    customer_balance: u64,
    merchant_balance: u64,
) -> (ChannelState, CustState, MerchState) {
    init_logging();
    let channel = setup("test channel", false).expect("setup");
    let (mut customer, mut merchant) =
        new_channel(&mut *rng, &channel, customer_balance, merchant_balance);
    protocol::establish(&mut *rng, &channel, &mut customer, &mut merchant).expect("establish");
    (channel, customer, merchant)
}

/// Engine operations a [`FaultyEngine`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    BlindSigningKeypair,
    SigningKeypair,
    Commit,
    ExtendCommitment,
    ProveOpening,
    VerifyOpening,
    RangeParameters,
    ProveUpdate,
    VerifyUpdate,
    BlindSign,
    Unblind,
    VerifyBlindSignature,
    Randomize,
    Sign,
    Verify,
}

impl Op {
    pub const ALL: [Op; 15] = [
        Op::BlindSigningKeypair,
        Op::SigningKeypair,
        Op::Commit,
        Op::ExtendCommitment,
        Op::ProveOpening,
        Op::VerifyOpening,
        Op::RangeParameters,
        Op::ProveUpdate,
        Op::VerifyUpdate,
        Op::BlindSign,
        Op::Unblind,
        Op::VerifyBlindSignature,
        Op::Randomize,
        Op::Sign,
        Op::Verify,
    ];
}

/// The reference engine, except that it can be told to fail the next call of one operation.
#[derive(Debug, Default)]
pub struct FaultyEngine {
    inner: Bls12Engine,
    armed: Cell<Option<Op>>,
}

impl FaultyEngine {
    pub fn fail_next(&self, op: Op) {
        self.armed.set(Some(op));
    }

    pub fn disarm(&self) {
        self.armed.set(None);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get().is_some()
    }

    fn check(&self, op: Op) -> std::result::Result<(), Error> {
        if self.armed.get() == Some(op) {
            self.armed.set(None);
            Err(Error::Fault(format!("injected {:?} fault", op)))
        } else {
            Ok(())
        }
    }
}

impl CryptoEngine for FaultyEngine {
    fn blind_signing_keypair<const N: usize>(
        &self,
        rng: &mut impl Rng,
    ) -> std::result::Result<pointcheval_sanders::KeyPair<N>, Error> {
        self.check(Op::BlindSigningKeypair)?;
        self.inner.blind_signing_keypair(rng)
    }

    fn signing_keypair(&self, rng: &mut impl Rng) -> std::result::Result<schnorr::KeyPair, Error> {
        self.check(Op::SigningKeypair)?;
        self.inner.signing_keypair(rng)
    }

    fn commit<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        msg: &Message<N>,
        bf: BlindingFactor,
    ) -> std::result::Result<Commitment, Error> {
        self.check(Op::Commit)?;
        self.inner.commit(params, msg, bf)
    }

    fn extend_commitment<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        index: usize,
        value: Scalar,
    ) -> std::result::Result<Commitment, Error> {
        self.check(Op::ExtendCommitment)?;
        self.inner.extend_commitment(params, commitment, index, value)
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
    ) -> std::result::Result<OpeningProof<N>, Error> {
        self.check(Op::ProveOpening)?;
        self.inner
            .prove_opening(rng, params, msg, bf, commitment, reveal, context)
    }

    fn verify_opening<const N: usize>(
        &self,
        params: &PedersenParameters<N>,
        commitment: &Commitment,
        proof: &OpeningProof<N>,
        expected: &[(usize, Scalar)],
        context: &[u8],
    ) -> std::result::Result<Verification, Error> {
        self.check(Op::VerifyOpening)?;
        self.inner
            .verify_opening(params, commitment, proof, expected, context)
    }

    fn range_parameters(
        &self,
        rng: &mut impl Rng,
    ) -> std::result::Result<RangeParameters, Error> {
        self.check(Op::RangeParameters)?;
        self.inner.range_parameters(rng)
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
    ) -> std::result::Result<UpdateProof<N>, Error> {
        self.check(Op::ProveUpdate)?;
        self.inner.prove_update(
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
    ) -> std::result::Result<Verification, Error> {
        self.check(Op::VerifyUpdate)?;
        self.inner
            .verify_update(public_key, range_parameters, statement, commitment, proof, context)
    }

    fn blind_sign<const N: usize>(
        &self,
        rng: &mut impl Rng,
        keypair: &pointcheval_sanders::KeyPair<N>,
        commitment: &Commitment,
    ) -> std::result::Result<BlindedSignature, Error> {
        self.check(Op::BlindSign)?;
        self.inner.blind_sign(rng, keypair, commitment)
    }

    fn unblind(
        &self,
        signature: BlindedSignature,
        bf: BlindingFactor,
    ) -> std::result::Result<pointcheval_sanders::Signature, Error> {
        self.check(Op::Unblind)?;
        self.inner.unblind(signature, bf)
    }

    fn verify_blind_signature<const N: usize>(
        &self,
        public_key: &pointcheval_sanders::PublicKey<N>,
        msg: &Message<N>,
        signature: &pointcheval_sanders::Signature,
    ) -> std::result::Result<Verification, Error> {
        self.check(Op::VerifyBlindSignature)?;
        self.inner.verify_blind_signature(public_key, msg, signature)
    }

    fn randomize(
        &self,
        rng: &mut impl Rng,
        signature: &pointcheval_sanders::Signature,
    ) -> std::result::Result<pointcheval_sanders::Signature, Error> {
        self.check(Op::Randomize)?;
        self.inner.randomize(rng, signature)
    }

    fn sign(
        &self,
        rng: &mut impl Rng,
        keypair: &schnorr::KeyPair,
        msg: &[u8],
    ) -> std::result::Result<schnorr::Signature, Error> {
        self.check(Op::Sign)?;
        self.inner.sign(rng, keypair, msg)
    }

    fn verify(
        &self,
        public_key: &schnorr::PublicKey,
        msg: &[u8],
        signature: &schnorr::Signature,
    ) -> std::result::Result<Verification, Error> {
        self.check(Op::Verify)?;
        self.inner.verify(public_key, msg, signature)
    }
}

// A channel whose engine can be told to fail.
pub fn faulty_channel() -> ChannelState<FaultyEngine> {
    init_logging();
    setup_with_engine(FaultyEngine::default(), "faulty channel", false).expect("setup")
}

/**
Run `step` with the next `op` failing.

If the step hit the fault, it must have failed with a retriable engine fault and left both sides
as they were; the step is then retried and must succeed. If it never called `op`, it must simply
have succeeded.
*/
pub fn with_fault<T>(
    channel: &ChannelState<FaultyEngine>,
    op: Op,
    customer: &mut CustState,
    merchant: &mut MerchState,
    mut step: impl FnMut(&mut CustState, &mut MerchState) -> Result<T>,
) -> T {
    let (customer_before, merchant_before) = (customer.clone(), merchant.clone());
    channel.engine().fail_next(op);
    match step(customer, merchant) {
        Ok(value) => {
            assert!(channel.engine().is_armed(), "{:?} fault fired but step succeeded", op);
            channel.engine().disarm();
            value
        }
        Err(error) => {
            assert!(
                matches!(error, bolt_channels::Error::CryptoEngineFault(_)),
                "{:?}: unexpected error {}",
                op,
                error
            );
            assert!(error.is_retriable());
            assert_eq!(*customer, customer_before, "{:?} fault changed the customer", op);
            assert_eq!(*merchant, merchant_before, "{:?} fault changed the merchant", op);
            step(customer, merchant).expect("retry after engine fault")
        }
    }
}
