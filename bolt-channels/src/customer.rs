/*!
The customer side of a channel.

## Establish

The customer [`init`](CustState::init)s the channel from the merchant's [`ChannelToken`],
completing it with their own public key and committing to the initial [`Wallet`]. They send the
commitment and an [`EstablishProof`] to the merchant
([`establish_generate_proof`](CustState::establish_generate_proof)).

On receiving a valid [`CloseToken`] they hold a signature they can close on
([`verify_close_token`](CustState::verify_close_token)); only then can a [`PayToken`] complete
establishment ([`establish_final`](CustState::establish_final)).

## Pay

Payments have three phases.

1. [`pay_generate_payment_proof`](CustState::pay_generate_payment_proof) derives the next wallet
   revision with a fresh revision key, and proves it is a correct update of the current one
   without revealing either. The current revision stays usable.
2. On receiving a valid close token for the new revision,
   [`pay_generate_revoke_token`](CustState::pay_generate_revoke_token) revokes the current
   revision and discards its secret. This is the point of no return; the channel is locked.
3. [`pay_verify_payment_token`](CustState::pay_verify_payment_token) checks the merchant's pay
   token on the new revision and unlocks the channel for the next payment.

## Close

[`close`](CustState::close) packages the latest revision the customer holds a close signature for
into a [`CustClose`]. After a payment has been started but before the old revision is revoked,
that is the old revision, and the started payment is abandoned. Once closing, no pay step runs.
*/

use crate::{
    channel::{validate_name, ChannelId, ChannelState, ChannelToken},
    error::{ensure, Error, Failure, Result},
    proofs::{establish_context, payment_context, EstablishProof, PaymentProof},
    protocol::ChannelStatus,
    revocation::{RevocationKeyPair, RevokeToken, Wpk},
    states::{
        payment_statement, CustomerBalance, MerchantBalance, PaymentAmount, Wallet, PUBLIC_SLOTS,
    },
    tokens::{CloseSignature, CloseToken, PaySignature, PayToken},
    types::*,
};
use bolt_crypto::proofs::UpdateWitness;
use log::{debug, info, warn};
use serde::*;
use std::collections::BTreeMap;

/// One wallet revision and the secrets needed to use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Revision {
    wallet: Wallet,
    revocation: RevocationKeyPair,
    blinding_factor: BlindingFactor,
    commitment: Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum PaymentPhase {
    /// No payment in flight.
    Idle,
    /// A payment proof was sent; the next revision awaits a close token.
    Started(Box<Revision>),
    /// The previous revision was revoked; the current one awaits its pay token.
    Locked,
}

/// Customer-exclusive channel state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustState {
    name: String,
    keypair: schnorr::KeyPair,
    channel_token: ChannelToken,
    channel_id: ChannelId,
    status: ChannelStatus,
    revision: u64,
    current: Revision,
    phase: PaymentPhase,
    close_signatures: BTreeMap<u64, CloseSignature>,
    pay_signatures: BTreeMap<u64, PaySignature>,
}

/// A customer's closing package: enough to settle the channel on the customer's latest balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustClose {
    pub(crate) wpk: Wpk,
    pub(crate) wallet: Wallet,
    pub(crate) signature: CloseSignature,
}

impl CustClose {
    /// The revision key of the wallet being closed on.
    pub fn wpk(&self) -> &Wpk {
        &self.wpk
    }

    /// The close wallet.
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// The merchant's (re-randomized) signature on the close wallet.
    pub fn signature(&self) -> &CloseSignature {
        &self.signature
    }
}

impl CustState {
    /// Join the channel described by the merchant's `channel_token`.
    ///
    /// Generates the customer keypair, binds it into the token, and commits to the initial
    /// wallet. Returns the completed token, which the merchant learns from the establish proof.
    pub fn init<E: CryptoEngine>(
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        channel_token: &ChannelToken,
        customer_balance: u64,
        merchant_balance: u64,
        name: &str,
    ) -> Result<(ChannelToken, Self)> {
        validate_name("customer", name)?;
        let engine = channel.engine();

        let keypair = engine.signing_keypair(rng)?;
        let channel_token = channel_token.with_customer_key(*keypair.public_key())?;
        let channel_id = channel_token.channel_id()?;

        let revocation = RevocationKeyPair::new(engine, rng)?;
        let wallet = Wallet::new(
            channel_id,
            *keypair.public_key(),
            revocation.wpk(),
            CustomerBalance::new(customer_balance),
            MerchantBalance::new(merchant_balance),
        );
        let current = commit_to(engine, rng, &channel_token, wallet, revocation)?;

        info!(
            "customer {:?} joined channel {:?} with balances {}/{}",
            name,
            channel.name(),
            customer_balance,
            merchant_balance
        );
        let state = CustState {
            name: name.to_string(),
            keypair,
            channel_token: channel_token.clone(),
            channel_id,
            status: ChannelStatus::Created,
            revision: 0,
            current,
            phase: PaymentPhase::Idle,
            close_signatures: BTreeMap::new(),
            pay_signatures: BTreeMap::new(),
        };
        Ok((channel_token, state))
    }

    /// Produce the commitment to the initial wallet and the proof the merchant needs to sign it.
    pub fn establish_generate_proof<E: CryptoEngine>(
        &self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
    ) -> Result<(Commitment, EstablishProof)> {
        self.require_status("establish_generate_proof", ChannelStatus::Created)?;

        let proof = channel.engine().prove_opening(
            rng,
            &self.channel_token.pedersen_parameters(),
            &self.current.wallet.to_message(),
            self.current.blinding_factor,
            &self.current.commitment,
            &PUBLIC_SLOTS,
            &establish_context(self.channel_id),
        )?;
        debug!("{}: generated establish proof", self.name);

        Ok((
            self.current.commitment,
            EstablishProof {
                customer_key: *self.keypair.public_key(),
                proof,
            },
        ))
    }

    /// Check the merchant's close token on the initial wallet and keep it.
    pub fn verify_close_token<E: CryptoEngine>(
        &mut self,
        channel: &ChannelState<E>,
        close_token: &CloseToken,
    ) -> Result<()> {
        self.require_status("verify_close_token", ChannelStatus::Created)?;

        let signature = self.check_close_token(channel, &self.current, close_token)?;
        let _ = self.close_signatures.insert(self.revision, signature);
        debug!("{}: holding close token for the initial wallet", self.name);
        Ok(())
    }

    /// Check the merchant's pay token on the initial wallet and complete establishment.
    ///
    /// Requires a valid close token to be held already.
    pub fn establish_final<E: CryptoEngine>(
        &mut self,
        channel: &ChannelState<E>,
        pay_token: &PayToken,
    ) -> Result<()> {
        self.require_status("establish_final", ChannelStatus::Created)?;
        if !self.close_signatures.contains_key(&self.revision) {
            return Err(Error::protocol(
                "establish_final",
                self.status,
                "no close token is held for the initial wallet",
            ));
        }

        let signature = self.check_pay_token(channel, pay_token)?;
        let _ = self.pay_signatures.insert(self.revision, signature);
        self.status = ChannelStatus::Established;
        info!("{}: channel established", self.name);
        Ok(())
    }

    /// Start a payment of `amount`.
    ///
    /// Derives the next wallet revision under a fresh revision key, and proves to the merchant
    /// that it is a correct update of the current, signed wallet. The current revision remains
    /// usable until [`pay_generate_revoke_token`](Self::pay_generate_revoke_token). Restarting
    /// a payment that has not yet been locked replaces the pending revision.
    pub fn pay_generate_payment_proof<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        amount: PaymentAmount,
    ) -> Result<PaymentProof> {
        const OPERATION: &str = "pay_generate_payment_proof";
        if !self.status.is_payable() {
            return Err(Error::protocol(OPERATION, self.status, "channel is not open"));
        }
        if self.phase == PaymentPhase::Locked {
            return Err(Error::protocol(
                OPERATION,
                self.status,
                "the previous payment is awaiting its pay token",
            ));
        }
        let pay_signature = self.pay_signatures.get(&self.revision).ok_or_else(|| {
            Error::protocol(OPERATION, self.status, "no pay token is held for this wallet")
        })?;

        let engine = channel.engine();
        let revocation = RevocationKeyPair::new(engine, rng)?;
        let wallet = self.current.wallet.apply_payment(amount, revocation.wpk())?;
        let next = commit_to(engine, rng, &self.channel_token, wallet, revocation)?;

        let old_wpk = *self.current.wallet.wpk();
        let proof = engine.prove_update(
            rng,
            self.channel_token.blind_key(),
            self.channel_token.range_parameters(),
            &payment_statement(self.channel_id, self.keypair.public_key(), &old_wpk, amount)?,
            UpdateWitness {
                old: &self.current.wallet.to_message(),
                signature: pay_signature.as_signature(),
                new: &next.wallet.to_message(),
                blinding_factor: next.blinding_factor,
            },
            &next.commitment,
            &payment_context(self.channel_id, &old_wpk, amount),
        )?;

        let payment_proof = PaymentProof {
            amount,
            old_wpk,
            commitment: next.commitment,
            proof,
        };
        self.phase = PaymentPhase::Started(Box::new(next));
        debug!("{}: started payment of {:?}", self.name, amount);
        Ok(payment_proof)
    }

    /// Revoke the current revision in exchange for the close token on the pending one.
    ///
    /// The close token is checked against the pending revision before anything else happens; the
    /// current revision's secret key is only consumed once that check passes. On success the
    /// pending revision becomes current and the channel is locked until
    /// [`pay_verify_payment_token`](Self::pay_verify_payment_token).
    pub fn pay_generate_revoke_token<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        close_token: &CloseToken,
    ) -> Result<RevokeToken> {
        const OPERATION: &str = "pay_generate_revoke_token";
        if !self.status.is_payable() {
            return Err(Error::protocol(OPERATION, self.status, "channel is not open"));
        }
        let next = match &self.phase {
            PaymentPhase::Started(next) => next,
            _ => {
                return Err(Error::protocol(
                    OPERATION,
                    self.status,
                    "no payment has been started",
                ))
            }
        };

        let close_signature = self.check_close_token(channel, next, close_token)?;
        let revoke_token = self.current.revocation.clone().revoke(
            channel.engine(),
            rng,
            self.channel_id,
        )?;

        // Commit point: the old revision and its secret key are dropped here.
        if let PaymentPhase::Started(next) =
            std::mem::replace(&mut self.phase, PaymentPhase::Locked)
        {
            self.current = *next;
        }
        self.revision += 1;
        let _ = self.close_signatures.insert(self.revision, close_signature);
        info!(
            "{}: revoked revision {}, now at revision {}",
            self.name,
            self.revision - 1,
            self.revision
        );
        Ok(revoke_token)
    }

    /// Check the pay token released by the merchant and unlock the channel.
    pub fn pay_verify_payment_token<E: CryptoEngine>(
        &mut self,
        channel: &ChannelState<E>,
        pay_token: &PayToken,
    ) -> Result<()> {
        const OPERATION: &str = "pay_verify_payment_token";
        if !self.status.is_payable() {
            return Err(Error::protocol(OPERATION, self.status, "channel is not open"));
        }
        if self.phase != PaymentPhase::Locked {
            return Err(Error::protocol(
                OPERATION,
                self.status,
                "no payment is awaiting a pay token",
            ));
        }

        let signature = self.check_pay_token(channel, pay_token)?;
        let _ = self.pay_signatures.insert(self.revision, signature);
        self.phase = PaymentPhase::Idle;
        self.status = ChannelStatus::Open(self.revision);
        info!(
            "{}: payment complete, balances {}/{}",
            self.name,
            self.customer_balance().into_inner(),
            self.merchant_balance().into_inner()
        );
        Ok(())
    }

    /// Package the current wallet for unilateral close.
    ///
    /// A started payment is abandoned: its pending revision is dropped, so the revision being
    /// closed on can never be revoked afterwards.
    pub fn close<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
    ) -> Result<CustClose> {
        if self.status == ChannelStatus::Closed {
            return Err(Error::protocol("close", self.status, "channel is already closed"));
        }
        let signature = self.close_signatures.get(&self.revision).ok_or_else(|| {
            Error::protocol("close", self.status, "no close token is held for this wallet")
        })?;

        let signature = signature.randomize(channel.engine(), rng)?;
        let cust_close = CustClose {
            wpk: *self.current.wallet.wpk(),
            wallet: self.current.wallet.close_wallet(),
            signature,
        };
        if let PaymentPhase::Started(_) = self.phase {
            warn!("{}: abandoning a started payment to close", self.name);
            self.phase = PaymentPhase::Idle;
        }
        self.status = ChannelStatus::Closing;
        info!("{}: closing on revision {}", self.name, self.revision);
        Ok(cust_close)
    }

    /// Mark a closing channel as settled.
    pub fn finalize_close(&mut self) -> Result<()> {
        self.require_status("finalize_close", ChannelStatus::Closing)?;
        self.status = ChannelStatus::Closed;
        info!("{}: channel closed", self.name);
        Ok(())
    }

    /// The customer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The completed channel token.
    pub fn channel_token(&self) -> &ChannelToken {
        &self.channel_token
    }

    /// The channel identifier.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// The customer's status.
    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// Index of the current wallet revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The current wallet.
    pub fn wallet(&self) -> &Wallet {
        &self.current.wallet
    }

    /// The customer balance of the current wallet.
    pub fn customer_balance(&self) -> CustomerBalance {
        self.current.wallet.customer_balance()
    }

    /// The merchant balance of the current wallet.
    pub fn merchant_balance(&self) -> MerchantBalance {
        self.current.wallet.merchant_balance()
    }

    /// The revision key of the current wallet.
    pub fn wpk(&self) -> &Wpk {
        self.current.wallet.wpk()
    }

    /// Whether a payment has been started and not yet locked.
    pub fn has_pending_payment(&self) -> bool {
        matches!(self.phase, PaymentPhase::Started(_))
    }

    /// The close signature received for a revision.
    pub fn close_signature(&self, revision: u64) -> Option<&CloseSignature> {
        self.close_signatures.get(&revision)
    }

    /// The pay signature received for a revision.
    pub fn pay_signature(&self, revision: u64) -> Option<&PaySignature> {
        self.pay_signatures.get(&revision)
    }

    fn require_status(&self, operation: &'static str, required: ChannelStatus) -> Result<()> {
        if self.status == required {
            Ok(())
        } else {
            Err(Error::protocol(operation, self.status, "channel is in the wrong state"))
        }
    }

    /// Unblind a close token for `revision` and check it against the close wallet.
    fn check_close_token<E: CryptoEngine>(
        &self,
        channel: &ChannelState<E>,
        revision: &Revision,
        close_token: &CloseToken,
    ) -> Result<CloseSignature> {
        let engine = channel.engine();
        let signature = close_token.unblind(engine, revision.blinding_factor)?;
        ensure(
            engine.verify_blind_signature(
                self.channel_token.blind_key(),
                &revision.wallet.close_wallet().to_message(),
                signature.as_signature(),
            )?,
            Failure::CloseToken,
        )?;
        Ok(signature)
    }

    /// Unblind a pay token for the current revision and check it against the wallet.
    fn check_pay_token<E: CryptoEngine>(
        &self,
        channel: &ChannelState<E>,
        pay_token: &PayToken,
    ) -> Result<PaySignature> {
        let engine = channel.engine();
        let signature = pay_token.unblind(engine, self.current.blinding_factor)?;
        ensure(
            engine.verify_blind_signature(
                self.channel_token.blind_key(),
                &self.current.wallet.to_message(),
                signature.as_signature(),
            )?,
            Failure::PayToken,
        )?;
        Ok(signature)
    }
}

/// Commit to a wallet under a fresh blinding factor.
fn commit_to<E: CryptoEngine>(
    engine: &E,
    rng: &mut impl Rng,
    channel_token: &ChannelToken,
    wallet: Wallet,
    revocation: RevocationKeyPair,
) -> Result<Revision> {
    let blinding_factor = BlindingFactor::new(rng);
    let commitment = engine.commit(
        &channel_token.pedersen_parameters(),
        &wallet.to_message(),
        blinding_factor,
    )?;
    Ok(Revision {
        wallet,
        revocation,
        blinding_factor,
        commitment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{merchant::MerchState, protocol, setup, test::rng};

    fn established(rng: &mut impl Rng) -> (ChannelState, CustState, MerchState) {
        let channel = setup("channel", false).unwrap();
        let (token, mut merchant) = MerchState::init(&mut *rng, &channel, 50, "merchant").unwrap();
        let (_, mut customer) =
            CustState::init(&mut *rng, &channel, &token, 50, 50, "customer").unwrap();
        protocol::establish(&mut *rng, &channel, &mut customer, &mut merchant).unwrap();
        (channel, customer, merchant)
    }

    #[test]
    fn payment_requires_establishment() {
        let mut rng = rng();
        let channel = setup("channel", false).unwrap();
        let (token, _) = MerchState::init(&mut rng, &channel, 50, "merchant").unwrap();
        let (_, mut customer) =
            CustState::init(&mut rng, &channel, &token, 50, 50, "customer").unwrap();

        let error = customer
            .pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(1))
            .unwrap_err();
        assert!(matches!(error, Error::ProtocolState { .. }));
    }

    #[test]
    fn revocation_requires_a_started_payment() {
        let mut rng = rng();
        let (channel, mut customer, mut merchant) = established(&mut rng);
        let proof = customer
            .pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(5))
            .unwrap();
        let close_token = merchant
            .verify_payment_proof(&mut rng, &channel, &proof)
            .unwrap();

        let mut idle = customer.clone();
        idle.phase = PaymentPhase::Idle;
        assert!(matches!(
            idle.pay_generate_revoke_token(&mut rng, &channel, &close_token),
            Err(Error::ProtocolState { .. })
        ));

        let _ = customer
            .pay_generate_revoke_token(&mut rng, &channel, &close_token)
            .unwrap();
        assert_eq!(customer.revision(), 1);
        assert_eq!(customer.customer_balance(), CustomerBalance::new(45));
    }

    #[test]
    fn revocation_checks_the_close_token_before_discarding_the_old_key() {
        let mut rng = rng();
        let (channel, mut customer, mut merchant) = established(&mut rng);
        let first = customer
            .pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(5))
            .unwrap();
        let stale_token = merchant
            .verify_payment_proof(&mut rng, &channel, &first)
            .unwrap();

        // Restarting the payment replaces the pending revision, so the earlier token no longer
        // matches it.
        let _ = customer
            .pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(5))
            .unwrap();
        let before = customer.clone();
        assert_eq!(
            customer.pay_generate_revoke_token(&mut rng, &channel, &stale_token),
            Err(Failure::CloseToken.into())
        );
        assert_eq!(customer, before);
        assert!(customer.has_pending_payment());
    }

    #[test]
    fn locked_channel_rejects_a_new_payment() {
        let mut rng = rng();
        let (channel, mut customer, mut merchant) = established(&mut rng);
        let proof = customer
            .pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(5))
            .unwrap();
        let close_token = merchant
            .verify_payment_proof(&mut rng, &channel, &proof)
            .unwrap();
        let _ = customer
            .pay_generate_revoke_token(&mut rng, &channel, &close_token)
            .unwrap();

        assert!(matches!(
            customer.pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(1)),
            Err(Error::ProtocolState { .. })
        ));
    }

    #[test]
    fn close_uses_the_latest_held_close_token() {
        let mut rng = rng();
        let (channel, mut customer, _) = established(&mut rng);
        let _ = customer
            .pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(5))
            .unwrap();

        let close = customer.close(&mut rng, &channel).unwrap();
        assert_eq!(close.wallet().customer_balance(), CustomerBalance::new(50));
        assert!(close.wallet().is_close());
        assert_ne!(Some(close.signature()), customer.close_signature(0));
        assert_eq!(customer.status(), ChannelStatus::Closing);

        assert!(!customer.has_pending_payment());

        customer.finalize_close().unwrap();
        assert!(customer.close(&mut rng, &channel).is_err());
    }
}
