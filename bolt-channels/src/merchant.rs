/*!
The merchant side of a channel.

A merchant's long-term keys live in [`MerchantKeys`] and are shared, read-only, by every channel
the merchant runs. Each channel has its own [`MerchState`], created with [`MerchState::init`] for
the first channel and [`MerchState::new_channel`] for any further one.

The merchant never learns a wallet's revision key until the customer pays from it. It therefore
files the pay token it withholds during a payment under the revision key the customer revealed
in the payment proof, and releases it in exchange for a [`RevokeToken`] on that same key.

The payment proof hides both wallets. The merchant keeps its own books instead: the only wallet
it has pay-signed and not yet seen revoked or paid from is the latest confirmed one, so a valid
proof moves those balances by the amount.

Sharing of [`MerchantKeys`] between channels holds only in memory. Each serialized [`MerchState`]
carries its own copy of the keys, and deserializing two of them yields two separate, equal
copies.
*/

use crate::{
    channel::{validate_name, ChannelId, ChannelState, ChannelToken},
    customer::CustClose,
    dispute::DisputeVerifier,
    error::{ensure, Error, Failure, Result},
    nonce::Nonce,
    proofs::{establish_context, payment_context, EstablishProof, PaymentProof},
    protocol::ChannelStatus,
    revocation::{RevokeToken, Wpk},
    states::{
        close_tag, payment_statement, public_slots, CustomerBalance, MerchantBalance, CLOSE_SLOT,
        WALLET_LEN,
    },
    tokens::{CloseToken, PayToken},
    types::*,
};
use bolt_crypto::proofs::RangeParameters;
use log::{debug, info};
use serde::*;
use std::{collections::HashMap, sync::Arc};

const CLOSE_MESSAGE_DOMAIN: &[u8] = b"bolt-channels/merchant-close";

/// Long-term merchant keys, shared by all of a merchant's channels.
///
/// Serialized with every [`MerchState`] that uses them.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantKeys {
    name: String,
    blind: pointcheval_sanders::KeyPair<WALLET_LEN>,
    signing: schnorr::KeyPair,
    range: RangeParameters,
}

impl MerchantKeys {
    /// The merchant's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The merchant's signing key `pk_m`.
    pub fn public_key(&self) -> &schnorr::PublicKey {
        self.signing.public_key()
    }

    /// The merchant's blind-signature public key.
    pub fn blind_public_key(&self) -> &pointcheval_sanders::PublicKey<WALLET_LEN> {
        self.blind.public_key()
    }
}

/// The balances of one wallet revision, as agreed by the merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Balances {
    customer: CustomerBalance,
    merchant: MerchantBalance,
}

/// The establish commitment that received a close token and awaits its pay token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Establishing {
    commitment: Commitment,
    balances: Balances,
}

/// A payment awaiting the revocation of the wallet it was paid from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PendingPayment {
    pay_token: PayToken,
    balances: Balances,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Confirmed {
    revision: u64,
    balances: Balances,
}

/// Merchant-exclusive state for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchState {
    keys: Arc<MerchantKeys>,
    channel_token: ChannelToken,
    channel_id: Option<ChannelId>,
    initial_balance: MerchantBalance,
    status: ChannelStatus,
    establishing: Option<Establishing>,
    pending: HashMap<Wpk, PendingPayment>,
    revoked: HashMap<Wpk, RevokeToken>,
    confirmed: Option<Confirmed>,
}

/// What a merchant close asserts about the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerchClaim {
    /// The customer closed on a revoked revision; the token proves it.
    Revoked(RevokeToken),
    /// The merchant agrees with the customer's close.
    Confirmed,
    /// The merchant closes on its latest confirmed revision.
    Initiated {
        /// The confirmed revision.
        revision: u64,
        /// Customer balance at that revision.
        customer_balance: CustomerBalance,
        /// Merchant balance at that revision.
        merchant_balance: MerchantBalance,
    },
}

/// The merchant's signed close claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchCloseMessage {
    pub(crate) channel_id: ChannelId,
    pub(crate) address: String,
    pub(crate) wpk: Option<Wpk>,
    pub(crate) claim: MerchClaim,
    pub(crate) signature: schnorr::Signature,
}

impl MerchCloseMessage {
    /// The channel being closed.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// The merchant's payout address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The revision key of the customer close this responds to, if any.
    pub fn wpk(&self) -> Option<&Wpk> {
        self.wpk.as_ref()
    }

    /// The claim.
    pub fn claim(&self) -> &MerchClaim {
        &self.claim
    }

    /// Bytes covered by the merchant's signature.
    pub(crate) fn signed_bytes(
        channel_id: ChannelId,
        address: &str,
        wpk: Option<&Wpk>,
        claim: &MerchClaim,
    ) -> Vec<u8> {
        let mut bytes = CLOSE_MESSAGE_DOMAIN.to_vec();
        bytes.extend_from_slice(&channel_id.to_bytes());
        bytes.extend_from_slice(&(address.len() as u64).to_le_bytes());
        bytes.extend_from_slice(address.as_bytes());
        match wpk {
            Some(wpk) => {
                bytes.push(1);
                bytes.extend_from_slice(&wpk.to_bytes());
            }
            None => bytes.push(0),
        }
        match claim {
            MerchClaim::Revoked(token) => {
                bytes.push(0);
                bytes.extend_from_slice(&token.to_bytes());
            }
            MerchClaim::Confirmed => bytes.push(1),
            MerchClaim::Initiated {
                revision,
                customer_balance,
                merchant_balance,
            } => {
                bytes.push(2);
                bytes.extend_from_slice(&revision.to_le_bytes());
                bytes.extend_from_slice(&customer_balance.into_inner().to_le_bytes());
                bytes.extend_from_slice(&merchant_balance.into_inner().to_le_bytes());
            }
        }
        bytes
    }
}

impl MerchState {
    /// Create a merchant with fresh long-term keys and its first channel.
    ///
    /// Returns the (incomplete) channel token to hand to the customer.
    pub fn init<E: CryptoEngine>(
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        merchant_balance: u64,
        name: &str,
    ) -> Result<(ChannelToken, Self)> {
        validate_name("merchant", name)?;
        let engine = channel.engine();
        let keys = Arc::new(MerchantKeys {
            name: name.to_string(),
            blind: engine.blind_signing_keypair(rng)?,
            signing: engine.signing_keypair(rng)?,
            range: engine.range_parameters(rng)?,
        });
        info!("merchant {:?} initialized on channel {:?}", name, channel.name());
        Ok(Self::with_keys(rng, keys, merchant_balance))
    }

    /// Open a further channel under the same long-term keys.
    ///
    /// The new channel gets its own nonce, so its identifier and every token issued on it are
    /// distinct from this one's.
    pub fn new_channel<E: CryptoEngine>(
        &self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        merchant_balance: u64,
    ) -> (ChannelToken, Self) {
        info!(
            "merchant {:?} opening another channel on {:?}",
            self.keys.name,
            channel.name()
        );
        Self::with_keys(rng, self.keys.clone(), merchant_balance)
    }

    fn with_keys(
        rng: &mut impl Rng,
        keys: Arc<MerchantKeys>,
        merchant_balance: u64,
    ) -> (ChannelToken, Self) {
        let channel_token = ChannelToken::new(
            *keys.signing.public_key(),
            keys.blind.public_key().clone(),
            keys.range.clone(),
            Nonce::new(rng),
        );
        let state = Self {
            keys,
            channel_token: channel_token.clone(),
            channel_id: None,
            initial_balance: MerchantBalance::new(merchant_balance),
            status: ChannelStatus::Created,
            establishing: None,
            pending: HashMap::new(),
            revoked: HashMap::new(),
            confirmed: None,
        };
        (channel_token, state)
    }

    /**
    Issue a close token on the customer's initial wallet.

    Checks that the claimed merchant balance is the one the channel was created with, and that
    `proof` opens `commitment` to a wallet for this channel, the customer key it carries, the
    claimed balances and a cleared close flag. On success the merchant's channel token is completed
    with the customer key.
    */
    pub fn issue_close_token<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        commitment: &Commitment,
        proof: &EstablishProof,
        customer_balance: CustomerBalance,
        merchant_balance: MerchantBalance,
    ) -> Result<CloseToken> {
        if self.status != ChannelStatus::Created {
            return Err(Error::protocol(
                "issue_close_token",
                self.status,
                "channel is already established",
            ));
        }
        ensure(
            (merchant_balance == self.initial_balance).into(),
            Failure::BalanceMismatch,
        )?;

        let channel_token = self.channel_token.with_customer_key(proof.customer_key)?;
        let channel_id = channel_token.channel_id()?;
        let expected = public_slots(
            channel_id,
            &proof.customer_key,
            customer_balance,
            merchant_balance,
        );

        let engine = channel.engine();
        ensure(
            engine.verify_opening(
                &channel_token.pedersen_parameters(),
                commitment,
                &proof.proof,
                &expected,
                &establish_context(channel_id),
            )?,
            Failure::EstablishProof,
        )?;
        let close_token = self.sign_close(rng, engine, &channel_token, commitment)?;

        self.channel_token = channel_token;
        self.channel_id = Some(channel_id);
        self.establishing = Some(Establishing {
            commitment: *commitment,
            balances: Balances {
                customer: customer_balance,
                merchant: merchant_balance,
            },
        });
        debug!("{}: issued establish close token", self.keys.name);
        Ok(close_token)
    }

    /// Issue the pay token on the initial wallet and mark the channel established.
    ///
    /// Requires a close token to have been issued on the same commitment.
    pub fn issue_pay_token<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        commitment: &Commitment,
    ) -> Result<PayToken> {
        const OPERATION: &str = "issue_pay_token";
        if self.status != ChannelStatus::Created {
            return Err(Error::protocol(
                OPERATION,
                self.status,
                "channel is already established",
            ));
        }
        let establishing = match self.establishing {
            Some(establishing) if establishing.commitment == *commitment => establishing,
            Some(_) => {
                return Err(Error::protocol(
                    OPERATION,
                    self.status,
                    "commitment differs from the one issued a close token",
                ))
            }
            None => {
                return Err(Error::protocol(
                    OPERATION,
                    self.status,
                    "no close token has been issued",
                ))
            }
        };

        let pay_token = PayToken::new(channel.engine().blind_sign(
            rng,
            &self.keys.blind,
            commitment,
        )?);

        self.confirmed = Some(Confirmed {
            revision: 0,
            balances: establishing.balances,
        });
        self.status = ChannelStatus::Established;
        info!("{}: channel established", self.keys.name);
        Ok(pay_token)
    }

    /**
    Check a payment proof and issue a close token on the new wallet.

    The proof must show a pay signature from this merchant on a wallet of this channel and
    customer, with the revealed revision key, not paid from before; and the new commitment must
    hold that wallet updated by the amount. The pay token for the new wallet is withheld until
    [`verify_revoke_token`](Self::verify_revoke_token) receives the revocation of the old one.
    */
    pub fn verify_payment_proof<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        proof: &PaymentProof,
    ) -> Result<CloseToken> {
        let (channel_id, confirmed, customer_key) =
            match (self.channel_id, self.confirmed, self.channel_token.customer_key()) {
                (Some(channel_id), Some(confirmed), Some(customer_key))
                    if self.status.is_payable() =>
                {
                    (channel_id, confirmed, *customer_key)
                }
                _ => {
                    return Err(Error::protocol(
                        "verify_payment_proof",
                        self.status,
                        "channel is not open",
                    ))
                }
            };
        let old_wpk = proof.old_wpk;
        ensure(
            (!self.revoked.contains_key(&old_wpk) && !self.pending.contains_key(&old_wpk)).into(),
            Failure::RevisionReused,
        )?;

        let engine = channel.engine();
        ensure(
            engine.verify_update(
                self.channel_token.blind_key(),
                self.channel_token.range_parameters(),
                &payment_statement(channel_id, &customer_key, &old_wpk, proof.amount)?,
                &proof.commitment,
                &proof.proof,
                &payment_context(channel_id, &old_wpk, proof.amount),
            )?,
            Failure::PaymentProof,
        )?;
        let balances = Balances {
            customer: confirmed.balances.customer.apply(proof.amount)?,
            merchant: confirmed.balances.merchant.apply(proof.amount)?,
        };

        let close_token = self.sign_close(rng, engine, &self.channel_token, &proof.commitment)?;
        let pay_token = PayToken::new(engine.blind_sign(rng, &self.keys.blind, &proof.commitment)?);

        let _ = self.pending.insert(
            old_wpk,
            PendingPayment {
                pay_token,
                balances,
            },
        );
        debug!(
            "{}: accepted payment of {:?}, awaiting revocation",
            self.keys.name, proof.amount
        );
        Ok(close_token)
    }

    /// Check a revoke token and release the pay token withheld for the payment it completes.
    pub fn verify_revoke_token<E: CryptoEngine>(
        &mut self,
        channel: &ChannelState<E>,
        revoke_token: &RevokeToken,
    ) -> Result<PayToken> {
        let (channel_id, confirmed) = match (self.channel_id, self.confirmed) {
            (Some(channel_id), Some(confirmed)) if self.status.is_payable() => {
                (channel_id, confirmed)
            }
            _ => {
                return Err(Error::protocol(
                    "verify_revoke_token",
                    self.status,
                    "channel is not open",
                ))
            }
        };
        let pending = *self
            .pending
            .get(revoke_token.wpk())
            .ok_or(Failure::UnknownRevision)?;
        ensure(
            revoke_token.verify(channel.engine(), channel_id)?,
            Failure::RevokeToken,
        )?;

        let _ = self.pending.remove(revoke_token.wpk());
        let _ = self.revoked.insert(*revoke_token.wpk(), *revoke_token);
        let revision = confirmed.revision + 1;
        self.confirmed = Some(Confirmed {
            revision,
            balances: pending.balances,
        });
        self.status = ChannelStatus::Open(revision);
        info!(
            "{}: revision {} confirmed, balances {}/{}",
            self.keys.name,
            revision,
            pending.balances.customer.into_inner(),
            pending.balances.merchant.into_inner()
        );
        Ok(pending.pay_token)
    }

    /**
    Produce the merchant's close message, paying out to `address`.

    In response to a customer close, the message either carries the revoke token for the closed
    revision, if the merchant holds one, or confirms the close. Without a customer close, it claims
    the merchant's latest confirmed balances. Returns the revision key the message is bound to, if
    any.
    */
    pub fn close<E: CryptoEngine>(
        &mut self,
        rng: &mut impl Rng,
        channel: &ChannelState<E>,
        address: &str,
        cust_close: Option<&CustClose>,
    ) -> Result<(Option<Wpk>, MerchCloseMessage)> {
        const OPERATION: &str = "close";
        let (channel_id, confirmed) = match (self.channel_id, self.confirmed) {
            (Some(channel_id), Some(confirmed)) if self.status != ChannelStatus::Closed => {
                (channel_id, confirmed)
            }
            _ => {
                return Err(Error::protocol(
                    OPERATION,
                    self.status,
                    "channel was never established or is already closed",
                ))
            }
        };
        if address.is_empty() {
            return Err(Error::Serialization("payout address must not be empty".to_string()));
        }

        let engine = channel.engine();
        let (wpk, claim) = match cust_close {
            Some(cust_close) => {
                ensure(
                    DisputeVerifier::new(engine)
                        .verify_cust_close(&self.channel_token, cust_close)?,
                    Failure::CloseMessage,
                )?;
                let claim = match self.revoked.get(cust_close.wpk()) {
                    Some(revoke_token) => MerchClaim::Revoked(*revoke_token),
                    None => MerchClaim::Confirmed,
                };
                (Some(*cust_close.wpk()), claim)
            }
            None => (
                None,
                MerchClaim::Initiated {
                    revision: confirmed.revision,
                    customer_balance: confirmed.balances.customer,
                    merchant_balance: confirmed.balances.merchant,
                },
            ),
        };

        let signature = engine.sign(
            rng,
            &self.keys.signing,
            &MerchCloseMessage::signed_bytes(channel_id, address, wpk.as_ref(), &claim),
        )?;
        let message = MerchCloseMessage {
            channel_id,
            address: address.to_string(),
            wpk,
            claim,
            signature,
        };
        self.status = ChannelStatus::Closing;
        info!("{}: closing with claim {:?}", self.keys.name, message.claim);
        Ok((wpk, message))
    }

    /// Mark a closing channel as settled.
    pub fn finalize_close(&mut self) -> Result<()> {
        if self.status != ChannelStatus::Closing {
            return Err(Error::protocol(
                "finalize_close",
                self.status,
                "channel is not closing",
            ));
        }
        self.status = ChannelStatus::Closed;
        info!("{}: channel closed", self.keys.name);
        Ok(())
    }

    /// The long-term keys this channel runs under.
    ///
    /// Shared with the channels opened through [`new_channel`](Self::new_channel), until this
    /// state is serialized.
    pub fn keys(&self) -> &Arc<MerchantKeys> {
        &self.keys
    }

    /// The merchant's copy of the channel token; complete once a close token has been issued.
    pub fn channel_token(&self) -> &ChannelToken {
        &self.channel_token
    }

    /// The channel identifier, once known.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    /// The merchant's status.
    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// The latest confirmed revision and its balances.
    pub fn confirmed_balances(&self) -> Option<(u64, CustomerBalance, MerchantBalance)> {
        self.confirmed
            .map(|c| (c.revision, c.balances.customer, c.balances.merchant))
    }

    /// Whether the merchant holds a revoke token for `wpk`.
    pub fn is_revoked(&self, wpk: &Wpk) -> bool {
        self.revoked.contains_key(wpk)
    }

    /// The revoke token received for `wpk`, if any.
    pub fn revoke_token(&self, wpk: &Wpk) -> Option<&RevokeToken> {
        self.revoked.get(wpk)
    }

    /// Extend `commitment` with the close tag and blind-sign it.
    fn sign_close<E: CryptoEngine>(
        &self,
        rng: &mut impl Rng,
        engine: &E,
        channel_token: &ChannelToken,
        commitment: &Commitment,
    ) -> Result<CloseToken> {
        let close_commitment = engine.extend_commitment(
            &channel_token.pedersen_parameters(),
            commitment,
            CLOSE_SLOT,
            close_tag(),
        )?;
        Ok(CloseToken::new(engine.blind_sign(
            rng,
            &self.keys.blind,
            &close_commitment,
        )?))
    }
}
