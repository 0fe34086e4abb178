/*!
Stateless adjudication of unilateral closes.

A [`DisputeVerifier`] holds nothing but a reference to the engine, and checks close artifacts
against the public [`ChannelToken`] alone. It is meant for an arbiter or watchtower that sees the
closes both parties publish and has to decide how to split the channel.

When both sides publish, the claim bound to the highest confirmed revision wins. A merchant that
holds the revoke token for the revision the customer closed on proves the customer's close is
stale, and takes the whole channel.
*/

use crate::{
    channel::ChannelToken,
    customer::CustClose,
    error::{Failure, Result},
    merchant::{MerchClaim, MerchCloseMessage},
    revocation::Wpk,
    states::{CustomerBalance, MerchantBalance, Wallet},
    tokens::CloseSignature,
    types::*,
};
use log::{debug, warn};
use serde::*;

/// Verifies close messages against a channel token.
#[derive(Debug, Clone, Copy)]
pub struct DisputeVerifier<'a, E> {
    engine: &'a E,
}

/// Final payout of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Paid to the customer.
    pub customer_balance: CustomerBalance,
    /// Paid to the merchant.
    pub merchant_balance: MerchantBalance,
}

impl<'a, E: CryptoEngine> DisputeVerifier<'a, E> {
    /// A verifier using `engine` for all signature checks.
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /**
    Check a customer's close claim.

    Valid if `wallet` is a close wallet for the channel `channel_token` describes, carries `wpk`,
    and `signature` is the merchant's signature on it.

    Fails with [`Error::Serialization`](crate::Error::Serialization) if the token is incomplete.
    */
    pub fn verify_cust_close_message(
        &self,
        channel_token: &ChannelToken,
        wpk: &Wpk,
        wallet: &Wallet,
        signature: &CloseSignature,
    ) -> Result<Verification> {
        let channel_id = channel_token.channel_id()?;
        if !wallet.is_close()
            || wallet.wpk() != wpk
            || wallet.channel_id() != channel_id
            || channel_token.customer_key() != Some(wallet.customer_key())
        {
            return Ok(Verification::Failed);
        }
        Ok(self.engine.verify_blind_signature(
            channel_token.blind_key(),
            &wallet.to_message(),
            signature.as_signature(),
        )?)
    }

    /// Check a customer's closing package.
    pub fn verify_cust_close(
        &self,
        channel_token: &ChannelToken,
        cust_close: &CustClose,
    ) -> Result<Verification> {
        self.verify_cust_close_message(
            channel_token,
            cust_close.wpk(),
            cust_close.wallet(),
            cust_close.signature(),
        )
    }

    /**
    Check a merchant's close claim, bound to the customer close with revision key `wpk` (or to no
    customer close, if `None`).

    The message must be signed under the merchant key of `channel_token`. A revocation claim is
    only valid if its revoke token is for `wpk` and verifies; a confirmation needs a `wpk` and an
    independent claim must not have one.
    */
    pub fn verify_merch_close_message(
        &self,
        channel_token: &ChannelToken,
        wpk: Option<&Wpk>,
        message: &MerchCloseMessage,
    ) -> Result<Verification> {
        let channel_id = channel_token.channel_id()?;
        if message.channel_id != channel_id || message.wpk.as_ref() != wpk {
            return Ok(Verification::Failed);
        }

        let claim_is_consistent = match (&message.claim, wpk) {
            (MerchClaim::Revoked(revoke_token), Some(wpk)) => {
                revoke_token.wpk() == wpk
                    && revoke_token.verify(self.engine, channel_id)?.is_verified()
            }
            (MerchClaim::Confirmed, Some(_)) => true,
            (MerchClaim::Initiated { .. }, None) => true,
            _ => false,
        };
        if !claim_is_consistent {
            return Ok(Verification::Failed);
        }

        Ok(self.engine.verify(
            channel_token.merchant_key(),
            &MerchCloseMessage::signed_bytes(
                message.channel_id,
                &message.address,
                message.wpk.as_ref(),
                &message.claim,
            ),
            &message.signature,
        )?)
    }

    /**
    Decide the payout of a channel from the closes each side published.

    1. A valid merchant revocation claim against the customer's close awards the whole channel to
       the merchant.
    2. Otherwise a valid customer close settles on its wallet.
    3. Otherwise a valid merchant-initiated close settles on the merchant's confirmed balances.

    Fails with [`Failure::CloseMessage`] if no submitted close is valid.
    */
    pub fn resolve(
        &self,
        channel_token: &ChannelToken,
        cust_close: Option<&CustClose>,
        merch_close: Option<&MerchCloseMessage>,
    ) -> Result<Settlement> {
        let cust_close = match cust_close {
            Some(close) if self.verify_cust_close(channel_token, close)?.is_verified() => {
                Some(close)
            }
            Some(_) => {
                warn!("ignoring invalid customer close");
                None
            }
            None => None,
        };
        let merch_close = match merch_close {
            Some(message)
                if self
                    .verify_merch_close_message(channel_token, message.wpk(), message)?
                    .is_verified() =>
            {
                Some(message)
            }
            Some(_) => {
                warn!("ignoring invalid merchant close");
                None
            }
            None => None,
        };

        match (cust_close, merch_close) {
            (Some(cust_close), Some(message))
                if matches!(message.claim, MerchClaim::Revoked(_))
                    && message.wpk() == Some(cust_close.wpk()) =>
            {
                let wallet = cust_close.wallet();
                let total = wallet
                    .customer_balance()
                    .into_inner()
                    .checked_add(wallet.merchant_balance().into_inner())
                    .ok_or(Failure::BalanceOverflow)?;
                debug!("customer closed on a revoked revision; awarding {} to merchant", total);
                Ok(Settlement {
                    customer_balance: CustomerBalance::new(0),
                    merchant_balance: MerchantBalance::new(total),
                })
            }
            (Some(cust_close), _) => Ok(Settlement {
                customer_balance: cust_close.wallet().customer_balance(),
                merchant_balance: cust_close.wallet().merchant_balance(),
            }),
            (
                None,
                Some(MerchCloseMessage {
                    claim:
                        MerchClaim::Initiated {
                            customer_balance,
                            merchant_balance,
                            ..
                        },
                    ..
                }),
            ) => Ok(Settlement {
                customer_balance: *customer_balance,
                merchant_balance: *merchant_balance,
            }),
            _ => {
                warn!("no valid close to settle on");
                Err(Failure::CloseMessage.into())
            }
        }
    }
}
