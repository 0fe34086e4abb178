/*!
Sequencing of the customer and merchant handshakes.

Each controller operation checks its own preconditions against the controller's
[`ChannelStatus`] and fails with [`Error::ProtocolState`](crate::Error::ProtocolState) when
invoked out of order. The functions here run the complete establish and pay handshakes
in-process, in the order the protocol requires, for callers that hold both sides (tests,
simulations, or a single-process deployment).
Any failure stops the handshake at the failing step; the failing side is left untouched.
*/

use crate::{
    channel::ChannelState,
    customer::CustState,
    error::Result,
    merchant::MerchState,
    states::PaymentAmount,
    types::*,
};
use log::debug;
use serde::*;
use std::fmt;

/// Lifecycle of a channel, as seen by one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Initialized but not yet funded by a held close token and pay token.
    Created,
    /// Established on the initial balances.
    Established,
    /// At least one payment has completed; the channel is at the given revision.
    Open(u64),
    /// A close has been initiated and awaits settlement.
    Closing,
    /// Settled.
    Closed,
}

impl ChannelStatus {
    /// Whether payments can be made in this status.
    pub fn is_payable(self) -> bool {
        matches!(self, ChannelStatus::Established | ChannelStatus::Open(_))
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Created => f.write_str("created"),
            ChannelStatus::Established => f.write_str("established"),
            ChannelStatus::Open(revision) => write!(f, "open at revision {}", revision),
            ChannelStatus::Closing => f.write_str("closing"),
            ChannelStatus::Closed => f.write_str("closed"),
        }
    }
}

/// Run channel establishment between a customer and a merchant.
///
/// On success both sides are [`ChannelStatus::Established`].
pub fn establish<E: CryptoEngine>(
    rng: &mut impl Rng,
    channel: &ChannelState<E>,
    customer: &mut CustState,
    merchant: &mut MerchState,
) -> Result<()> {
    let (commitment, proof) = customer.establish_generate_proof(rng, channel)?;
    debug!("establish: customer committed to the initial wallet");

    let close_token = merchant.issue_close_token(
        rng,
        channel,
        &commitment,
        &proof,
        customer.customer_balance(),
        customer.merchant_balance(),
    )?;
    customer.verify_close_token(channel, &close_token)?;

    let pay_token = merchant.issue_pay_token(rng, channel, &commitment)?;
    customer.establish_final(channel, &pay_token)
}

/// Run one payment round of `amount` between a customer and a merchant.
///
/// The merchant's pay token for the new revision is only released after it has verified the
/// customer's revocation of the old one.
pub fn pay<E: CryptoEngine>(
    rng: &mut impl Rng,
    channel: &ChannelState<E>,
    customer: &mut CustState,
    merchant: &mut MerchState,
    amount: PaymentAmount,
) -> Result<()> {
    let proof = customer.pay_generate_payment_proof(rng, channel, amount)?;
    let close_token = merchant.verify_payment_proof(rng, channel, &proof)?;
    let revoke_token = customer.pay_generate_revoke_token(rng, channel, &close_token)?;
    let pay_token = merchant.verify_revoke_token(channel, &revoke_token)?;
    customer.pay_verify_payment_token(channel, &pay_token)
}

/// Whether both controllers agree on the channel, which every cross-verification requires.
pub fn tokens_match(customer: &CustState, merchant: &MerchState) -> bool {
    customer.channel_token() == merchant.channel_token()
}
