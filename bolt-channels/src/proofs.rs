/*!
The proofs a customer sends the merchant during establish and pay.

These proofs are formed by the customer and demonstrate that a wallet commitment is well formed
with respect to values the merchant already knows. The establish proof reveals every wallet slot
except the revision key. The payment proof reveals nothing about either wallet beyond the old
revision key, which the merchant needs to detect reuse. In both cases the merchant learns a
revision's `wpk` only when the customer pays from it. Each proof is bound to its protocol step and
channel through the proof context.
*/

use crate::{
    channel::ChannelId,
    revocation::Wpk,
    states::{PaymentAmount, WALLET_LEN},
    types::*,
};
use bolt_crypto::proofs::{OpeningProof, UpdateProof};
use serde::*;

/**
An establish proof demonstrates that a customer is initializing a channel correctly.

It carries the customer's public key, so that the merchant can complete its copy of the channel
token, and proves knowledge of the opening of the initial wallet commitment with the channel
identifier, customer key, balances and cleared close flag revealed.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishProof {
    pub(crate) customer_key: schnorr::PublicKey,
    pub(crate) proof: OpeningProof<WALLET_LEN>,
}

impl EstablishProof {
    /// The customer key the proof is for.
    pub fn customer_key(&self) -> &schnorr::PublicKey {
        &self.customer_key
    }
}

/**
A payment proof demonstrates that a customer is updating a signed wallet by exactly the requested
amount.

It reveals only the amount and the revision key of the wallet being paid from. It proves that the
customer holds a pay signature on some wallet with that revision key, for this channel and
customer, and that the commitment to the new wallet carries the same channel and customer, the
balances moved by the amount, a cleared close flag, and no negative balance.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub(crate) amount: PaymentAmount,
    pub(crate) old_wpk: Wpk,
    pub(crate) commitment: Commitment,
    pub(crate) proof: UpdateProof<WALLET_LEN>,
}

impl PaymentProof {
    /// The amount being paid.
    pub fn amount(&self) -> PaymentAmount {
        self.amount
    }

    /// The revision key of the wallet being paid from.
    pub fn old_wpk(&self) -> &Wpk {
        &self.old_wpk
    }

    /// Commitment to the new wallet.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}

pub(crate) fn establish_context(channel_id: ChannelId) -> Vec<u8> {
    let mut context = b"bolt-channels/establish".to_vec();
    context.extend_from_slice(&channel_id.to_bytes());
    context
}

pub(crate) fn payment_context(
    channel_id: ChannelId,
    old_wpk: &Wpk,
    amount: PaymentAmount,
) -> Vec<u8> {
    let mut context = b"bolt-channels/pay".to_vec();
    context.extend_from_slice(&channel_id.to_bytes());
    context.extend_from_slice(&old_wpk.to_bytes());
    context.extend_from_slice(&amount.to_bytes());
    context
}
