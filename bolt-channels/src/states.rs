/*!
Defines the wallet, the committed state of a channel at one revision, and the balance arithmetic
applied to it by payments.

A [`Wallet`] is encoded as a six-slot message

| slot | content |
|------|---------|
| 0 | channel identifier |
| 1 | hash of the customer's long-term public key |
| 2 | hash of the revision key `wpk` |
| 3 | customer balance |
| 4 | merchant balance |
| 5 | close tag, or zero |

The customer commits to the message with the close slot cleared to obtain a pay token, and the
merchant extends the same commitment with the close tag to sign a close token. The two tokens
therefore share one blinding factor but can never be confused for each other.

A payment replaces slot 2 and moves the amount between slots 3 and 4, leaving every other slot
as it was. [`payment_statement`] describes that update to the proof system, so a merchant can
check it without seeing either wallet.
*/

use crate::{
    channel::ChannelId,
    error::{Failure, Result},
    revocation::Wpk,
    types::*,
};
use bolt_crypto::{
    hash_to_scalar,
    proofs::{SlotUpdate, UpdateStatement},
};
use serde::*;

/// Number of message slots in an encoded [`Wallet`].
pub const WALLET_LEN: usize = 6;

pub(crate) const CLOSE_SLOT: usize = 5;

/// Slots revealed by the establish proof: everything except the revision key.
pub(crate) const PUBLIC_SLOTS: [usize; 5] = [0, 1, 3, 4, 5];

const CUSTOMER_BALANCE_SLOT: usize = 3;
const MERCHANT_BALANCE_SLOT: usize = 4;

/// The constant tag that marks a close wallet.
pub(crate) fn close_tag() -> Scalar {
    hash_to_scalar(b"bolt-channels/close-tag", b"close")
}

/// Map a public key into a message slot.
pub(crate) fn key_scalar(key: &schnorr::PublicKey) -> Scalar {
    hash_to_scalar(b"bolt-channels/public-key", &key.to_bytes())
}

/// The values of [`PUBLIC_SLOTS`] for a pay wallet with the given contents.
///
/// The revision key is not among them, so a verifier can compute these without knowing it.
pub(crate) fn public_slots(
    channel_id: ChannelId,
    customer_key: &schnorr::PublicKey,
    customer_balance: CustomerBalance,
    merchant_balance: MerchantBalance,
) -> Vec<(usize, Scalar)> {
    let values = [
        channel_id.to_scalar(),
        key_scalar(customer_key),
        Scalar::zero(),
        customer_balance.to_scalar(),
        merchant_balance.to_scalar(),
        Scalar::zero(),
    ];
    PUBLIC_SLOTS.iter().map(|&i| (i, values[i])).collect()
}

/// The update a payment of `amount` makes to the pay wallet with revision key `old_wpk`.
///
/// The channel and customer are carried over, the revision key is replaced by a hidden one, the
/// amount moves between the balances, and the close slot stays clear. Both new balances are
/// constrained to be non-negative.
pub(crate) fn payment_statement(
    channel_id: ChannelId,
    customer_key: &schnorr::PublicKey,
    old_wpk: &Wpk,
    amount: PaymentAmount,
) -> Result<UpdateStatement<WALLET_LEN>> {
    let (customer_offset, merchant_offset) = match amount {
        PaymentAmount::ToMerchant(value) => (-Scalar::from(value), Scalar::from(value)),
        PaymentAmount::ToCustomer(value) => (Scalar::from(value), -Scalar::from(value)),
    };
    Ok(UpdateStatement::new([
        SlotUpdate::Public(channel_id.to_scalar()),
        SlotUpdate::Public(key_scalar(customer_key)),
        SlotUpdate::Replaced(key_scalar(old_wpk.as_public_key())),
        SlotUpdate::Offset(customer_offset),
        SlotUpdate::Offset(merchant_offset),
        SlotUpdate::Public(Scalar::zero()),
    ])
    .with_range_constraint(CUSTOMER_BALANCE_SLOT)?
    .with_range_constraint(MERCHANT_BALANCE_SLOT)?)
}

/// Channel balance for merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MerchantBalance(u64);

impl MerchantBalance {
    /// Wrap a balance.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The balance as an integer.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Apply a payment: payments to the merchant increase the balance and refunds decrease it.
    pub fn apply(self, amount: PaymentAmount) -> Result<Self> {
        match amount {
            PaymentAmount::ToMerchant(value) => self
                .0
                .checked_add(value)
                .map(Self)
                .ok_or_else(|| Failure::BalanceOverflow.into()),
            PaymentAmount::ToCustomer(value) => self.0.checked_sub(value).map(Self).ok_or_else(|| {
                Failure::InsufficientBalance {
                    available: self.0,
                    requested: value,
                }
                .into()
            }),
        }
    }

    pub(crate) fn to_scalar(self) -> Scalar {
        Scalar::from(self.0)
    }
}

/// Channel balance for customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerBalance(u64);

impl CustomerBalance {
    /// Wrap a balance.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The balance as an integer.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Apply a payment: payments to the merchant decrease the balance and refunds increase it.
    pub fn apply(self, amount: PaymentAmount) -> Result<Self> {
        match amount {
            PaymentAmount::ToMerchant(value) => self.0.checked_sub(value).map(Self).ok_or_else(|| {
                Failure::InsufficientBalance {
                    available: self.0,
                    requested: value,
                }
                .into()
            }),
            PaymentAmount::ToCustomer(value) => self
                .0
                .checked_add(value)
                .map(Self)
                .ok_or_else(|| Failure::BalanceOverflow.into()),
        }
    }

    pub(crate) fn to_scalar(self) -> Scalar {
        Scalar::from(self.0)
    }
}

/// Amount of a single payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentAmount {
    /// A payment from the customer to the merchant.
    ToMerchant(u64),
    /// A refund from the merchant to the customer.
    ToCustomer(u64),
}

impl PaymentAmount {
    /// Construct a *positive* payment amount from the customer to the merchant.
    pub fn pay_merchant(amount: u64) -> Self {
        PaymentAmount::ToMerchant(amount)
    }

    /// Construct a *negative* payment amount from the merchant to the customer (i.e. a refund).
    pub fn pay_customer(amount: u64) -> Self {
        PaymentAmount::ToCustomer(amount)
    }

    pub(crate) fn to_bytes(self) -> [u8; 9] {
        let (direction, value) = match self {
            PaymentAmount::ToMerchant(value) => (0, value),
            PaymentAmount::ToCustomer(value) => (1, value),
        };
        let mut bytes = [direction; 9];
        bytes[1..].copy_from_slice(&value.to_le_bytes());
        bytes
    }
}

/// The committed content of a channel at one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    channel_id: ChannelId,
    customer_key: schnorr::PublicKey,
    wpk: Wpk,
    customer_balance: CustomerBalance,
    merchant_balance: MerchantBalance,
    close: bool,
}

impl Wallet {
    pub(crate) fn new(
        channel_id: ChannelId,
        customer_key: schnorr::PublicKey,
        wpk: Wpk,
        customer_balance: CustomerBalance,
        merchant_balance: MerchantBalance,
    ) -> Self {
        Self {
            channel_id,
            customer_key,
            wpk,
            customer_balance,
            merchant_balance,
            close: false,
        }
    }

    /// The channel this wallet belongs to.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// The customer's long-term public key.
    pub fn customer_key(&self) -> &schnorr::PublicKey {
        &self.customer_key
    }

    /// The revision key of this wallet.
    pub fn wpk(&self) -> &Wpk {
        &self.wpk
    }

    /// The customer's balance.
    pub fn customer_balance(&self) -> CustomerBalance {
        self.customer_balance
    }

    /// The merchant's balance.
    pub fn merchant_balance(&self) -> MerchantBalance {
        self.merchant_balance
    }

    /// Whether this is a close wallet.
    pub fn is_close(&self) -> bool {
        self.close
    }

    /// The same wallet with the close flag set.
    pub fn close_wallet(&self) -> Self {
        Self {
            close: true,
            ..*self
        }
    }

    /// The wallet after `amount` is paid, under a new revision key.
    pub(crate) fn apply_payment(&self, amount: PaymentAmount, wpk: Wpk) -> Result<Self> {
        Ok(Self {
            wpk,
            customer_balance: self.customer_balance.apply(amount)?,
            merchant_balance: self.merchant_balance.apply(amount)?,
            ..*self
        })
    }

    /// The message a commitment to this wallet opens to.
    pub(crate) fn to_message(&self) -> Message<WALLET_LEN> {
        Message::new([
            self.channel_id.to_scalar(),
            key_scalar(&self.customer_key),
            key_scalar(self.wpk.as_public_key()),
            self.customer_balance.to_scalar(),
            self.merchant_balance.to_scalar(),
            if self.close { close_tag() } else { Scalar::zero() },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payments_conserve_the_total() {
        let customer = CustomerBalance::new(100);
        let merchant = MerchantBalance::new(100);

        for amount in [
            PaymentAmount::pay_merchant(30),
            PaymentAmount::pay_merchant(100),
            PaymentAmount::pay_customer(100),
            PaymentAmount::pay_merchant(0),
        ] {
            let c = customer.apply(amount).unwrap().into_inner();
            let m = merchant.apply(amount).unwrap().into_inner();
            assert_eq!(c + m, 200);
        }
    }

    #[test]
    fn payments_cannot_overdraw() {
        assert_eq!(
            CustomerBalance::new(70).apply(PaymentAmount::pay_merchant(200)),
            Err(Failure::InsufficientBalance {
                available: 70,
                requested: 200
            }
            .into())
        );
        assert!(MerchantBalance::new(5)
            .apply(PaymentAmount::pay_customer(6))
            .is_err());
        assert_eq!(
            CustomerBalance::new(u64::MAX).apply(PaymentAmount::pay_customer(1)),
            Err(Failure::BalanceOverflow.into())
        );
    }

    #[test]
    fn amount_encoding_distinguishes_direction() {
        assert_ne!(
            PaymentAmount::pay_merchant(7).to_bytes(),
            PaymentAmount::pay_customer(7).to_bytes()
        );
    }
}
