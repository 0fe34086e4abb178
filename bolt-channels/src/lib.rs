/*!
This crate implements the Bolt bidirectional payment channel protocol between a customer and a
merchant: channel setup, the customer and merchant controllers that drive the establish, pay and
close handshakes, and the dispute verifier an arbiter uses to adjudicate unilateral closes.

All cryptography is delegated to an injected [`CryptoEngine`](bolt_crypto::CryptoEngine). The
reference [`Bls12Engine`](bolt_crypto::Bls12Engine) is used by [`setup`]; any other engine can be
supplied through [`setup_with_engine`].

A channel moves through `Created → Established → Open(n) → Closing → Closed`
(see [`ChannelStatus`]). Each payment round runs

1. [`CustState::pay_generate_payment_proof`],
2. [`MerchState::verify_payment_proof`], which returns a close token for the new revision and
   withholds its pay token,
3. [`CustState::pay_generate_revoke_token`], which revokes the old revision,
4. [`MerchState::verify_revoke_token`], which releases the pay token, and
5. [`CustState::pay_verify_payment_token`].

The [`protocol`] module runs these handshakes in-process in the required order.

 # References

 1: Matthew Green and Ian Miers. "Bolt: Anonymous Payment Channels for Decentralized
 Currencies". CCS 2017. URL: <https://eprint.iacr.org/2016/701>
 */
#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod channel;
pub mod customer;
pub mod dispute;
pub mod error;
pub mod merchant;
pub mod protocol;
pub mod revocation;

pub use bolt_crypto::{Rng, Verification};
pub use channel::{setup, setup_with_engine, ChannelId, ChannelState, ChannelToken};
pub use customer::{CustClose, CustState};
pub use dispute::{DisputeVerifier, Settlement};
pub use error::{Error, Failure, Result};
pub use merchant::{MerchClaim, MerchCloseMessage, MerchState, MerchantKeys};
pub use nonce::Nonce;
pub use proofs::{EstablishProof, PaymentProof};
pub use protocol::ChannelStatus;
pub use revocation::{RevokeToken, Wpk};
pub use states::{CustomerBalance, MerchantBalance, PaymentAmount, Wallet, WALLET_LEN};
pub use tokens::{CloseSignature, CloseToken, PaySignature, PayToken};

mod nonce;
mod proofs;
mod states;
mod tokens;

mod types {
    pub use bls12_381::Scalar;
    pub use bolt_crypto::{
        pedersen::{Commitment, PedersenParameters},
        pointcheval_sanders, schnorr, BlindingFactor, CryptoEngine, Message, Rng,
        SerializeElement, Verification,
    };
}
