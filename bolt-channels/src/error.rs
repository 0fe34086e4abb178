//! Errors surfaced by channel operations.
//!
//! Every operation either succeeds and commits its state change, or returns one of these and
//! leaves the controller exactly as it was.

use crate::{protocol::ChannelStatus, types::Verification};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias for results of channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that may arise from channel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A request or response crossing the engine boundary was malformed. Retriable with
    /// corrected input.
    #[error("malformed request: {0}")]
    Serialization(String),
    /// The cryptographic engine failed for reasons unrelated to the protocol. Retriable.
    #[error("cryptographic engine fault: {0}")]
    CryptoEngineFault(String),
    /// A proof or signature did not verify. Terminal for the attempted transition.
    #[error("verification failed: {0}")]
    VerificationFailure(Failure),
    /// The operation was invoked against a controller that is not in the required state.
    #[error("{operation} is not allowed while the channel is {status}: {reason}")]
    ProtocolState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The status of the controller when it was attempted.
        status: ChannelStatus,
        /// Which precondition was not met.
        reason: &'static str,
    },
}

impl Error {
    /// Whether the failed call may be retried as-is.
    ///
    /// Only malformed requests and engine faults are retriable. A verification failure may be
    /// adversarial and a protocol state error is a caller bug.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Serialization(_) | Error::CryptoEngineFault(_))
    }

    pub(crate) fn protocol(
        operation: &'static str,
        status: ChannelStatus,
        reason: &'static str,
    ) -> Self {
        Error::ProtocolState {
            operation,
            status,
            reason,
        }
    }
}

impl From<bolt_crypto::Error> for Error {
    fn from(error: bolt_crypto::Error) -> Self {
        match error {
            bolt_crypto::Error::Fault(reason) => Error::CryptoEngineFault(reason),
            other => Error::Serialization(other.to_string()),
        }
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        Error::VerificationFailure(failure)
    }
}

/// The check that failed in a [`Error::VerificationFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Failure {
    /// The establish proof does not open the commitment to the claimed initial wallet.
    #[error("establish proof does not attest to the claimed wallet")]
    EstablishProof,
    /// The claimed merchant balance differs from the one the channel was created with.
    #[error("claimed merchant balance does not match the channel")]
    BalanceMismatch,
    /// The close token is not a valid signature on the expected close wallet.
    #[error("invalid close token")]
    CloseToken,
    /// The pay token is not a valid signature on the expected wallet.
    #[error("invalid pay token")]
    PayToken,
    /// The payment proof does not attest to a correct update of a signed wallet.
    #[error("invalid payment proof")]
    PaymentProof,
    /// The payment would leave a balance negative.
    #[error("insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance {
        /// The balance the payment is drawn from.
        available: u64,
        /// The amount requested.
        requested: u64,
    },
    /// The payment would overflow a balance.
    #[error("payment overflows the channel balance")]
    BalanceOverflow,
    /// The payment is drawn from a wallet revision that was already paid from or revoked.
    #[error("wallet revision has already been used")]
    RevisionReused,
    /// The revoke token names a revision with no payment awaiting revocation.
    #[error("no payment is awaiting revocation of this wallet revision")]
    UnknownRevision,
    /// The revoke token signature does not verify under its revision key.
    #[error("invalid revoke token")]
    RevokeToken,
    /// A close message does not verify against the channel token.
    #[error("invalid close message")]
    CloseMessage,
}

/// Turn a failed [`Verification`] into the given [`Failure`].
pub(crate) fn ensure(verification: Verification, failure: Failure) -> Result<()> {
    match verification {
        Verification::Verified => Ok(()),
        Verification::Failed => {
            warn!("rejected: {}", failure);
            Err(failure.into())
        }
    }
}
