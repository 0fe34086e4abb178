//! Non-interactive Schnorr-style zero-knowledge proofs, as building blocks for protocol proofs.
//!
//! - [`OpeningProof`] proves knowledge of the opening of a Pedersen commitment, with selective
//!   disclosure of message slots.
//! - [`SignatureProof`] proves knowledge of a Pointcheval-Sanders signature and the message under
//!   it, without revealing either.
//! - [`RangeConstraint`] shows a value proven in another proof lies in `[0, 2^64)`.
//! - [`CommitmentProof`] proves knowledge of the opening of a commitment and is meant to be
//!   linked to other proofs through shared commitment scalars.
//! - [`UpdateProof`] combines the above to show that a committed message is a public update of a
//!   hidden, signed one.
//!
//! Every challenge is computed with the Fiat-Shamir heuristic using [`ChallengeBuilder`].

mod challenge;
mod commitment;
mod opening;
mod range;
mod signature;
mod update;

pub use self::{challenge::*, commitment::*, opening::*, range::*, signature::*, update::*};
