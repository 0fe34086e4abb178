/*!
The merchant signatures that authorize a customer to close on, or pay from, one wallet revision.

Each token exists in two forms. The merchant produces the blinded form by signing a commitment it
cannot open; the customer removes the commitment's blinding factor to get a signature on the
wallet itself. Close and pay tokens are distinct types so one can never be presented as the other.
*/

use crate::types::*;
use pointcheval_sanders::{BlindedSignature, Signature};
use serde::*;

/// Blinded merchant signature on a close wallet, as issued by the merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseToken(BlindedSignature);

/// Merchant signature on a close wallet, held by the customer. Authorizes unilateral close of
/// exactly that wallet revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSignature(Signature);

/// Blinded merchant signature on a wallet, as issued by the merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayToken(BlindedSignature);

/// Merchant signature on a wallet, held by the customer. Authorizes the next payment from that
/// wallet revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaySignature(Signature);

impl CloseToken {
    pub(crate) fn new(signature: BlindedSignature) -> Self {
        Self(signature)
    }

    pub(crate) fn unblind<E: CryptoEngine>(
        self,
        engine: &E,
        bf: BlindingFactor,
    ) -> Result<CloseSignature, bolt_crypto::Error> {
        engine.unblind(self.0, bf).map(CloseSignature)
    }
}

impl CloseSignature {
    pub(crate) fn as_signature(&self) -> &Signature {
        &self.0
    }

    /// A signature on the same wallet that cannot be linked to this one.
    pub(crate) fn randomize<E: CryptoEngine>(
        &self,
        engine: &E,
        rng: &mut impl Rng,
    ) -> Result<Self, bolt_crypto::Error> {
        engine.randomize(rng, &self.0).map(Self)
    }
}

impl PayToken {
    pub(crate) fn new(signature: BlindedSignature) -> Self {
        Self(signature)
    }

    pub(crate) fn unblind<E: CryptoEngine>(
        self,
        engine: &E,
        bf: BlindingFactor,
    ) -> Result<PaySignature, bolt_crypto::Error> {
        engine.unblind(self.0, bf).map(PaySignature)
    }
}

impl PaySignature {
    pub(crate) fn as_signature(&self) -> &Signature {
        &self.0
    }
}
