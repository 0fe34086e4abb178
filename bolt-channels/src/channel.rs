/*!
Shared channel parameters and the public token binding a channel instance.

[`setup`] produces the [`ChannelState`] both parties use for every later call. The merchant then
creates a [`ChannelToken`] holding its public keys, its range parameters and a fresh nonce; the
customer completes it with their own public key. The [`ChannelId`] is a hash of the complete
token, and every commitment, proof and signature in the channel is bound to it, so two parties
holding different tokens can never cross-verify anything.
*/

use crate::{
    error::{Error, Result},
    nonce::Nonce,
    states::WALLET_LEN,
    types::*,
};
use bolt_crypto::{hash_to_scalar, proofs::RangeParameters, Bls12Engine};
use log::info;
use serde::*;

/// Longest channel name accepted by [`setup`], in bytes.
pub const MAX_NAME_LEN: usize = 256;

const CHANNEL_ID_DOMAIN: &[u8] = b"bolt-channels/channel-id";

/// Channel-wide parameters shared by both parties. Immutable after setup.
#[derive(Debug, Clone)]
pub struct ChannelState<E = Bls12Engine> {
    name: String,
    third_party: bool,
    engine: E,
}

/// Create the shared parameters for a channel using the reference BLS12-381 engine.
///
/// Fails with [`Error::Serialization`] if the name is empty or longer than [`MAX_NAME_LEN`].
pub fn setup(name: &str, third_party_support: bool) -> Result<ChannelState> {
    setup_with_engine(Bls12Engine, name, third_party_support)
}

/// Create the shared parameters for a channel using the given engine.
pub fn setup_with_engine<E: CryptoEngine>(
    engine: E,
    name: &str,
    third_party_support: bool,
) -> Result<ChannelState<E>> {
    validate_name("channel", name)?;
    info!(
        "set up channel {:?} (third-party support: {})",
        name, third_party_support
    );
    Ok(ChannelState {
        name: name.to_string(),
        third_party: third_party_support,
        engine,
    })
}

pub(crate) fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Serialization(format!("{} name must not be empty", what)));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::Serialization(format!(
            "{} name is {} bytes, at most {} are allowed",
            what,
            name.len(),
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

impl<E: CryptoEngine> ChannelState<E> {
    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the channel supports third-party payments.
    pub fn third_party_support(&self) -> bool {
        self.third_party
    }

    /// The cryptographic engine all operations on this channel use.
    pub fn engine(&self) -> &E {
        &self.engine
    }
}

/// Public identifiers binding a channel instance. Must be identical on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelToken {
    customer_key: Option<schnorr::PublicKey>,
    merchant_key: schnorr::PublicKey,
    blind_key: pointcheval_sanders::PublicKey<WALLET_LEN>,
    range_parameters: RangeParameters,
    nonce: Nonce,
}

impl ChannelToken {
    pub(crate) fn new(
        merchant_key: schnorr::PublicKey,
        blind_key: pointcheval_sanders::PublicKey<WALLET_LEN>,
        range_parameters: RangeParameters,
        nonce: Nonce,
    ) -> Self {
        Self {
            customer_key: None,
            merchant_key,
            blind_key,
            range_parameters,
            nonce,
        }
    }

    /// The customer's long-term public key, once the customer has joined.
    pub fn customer_key(&self) -> Option<&schnorr::PublicKey> {
        self.customer_key.as_ref()
    }

    /// The merchant's signing key `pk_m`.
    pub fn merchant_key(&self) -> &schnorr::PublicKey {
        &self.merchant_key
    }

    /// The merchant's blind-signature public key.
    pub fn blind_key(&self) -> &pointcheval_sanders::PublicKey<WALLET_LEN> {
        &self.blind_key
    }

    /// The merchant's parameters for the balance range constraints in payment proofs.
    pub fn range_parameters(&self) -> &RangeParameters {
        &self.range_parameters
    }

    /// Whether the customer key has been filled in.
    pub fn is_complete(&self) -> bool {
        self.customer_key.is_some()
    }

    /// Commitment parameters for wallets, derived from the merchant's blind-signature key.
    pub fn pedersen_parameters(&self) -> PedersenParameters<WALLET_LEN> {
        self.blind_key.to_pedersen_parameters()
    }

    /// Fill in the customer key. Re-binding an already complete token to a different key fails.
    pub(crate) fn with_customer_key(&self, customer_key: schnorr::PublicKey) -> Result<Self> {
        match self.customer_key {
            Some(existing) if existing != customer_key => Err(Error::Serialization(
                "channel token is already bound to a different customer".to_string(),
            )),
            _ => Ok(Self {
                customer_key: Some(customer_key),
                ..self.clone()
            }),
        }
    }

    /// Canonical byte encoding of the token.
    ///
    /// The range parameters enter through their public key; the digit signatures are checked
    /// against it whenever they are used.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match &self.customer_key {
            Some(key) => {
                bytes.push(1);
                bytes.extend_from_slice(&key.to_bytes());
            }
            None => bytes.push(0),
        }
        bytes.extend_from_slice(&self.merchant_key.to_bytes());
        bytes.extend_from_slice(&self.blind_key.to_bytes());
        bytes.extend_from_slice(&self.range_parameters.public_key().to_bytes());
        bytes.extend_from_slice(&self.nonce.to_bytes());
        bytes
    }

    /// The identifier of the channel this token describes.
    ///
    /// Only defined for a complete token.
    pub fn channel_id(&self) -> Result<ChannelId> {
        if !self.is_complete() {
            return Err(Error::Serialization(
                "channel token has no customer key".to_string(),
            ));
        }
        Ok(ChannelId(hash_to_scalar(CHANNEL_ID_DOMAIN, &self.to_bytes())))
    }
}

/// Channel identifier, binds every wallet, proof and close message to a specific channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelId(#[serde(with = "SerializeElement")] Scalar);

impl ChannelId {
    #[cfg(test)]
    pub(crate) fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub(crate) fn to_scalar(self) -> Scalar {
        self.0
    }

    /// Canonical byte encoding of the identifier.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::rng;

    fn token(rng: &mut impl Rng) -> ChannelToken {
        let engine = Bls12Engine;
        ChannelToken::new(
            *engine.signing_keypair(&mut *rng).unwrap().public_key(),
            engine
                .blind_signing_keypair(&mut *rng)
                .unwrap()
                .public_key()
                .clone(),
            engine.range_parameters(&mut *rng).unwrap(),
            Nonce::new(&mut *rng),
        )
    }

    #[test]
    fn setup_rejects_malformed_names() {
        assert!(setup("channel", false).is_ok());
        assert!(matches!(setup("", true), Err(Error::Serialization(_))));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let error = setup(&long, false).unwrap_err();
        assert!(error.is_retriable());
    }

    #[test]
    fn channel_id_requires_complete_token() {
        let mut rng = rng();
        let token = token(&mut rng);
        assert!(token.channel_id().is_err());

        let customer = Bls12Engine.signing_keypair(&mut rng).unwrap();
        let complete = token.with_customer_key(*customer.public_key()).unwrap();
        assert!(complete.channel_id().is_ok());
        assert_eq!(
            complete.channel_id().unwrap(),
            complete.clone().channel_id().unwrap()
        );
    }

    #[test]
    fn any_field_changes_the_channel_id() {
        let mut rng = rng();
        let customer = *Bls12Engine.signing_keypair(&mut rng).unwrap().public_key();
        let other_customer = *Bls12Engine.signing_keypair(&mut rng).unwrap().public_key();
        let token = token(&mut rng);

        let a = token.with_customer_key(customer).unwrap();
        let b = token.with_customer_key(other_customer).unwrap();
        let c = ChannelToken {
            nonce: Nonce::new(&mut rng),
            ..a.clone()
        };
        let d = ChannelToken {
            range_parameters: RangeParameters::new(&mut rng),
            ..a.clone()
        };

        assert_ne!(a.channel_id().unwrap(), b.channel_id().unwrap());
        assert_ne!(a.channel_id().unwrap(), c.channel_id().unwrap());
        assert_ne!(a.channel_id().unwrap(), d.channel_id().unwrap());
    }

    #[test]
    fn token_cannot_be_rebound() {
        let mut rng = rng();
        let first = *Bls12Engine.signing_keypair(&mut rng).unwrap().public_key();
        let second = *Bls12Engine.signing_keypair(&mut rng).unwrap().public_key();
        let token = token(&mut rng).with_customer_key(first).unwrap();

        assert_eq!(token.with_customer_key(first).unwrap(), token);
        assert!(matches!(
            token.with_customer_key(second),
            Err(Error::Serialization(_))
        ));
    }
}
