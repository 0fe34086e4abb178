/*!
Per-revision wallet keys and the revoke tokens that retire them.

Every wallet revision carries a fresh Schnorr keypair `(wpk, wsk)`. Only a hash of `wpk` enters
the wallet commitment, so the merchant does not learn it until the customer pays from that
revision. To complete a payment the customer signs a revocation message under the old `wsk`
and then forgets it; the merchant keeps the resulting [`RevokeToken`] as evidence against any
later attempt to close on the revoked revision.
*/

use crate::{channel::ChannelId, types::*};
use serde::*;

const REVOCATION_DOMAIN: &[u8] = b"bolt-channels/revoked";

/// Public key of one wallet revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wpk(schnorr::PublicKey);

impl Wpk {
    pub(crate) fn as_public_key(&self) -> &schnorr::PublicKey {
        &self.0
    }

    /// Compressed encoding of the key.
    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.to_bytes()
    }
}

/// The keypair `(wpk, wsk)` of one wallet revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RevocationKeyPair(schnorr::KeyPair);

impl RevocationKeyPair {
    pub(crate) fn new<E: CryptoEngine>(
        engine: &E,
        rng: &mut impl Rng,
    ) -> Result<Self, bolt_crypto::Error> {
        engine.signing_keypair(rng).map(Self)
    }

    pub(crate) fn wpk(&self) -> Wpk {
        Wpk(*self.0.public_key())
    }

    /// Revoke this revision. Consumes the keypair: the secret half must not outlive this call.
    pub(crate) fn revoke<E: CryptoEngine>(
        self,
        engine: &E,
        rng: &mut impl Rng,
        channel_id: ChannelId,
    ) -> Result<RevokeToken, bolt_crypto::Error> {
        let wpk = self.wpk();
        let signature = engine.sign(rng, &self.0, &revocation_message(channel_id, &wpk))?;
        Ok(RevokeToken { wpk, signature })
    }
}

/// A customer's signature, under a revision's secret key, declaring that revision superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeToken {
    wpk: Wpk,
    signature: schnorr::Signature,
}

impl RevokeToken {
    /// The revision key this token revokes.
    pub fn wpk(&self) -> &Wpk {
        &self.wpk
    }

    /// Check the signature under the revoked key, for the given channel.
    pub fn verify<E: CryptoEngine>(
        &self,
        engine: &E,
        channel_id: ChannelId,
    ) -> Result<Verification, bolt_crypto::Error> {
        engine.verify(
            &self.wpk.0,
            &revocation_message(channel_id, &self.wpk),
            &self.signature,
        )
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.wpk.to_bytes().to_vec();
        bytes.extend_from_slice(&self.signature.to_bytes());
        bytes
    }
}

fn revocation_message(channel_id: ChannelId, wpk: &Wpk) -> Vec<u8> {
    let mut msg = REVOCATION_DOMAIN.to_vec();
    msg.extend_from_slice(&channel_id.to_bytes());
    msg.extend_from_slice(&wpk.to_bytes());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::rng;
    use bolt_crypto::Bls12Engine;

    fn channel_id(seed: &[u8]) -> ChannelId {
        ChannelId::from_scalar(bolt_crypto::hash_to_scalar(b"test", seed))
    }

    #[test]
    fn revoke_token_verifies_for_its_channel_only() {
        let mut rng = rng();
        let engine = Bls12Engine;
        let keypair = RevocationKeyPair::new(&engine, &mut rng).unwrap();
        let wpk = keypair.wpk();

        let token = keypair.revoke(&engine, &mut rng, channel_id(b"a")).unwrap();
        assert_eq!(token.wpk(), &wpk);
        assert_eq!(
            token.verify(&engine, channel_id(b"a")).unwrap(),
            Verification::Verified
        );
        assert_eq!(
            token.verify(&engine, channel_id(b"b")).unwrap(),
            Verification::Failed
        );
    }

    #[test]
    fn revoke_token_is_bound_to_its_key() {
        let mut rng = rng();
        let engine = Bls12Engine;
        let first = RevocationKeyPair::new(&engine, &mut rng).unwrap();
        let second = RevocationKeyPair::new(&engine, &mut rng).unwrap();

        let mut token = first.revoke(&engine, &mut rng, channel_id(b"a")).unwrap();
        token.wpk = second.wpk();
        assert_eq!(
            token.verify(&engine, channel_id(b"a")).unwrap(),
            Verification::Failed
        );
    }
}
