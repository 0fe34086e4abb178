//! Randomizable multi-message Pointcheval-Sanders signatures, blinded signatures, and keys over
//! BLS12-381.
//!
//! The signature scheme used is defined in the 2016 paper, ["Short randomizable
//! signatures"](https://eprint.iacr.org/2015/525.pdf); The BLS12-381 curve is defined in the (now
//! expired) IRTF draft titled ["BLS
//! Signatures"](https://datatracker.ietf.org/doc/draft-irtf-cfrg-bls-signature/).
//!
//! Blind signing is done over a Pedersen commitment formed with the G1 half of the public key (see
//! [`PublicKey::to_pedersen_parameters`]), so the signer never learns the signed message.

use crate::{
    common::*,
    pedersen::{Commitment, PedersenParameters},
    serde::SerializeElement,
};
use serde::*;

/// Pointcheval-Sanders secret key for multi-message operations.
///
/// Uses Box to avoid stack overflows with large keys.
#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct SecretKey<const N: usize> {
    #[serde(with = "SerializeElement")]
    pub x: Scalar,
    #[serde(with = "SerializeElement")]
    pub ys: Box<[Scalar; N]>,
    #[serde(with = "SerializeElement")]
    pub x1: G1Affine,
}

/// A public key for multi-message operations.
///
/// Uses Box to avoid stack overflows with large keys.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey<const N: usize> {
    /// G1 generator (g)
    #[serde(with = "SerializeElement")]
    pub g1: G1Affine,
    /// Y_1 ... Y_l
    #[serde(with = "SerializeElement")]
    pub y1s: Box<[G1Affine; N]>,
    /// G2 generator (g~)
    #[serde(with = "SerializeElement")]
    pub g2: G2Affine,
    /// X~
    #[serde(with = "SerializeElement")]
    pub x2: G2Affine,
    /// Y~_1 ... Y~_l
    #[serde(with = "SerializeElement")]
    pub y2s: Box<[G2Affine; N]>,
}

/// A keypair formed from a `SecretKey` and a [`PublicKey`] for multi-message operations.
#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPair<const N: usize> {
    sk: SecretKey<N>,
    pk: PublicKey<N>,
}

impl<const N: usize> SecretKey<N> {
    /// Generate a new `SecretKey` based on non-zero [`Scalar`]s chosen uniformly at random and the
    /// given non-identity generator `g1`.
    fn new(rng: &mut impl Rng, g1: &G1Projective) -> Self {
        let x = random_non_zero(&mut *rng);
        let ys = std::array::from_fn(|_| random_non_zero(&mut *rng));
        SecretKey {
            x,
            ys: Box::new(ys),
            x1: (g1 * x).into(),
        }
    }

    fn sign(&self, rng: &mut impl Rng, msg: &Message<N>) -> Signature {
        let h: G1Projective = random_non_identity(&mut *rng);

        // [x] + sum( [yi] * [mi] )
        let scalar_combination = self.x
            + self
                .ys
                .iter()
                .zip(msg.iter())
                .map(|(yi, mi)| yi * mi)
                .sum::<Scalar>();

        Signature {
            sigma1: h.into(),
            sigma2: (h * scalar_combination).into(),
        }
    }
}

impl<const N: usize> PublicKey<N> {
    fn from_secret_key(rng: &mut impl Rng, sk: &SecretKey<N>, g1: &G1Projective) -> Self {
        let g2: G2Projective = random_non_identity(&mut *rng);

        PublicKey {
            g1: g1.into(),
            y1s: Box::new(std::array::from_fn(|i| (g1 * sk.ys[i]).into())),
            g2: g2.into(),
            x2: (g2 * sk.x).into(),
            y2s: Box::new(std::array::from_fn(|i| (g2 * sk.ys[i]).into())),
        }
    }

    /// Represent the G1 elements of `PublicKey` as [`PedersenParameters`].
    ///
    /// Commitments formed under these parameters can be blind-signed by the holder of the
    /// matching secret key.
    pub fn to_pedersen_parameters(&self) -> PedersenParameters<N> {
        PedersenParameters {
            h: self.g1.into(),
            gs: self.y1s.clone(),
        }
    }

    /// Verify a signature on a given message.
    pub fn verify(&self, msg: &Message<N>, sig: &Signature) -> bool {
        if !sig.is_well_formed() {
            return false;
        }

        // x + sum( yi * [mi] ), for the public key (x, y1, ...) and message [m1], [m2]...
        let lhs = self.x2
            + self
                .y2s
                .iter()
                .zip(msg.iter())
                .map(|(yi, mi)| yi * mi)
                .sum::<G2Projective>();

        pairing(&sig.sigma1, &lhs.into()) == pairing(&sig.sigma2, &self.g2)
    }

    /// Convert the public key to a byte representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(48 * (N + 1) + 96 * (N + 2));
        buf.extend_from_slice(&self.g1.to_compressed());
        for y1 in self.y1s.iter() {
            buf.extend_from_slice(&y1.to_compressed());
        }
        buf.extend_from_slice(&self.g2.to_compressed());
        buf.extend_from_slice(&self.x2.to_compressed());
        for y2 in self.y2s.iter() {
            buf.extend_from_slice(&y2.to_compressed());
        }
        buf
    }
}

impl<const N: usize> KeyPair<N> {
    /// Generate a new `KeyPair` of a given length.
    ///
    /// Generators are chosen uniformly at random from G1* and G2*. The scalars in the secret key
    /// are chosen uniformly at random and are non-zero.
    pub fn new(rng: &mut impl Rng) -> Self {
        let g1: G1Projective = random_non_identity(&mut *rng);
        let sk = SecretKey::new(rng, &g1);
        let pk = PublicKey::from_secret_key(rng, &sk, &g1);
        KeyPair { sk, pk }
    }

    /// Get the public portion of the `KeyPair`
    pub fn public_key(&self) -> &PublicKey<N> {
        &self.pk
    }

    /// Sign a message in the clear.
    pub fn sign(&self, rng: &mut impl Rng, msg: &Message<N>) -> Signature {
        self.sk.sign(rng, msg)
    }

    /// Sign a commitment formed under [`PublicKey::to_pedersen_parameters`].
    ///
    /// **Warning**: this should *only* be used if the signer has verified a proof of knowledge of
    /// the opening of the commitment.
    pub fn blind_sign(&self, rng: &mut impl Rng, commitment: &Commitment) -> BlindedSignature {
        let u = random_non_zero(rng);

        BlindedSignature(Signature {
            sigma1: (self.pk.g1 * u).into(),
            sigma2: ((self.sk.x1 + commitment.to_element()) * u).into(),
        })
    }
}

/// A signature on a message, generated using Pointcheval-Sanders.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// First part of a signature.
    ///
    /// In some papers, this is denoted `h`.
    #[serde(with = "SerializeElement")]
    sigma1: G1Affine,
    /// Second part of a signature.
    ///
    /// In some papers, this is denoted `H`.
    #[serde(with = "SerializeElement")]
    sigma2: G1Affine,
}

impl Signature {
    /// Produce an unlinkable signature on the same message.
    pub fn randomize(&self, rng: &mut impl Rng) -> Self {
        let r = random_non_zero(rng);
        Signature {
            sigma1: (self.sigma1 * r).into(),
            sigma2: (self.sigma2 * r).into(),
        }
    }

    /// Convert to a bytewise representation
    pub fn to_bytes(&self) -> [u8; 96] {
        let mut buf: [u8; 96] = [0; 96];
        buf[..48].copy_from_slice(&self.sigma1.to_compressed());
        buf[48..].copy_from_slice(&self.sigma2.to_compressed());
        buf
    }

    /// Check whether the signature is well-formed.
    ///
    /// This checks that first element is not the identity element.
    pub fn is_well_formed(&self) -> bool {
        !bool::from(self.sigma1.is_identity())
    }

    /// Randomize the signature, then blind it with `bf`.
    ///
    /// The result verifies against a G2 commitment to the signed message formed with `bf`, which
    /// is what a proof of knowledge of the signature is built on.
    pub(crate) fn blind_and_randomize(
        &self,
        rng: &mut impl Rng,
        bf: BlindingFactor,
    ) -> BlindedSignature {
        let Signature { sigma1, sigma2 } = self.randomize(rng);
        BlindedSignature(Signature {
            sigma1,
            sigma2: (G1Projective::from(sigma2) + sigma1 * bf.as_scalar()).into(),
        })
    }

    /// Extract the sigma_1 or `h` component.
    pub(crate) fn sigma1(&self) -> G1Affine {
        self.sigma1
    }

    /// Extract the sigma_2 or `H` component.
    pub(crate) fn sigma2(&self) -> G1Affine {
        self.sigma2
    }
}

/// A signature on a blinded message, generated using PS blind signing protocols.
///
/// This has the same representation as a regular [`Signature`], but different semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedSignature(pub(crate) Signature);

impl BlindedSignature {
    /// Unblind a [`BlindedSignature`]. This will always compute: the user must take care to use
    /// a blinding factor that actually corresponds to the signature in order to retrieve
    /// a valid [`Signature`] on the original message.
    pub fn unblind(self, bf: BlindingFactor) -> Signature {
        let Self(Signature { sigma1, sigma2 }) = self;
        Signature {
            sigma1,
            sigma2: (G1Projective::from(sigma2) - (sigma1 * bf.as_scalar())).into(),
        }
    }

    /// Check whether the signature is well-formed.
    pub fn is_well_formed(&self) -> bool {
        self.0.is_well_formed()
    }

    /// Convert to a bytewise representation.
    pub fn to_bytes(&self) -> [u8; 96] {
        self.0.to_bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    #[test]
    fn verify_signed_message() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let sig = kp.sign(&mut rng, &msg);
        assert!(kp.public_key().verify(&msg, &sig), "Signature didn't verify!!");
    }

    #[test]
    fn fail_verification_of_different_message() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let sig = kp.sign(&mut rng, &msg);
        let bad_msg = Message::<3>::random(&mut rng);

        assert!(
            !kp.public_key().verify(&bad_msg, &sig),
            "Signature verified on the wrong message!",
        );
    }

    #[test]
    fn fail_verification_with_wrong_keypair() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let bad_kp = KeyPair::new(&mut rng);
        let bad_sig = bad_kp.sign(&mut rng, &msg);

        assert!(!kp.public_key().verify(&msg, &bad_sig));
    }

    #[test]
    fn fail_unit_signature() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let bad_sig = Signature {
            sigma1: G1Affine::identity(),
            sigma2: G1Projective::random(&mut rng).into(),
        };

        assert!(!kp.public_key().verify(&msg, &bad_sig));
    }

    #[test]
    fn randomized_signatures_verify() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let sig = kp.sign(&mut rng, &msg);
        let randomized = sig.randomize(&mut rng);

        assert_ne!(sig, randomized);
        assert!(kp.public_key().verify(&msg, &randomized))
    }

    #[test]
    fn blind_signing_verifies() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let bf = BlindingFactor::new(&mut rng);
        let com = kp.public_key().to_pedersen_parameters().commit(&msg, bf);
        let sig = kp.blind_sign(&mut rng, &com).unblind(bf);

        assert!(kp.public_key().verify(&msg, &sig), "Signature didn't verify!!");
    }

    #[test]
    fn blind_signing_requires_correct_blinding_factor() {
        let mut rng = rng();
        let kp = KeyPair::new(&mut rng);
        let msg = Message::<3>::random(&mut rng);

        let bf = BlindingFactor::new(&mut rng);
        let com = kp.public_key().to_pedersen_parameters().commit(&msg, bf);
        let blind_sig = kp.blind_sign(&mut rng, &com);

        let bad_bf = BlindingFactor::new(&mut rng);
        assert!(!kp.public_key().verify(&msg, &blind_sig.unblind(bad_bf)));
    }
}
