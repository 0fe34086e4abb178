//! Utilities for serializing and deserializing `bolt_crypto` types using Serde.
//!
//! The `bls12_381` types carry no `Serialize`/`Deserialize` implementations of their own. The
//! [`SerializeElement`] trait looks like a "module" to Serde, so it can be used with the
//! `#[serde(with = "SerializeElement")]` syntax to add that functionality to fields holding curve
//! elements, scalars, or fixed-size arrays of them.
//!
//! Group elements use the `bls12_381` compressed encoding. Scalars use their canonical 32-byte
//! little-endian encoding; non-canonical encodings are rejected on deserialization.

use crate::common::*;
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{convert::TryFrom, marker::PhantomData};

#[derive(Serialize)]
#[serde(transparent)]
struct SerWrapper<'a, G: SerializeElement>(
    #[serde(serialize_with = "<G as SerializeElement>::serialize")] &'a G,
);

#[derive(Deserialize)]
#[serde(transparent)]
struct DeWrapper<G: SerializeElement>(#[serde(with = "SerializeElement")] G);

/// Serialization/deserialization functionality for external `bls12_381` types.
pub trait SerializeElement: Sized {
    /// Proxy serialization function telling serde how to serialize the implementing type.
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer;

    /// Proxy deserialization function telling serde how to deserialize the implementing type.
    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>;
}

impl SerializeElement for G1Affine {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_big_array::BigArray::serialize(&this.to_compressed(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let maybe_g1: Option<G1Affine> =
            G1Affine::from_compressed(&serde_big_array::BigArray::deserialize(deserializer)?)
                .into();
        maybe_g1.ok_or_else(|| de::Error::custom("invalid G1 element encoding"))
    }
}

impl SerializeElement for G1Projective {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        G1Affine::serialize(&this.into(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        G1Affine::deserialize(deserializer).map(Into::into)
    }
}

impl SerializeElement for G2Affine {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_big_array::BigArray::serialize(&this.to_compressed(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let maybe_g2: Option<G2Affine> =
            G2Affine::from_compressed(&serde_big_array::BigArray::deserialize(deserializer)?)
                .into();
        maybe_g2.ok_or_else(|| de::Error::custom("invalid G2 element encoding"))
    }
}

impl SerializeElement for G2Projective {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        G2Affine::serialize(&this.into(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        G2Affine::deserialize(deserializer).map(Into::into)
    }
}

impl SerializeElement for Scalar {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.to_bytes().serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        let maybe_scalar: Option<Scalar> = Scalar::from_bytes(&bytes).into();
        maybe_scalar.ok_or_else(|| de::Error::custom("invalid scalar encoding"))
    }
}

impl<G: SerializeElement> SerializeElement for Vec<G> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(this.len()))?;
        for g in this {
            seq.serialize_element(&SerWrapper(g))?;
        }
        seq.end()
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ElementVisitor<G> {
            _phantom: PhantomData<G>,
        }

        impl<'de, G> Visitor<'de> for ElementVisitor<G>
        where
            G: SerializeElement,
        {
            type Value = Vec<G>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sequence of elements")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut elems = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(elem) = seq.next_element::<DeWrapper<G>>()? {
                    elems.push(elem.0);
                }
                Ok(elems)
            }
        }

        deserializer.deserialize_seq(ElementVisitor {
            _phantom: PhantomData,
        })
    }
}

impl<G: SerializeElement, const N: usize> SerializeElement for [G; N] {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(N))?;
        for g in this {
            seq.serialize_element(&SerWrapper(g))?;
        }
        seq.end()
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let elems: Vec<G> = SerializeElement::deserialize(deserializer)?;
        let len = elems.len();
        <[G; N]>::try_from(elems).map_err(|_| de::Error::invalid_length(len, &"a full array"))
    }
}

impl<G: SerializeElement, const N: usize> SerializeElement for Box<[G; N]> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let this: &[G; N] = this;
        SerializeElement::serialize(this, serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Box::new(SerializeElement::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;
    use ff::Field;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Elements {
        #[serde(with = "SerializeElement")]
        scalar: Scalar,
        #[serde(with = "SerializeElement")]
        g1: G1Affine,
        #[serde(with = "SerializeElement")]
        g2: G2Affine,
        #[serde(with = "SerializeElement")]
        array: Box<[G1Affine; 3]>,
    }

    #[test]
    fn elements_survive_bincode() {
        let mut rng = rng();
        let elements = Elements {
            scalar: Scalar::random(&mut rng),
            g1: G1Projective::random(&mut rng).into(),
            g2: G2Projective::random(&mut rng).into(),
            array: Box::new(std::array::from_fn(|_| G1Projective::random(&mut rng).into())),
        };

        let bytes = bincode::serialize(&elements).unwrap();
        let decoded: Elements = bincode::deserialize(&bytes).unwrap();
        assert_eq!(elements, decoded);
    }

    #[test]
    fn truncated_array_is_rejected() {
        #[derive(Serialize)]
        struct Short {
            #[serde(with = "SerializeElement")]
            array: Vec<Scalar>,
        }
        #[derive(Debug, Deserialize)]
        struct Long {
            #[serde(with = "SerializeElement")]
            #[allow(dead_code)]
            array: [Scalar; 3],
        }

        let bytes = bincode::serialize(&Short {
            array: vec![Scalar::one(), Scalar::zero()],
        })
        .unwrap();
        assert!(bincode::deserialize::<Long>(&bytes).is_err());
    }
}
