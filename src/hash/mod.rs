//! Hash functions used to combine commitment tree nodes.

use core::fmt::{self, Display};

use crate::{
    Digest,
    utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable},
};

mod blake;
mod keccak;

pub use blake::Blake3_256;
pub use keccak::Keccak256;


// HASHER
// ================================================================================================

/// A 256-bit hash function able to combine two tree nodes into their parent.
pub trait Hasher {
    /// Returns a hash of the provided sequence of bytes.
    fn hash(bytes: &[u8]) -> Digest;

    /// Returns a hash of two digests. This method is intended for use in construction of
    /// Merkle trees, so `values[0]` is the left child and `values[1]` the right one.
    fn merge(values: &[Digest; 2]) -> Digest;
}

// HASH FUNCTION
// ================================================================================================

/// The hash function a tree was created with.
///
/// The choice is fixed when the tree is created and persisted with it, so it is dispatched at
/// runtime rather than through a type parameter.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "executable", derive(clap::ValueEnum))]
#[repr(u8)]
pub enum HashFunction {
    /// BLAKE3 with 256-bit output.
    #[default]
    Blake3 = 0,
    /// Keccak-256 (the pre-standard SHA-3 padding).
    Keccak256 = 1,
}

impl HashFunction {
    /// Returns a hash of the provided bytes.
    pub fn hash(self, bytes: &[u8]) -> Digest {
        match self {
            Self::Blake3 => Blake3_256::hash(bytes),
            Self::Keccak256 => Keccak256::hash(bytes),
        }
    }

    /// Combines `left` and `right` into their parent node.
    pub fn merge(self, left: Digest, right: Digest) -> Digest {
        let values = [left, right];
        match self {
            Self::Blake3 => Blake3_256::merge(&values),
            Self::Keccak256 => Keccak256::merge(&values),
        }
    }
}

impl Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => f.write_str("blake3"),
            Self::Keccak256 => f.write_str("keccak256"),
        }
    }
}

impl TryFrom<u8> for HashFunction {
    type Error = DeserializationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Blake3),
            1 => Ok(Self::Keccak256),
            other => Err(DeserializationError::InvalidValue(format!(
                "unknown hash function tag {other}"
            ))),
        }
    }
}

impl Serializable for HashFunction {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u8(*self as u8);
    }
}

impl Deserializable for HashFunction {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Self::try_from(source.read_u8()?)
    }
}
