use core::{
    fmt::{self, Display},
    ops::Deref,
};

use crate::utils::{
    ByteReader, ByteWriter, Deserializable, DeserializationError, HexParseError, Serializable,
    bytes_to_hex_string, hex_to_bytes,
};

// CONSTANTS
// ================================================================================================

/// Number of bytes in a [Digest].
pub const DIGEST_BYTES: usize = 32;

// DIGEST
// ================================================================================================

/// A 32-byte hash output.
///
/// Leaves, inner nodes and roots of a commitment tree are all digests. Leaf values come from the
/// transaction pipeline and are treated as opaque.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct Digest([u8; DIGEST_BYTES]);

impl Digest {
    /// The serialized size of the digest in bytes.
    pub const SERIALIZED_SIZE: usize = DIGEST_BYTES;

    /// Creates a new [Digest] from raw bytes.
    pub const fn new(bytes: [u8; DIGEST_BYTES]) -> Self {
        Self(bytes)
    }

    /// Returns the digest as a byte array.
    pub const fn as_bytes(&self) -> [u8; DIGEST_BYTES] {
        self.0
    }

    /// Returns hexadecimal representation of this digest prefixed with `0x`.
    pub fn to_hex(&self) -> String {
        bytes_to_hex_string(self.0)
    }
}

impl Deref for Digest {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// CONVERSIONS
// ================================================================================================

impl From<[u8; DIGEST_BYTES]> for Digest {
    fn from(value: [u8; DIGEST_BYTES]) -> Self {
        Self(value)
    }
}

impl From<Digest> for [u8; DIGEST_BYTES] {
    fn from(value: Digest) -> Self {
        value.0
    }
}

impl From<blake3::Hash> for Digest {
    fn from(value: blake3::Hash) -> Self {
        Self(*value.as_bytes())
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_hex()
    }
}

impl TryFrom<&str> for Digest {
    type Error = HexParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        hex_to_bytes(value).map(Self)
    }
}

impl TryFrom<String> for Digest {
    type Error = HexParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Digest {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.0);
    }

    fn get_size_hint(&self) -> usize {
        Self::SERIALIZED_SIZE
    }
}

impl Deserializable for Digest {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        source.read_array().map(Self)
    }
}

/// Writes a length-prefixed sequence of digests.
pub(crate) fn write_digests<W: ByteWriter>(target: &mut W, digests: &[Digest]) {
    target.write_u32(digests.len() as u32);
    for digest in digests {
        digest.write_into(target);
    }
}

/// Reads a sequence written by [write_digests].
pub(crate) fn read_digests<R: ByteReader>(
    source: &mut R,
) -> Result<Vec<Digest>, DeserializationError> {
    let len = source.read_u32()? as usize;
    (0..len).map(|_| Digest::read_from(source)).collect()
}
