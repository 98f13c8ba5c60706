//! Utilities used in this crate which can also be generally useful downstream.

use core::fmt::Write;

use thiserror::Error;
pub use winter_utils::{
    ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, SliceReader,
};

// UTILITY FUNCTIONS
// ================================================================================================

/// Renders an array of bytes as hex into a String.
pub fn bytes_to_hex_string<const N: usize>(data: [u8; N]) -> String {
    let mut s = String::with_capacity(N * 2 + 2);

    s.push_str("0x");
    for byte in data.iter() {
        // writing into a String cannot fail
        let _ = write!(s, "{byte:02x}");
    }

    s
}

/// Defines errors which can occur during parsing of hexadecimal strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexParseError {
    #[error("expected hex data to have length {expected}, including the 0x prefix, found {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("hex encoded data must start with 0x prefix")]
    MissingPrefix,
    #[error("hex encoded data must contain only characters [a-fA-F0-9]")]
    InvalidChar,
}

/// Parses a hex string into an array of bytes of known size.
pub fn hex_to_bytes<const N: usize>(value: &str) -> Result<[u8; N], HexParseError> {
    let expected: usize = (N * 2) + 2;
    if value.len() != expected {
        return Err(HexParseError::InvalidLength { expected, actual: value.len() });
    }

    let Some(digits) = value.strip_prefix("0x") else {
        return Err(HexParseError::MissingPrefix);
    };

    let nibble = |v: u8| match v {
        b'0'..=b'9' => Ok(v - b'0'),
        b'a'..=b'f' => Ok(v - b'a' + 10),
        b'A'..=b'F' => Ok(v - b'A' + 10),
        _ => Err(HexParseError::InvalidChar),
    };

    let mut decoded = [0u8; N];
    for (byte, pair) in decoded.iter_mut().zip(digits.as_bytes().chunks_exact(2)) {
        *byte = (nibble(pair[0])? << 4) + nibble(pair[1])?;
    }

    Ok(decoded)
}

/// Writes a boolean as a single byte.
pub(crate) fn write_flag<W: ByteWriter>(target: &mut W, flag: bool) {
    target.write_u8(flag as u8);
}

/// Reads a boolean written by [write_flag], rejecting anything other than `0` or `1`.
pub(crate) fn read_flag<R: ByteReader>(source: &mut R) -> Result<bool, DeserializationError> {
    match source.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DeserializationError::InvalidValue(format!("invalid flag byte {other}"))),
    }
}

// TESTS
// ================================================================================================
