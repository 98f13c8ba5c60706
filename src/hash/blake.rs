use super::Hasher;
use crate::Digest;

// BLAKE3 256-BIT HASHER
// ================================================================================================

/// BLAKE3 hash function with 256-bit output.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Blake3_256;

impl Hasher for Blake3_256 {
    fn hash(bytes: &[u8]) -> Digest {
        blake3::hash(bytes).into()
    }

    fn merge(values: &[Digest; 2]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&values[0]);
        hasher.update(&values[1]);
        hasher.finalize().into()
    }
}
