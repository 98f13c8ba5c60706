use sha3::Digest as Sha3Digest;

use super::Hasher;
use crate::Digest;

// KECCAK256 HASHER
// ================================================================================================

/// Keccak256 hash function
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Keccak256;

impl Hasher for Keccak256 {
    fn hash(bytes: &[u8]) -> Digest {
        let mut hasher = sha3::Keccak256::new();
        hasher.update(bytes);
        Digest::new(hasher.finalize().into())
    }

    fn merge(values: &[Digest; 2]) -> Digest {
        let mut hasher = sha3::Keccak256::new();
        hasher.update(values[0].as_bytes());
        hasher.update(values[1].as_bytes());
        Digest::new(hasher.finalize().into())
    }
}
