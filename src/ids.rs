//! Fixed-size identities used throughout the update protocol.

use core::fmt::{self, Display};

use crate::utils::{
    ByteReader, ByteWriter, Deserializable, DeserializationError, HexParseError, Serializable,
    bytes_to_hex_string, hex_to_bytes,
};

/// Number of bytes in every identity type.
pub const ID_BYTES: usize = 32;

/// Domain separator for deriving [SessionId]s.
const SESSION_DOMAIN: &[u8] = b"commitment-tree/session";

macro_rules! byte_identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
        pub struct $name([u8; ID_BYTES]);

        impl $name {
            /// Creates the identity from raw bytes.
            pub const fn new(bytes: [u8; ID_BYTES]) -> Self {
                Self(bytes)
            }

            /// Derives an identity by hashing an arbitrary seed with BLAKE3.
            pub fn from_seed(seed: &[u8]) -> Self {
                Self(*blake3::hash(seed).as_bytes())
            }

            /// Returns the raw bytes of this identity.
            pub const fn as_bytes(&self) -> &[u8; ID_BYTES] {
                &self.0
            }

            /// Returns hexadecimal representation prefixed with `0x`.
            pub fn to_hex(&self) -> String {
                bytes_to_hex_string(self.0)
            }
        }

        impl From<[u8; ID_BYTES]> for $name {
            fn from(value: [u8; ID_BYTES]) -> Self {
                Self(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = HexParseError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                hex_to_bytes(value).map(Self)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serializable for $name {
            fn write_into<W: ByteWriter>(&self, target: &mut W) {
                target.write_bytes(&self.0);
            }

            fn get_size_hint(&self) -> usize {
                ID_BYTES
            }
        }

        impl Deserializable for $name {
            fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
                source.read_array().map(Self)
            }
        }
    };
}

byte_identity!(
    /// Identity of a commitment tree.
    TreeKey
);

byte_identity!(
    /// Identity of a caller: a coordinator driving a session, or the governing authority allowed
    /// to reclaim abandoned sessions.
    CoordinatorId
);

byte_identity!(
    /// Identity of an update session record.
    ///
    /// Derived from the target tree and the coordinator, so a coordinator has at most one session
    /// record per tree.
    SessionId
);

impl SessionId {
    /// Derives the session identity for `coordinator` updating `tree_key`.
    pub fn derive(tree_key: TreeKey, coordinator: CoordinatorId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SESSION_DOMAIN);
        hasher.update(tree_key.as_bytes());
        hasher.update(coordinator.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}
