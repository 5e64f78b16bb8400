use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Public identity of an account owner.
///
/// The bytes are an ed25519 public key: the same key that signs operations on
/// behalf of the owner, so the ledger can check a signature against the
/// identity a record was created under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicIdentity([u8; 32]);

impl PublicIdentity {
    /// Create from a raw 32-byte public key.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("id:{}", hex::encode(&self.0[..4]))
    }

    /// Parse from a hex string, with or without the `id:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("id:").unwrap_or(s);
        crate::decode_hex32(s).map(Self)
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicIdentity({})", self.short_id())
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for PublicIdentity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_format() {
        let id = PublicIdentity::from_bytes([0xab; 32]);
        assert_eq!(id.short_id(), "id:abababab");
    }

    #[test]
    fn hex_roundtrip_with_prefix() {
        let id = PublicIdentity::from_bytes([9; 32]);
        let prefixed = format!("id:{}", id.to_hex());
        assert_eq!(PublicIdentity::from_hex(&prefixed).unwrap(), id);
        assert_eq!(id.to_string().parse::<PublicIdentity>().unwrap(), id);
    }

    #[test]
    fn from_hex_rejects_short_input() {
        let err = PublicIdentity::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            PublicIdentity::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }
}
