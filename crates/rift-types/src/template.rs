use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier of an item variant.
///
/// A `TemplateHash` is the BLAKE3 digest of a variant's canonical encoding
/// (see `rift-crypto`). Identical variants always produce the same hash,
/// which is what lets every owner holding a variant share one template.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateHash([u8; 32]);

impl TemplateHash {
    /// Compute a `TemplateHash` from raw bytes without domain separation.
    ///
    /// Intended for fixtures; production hashes come from the variant hasher.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `TemplateHash` from a pre-computed digest.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The null hash (all zeros). Never produced by the hasher.
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TemplateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateHash({})", self.short_hex())
    }
}

impl fmt::Display for TemplateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for TemplateHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<TemplateHash> for [u8; 32] {
    fn from(hash: TemplateHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_is_deterministic() {
        assert_eq!(TemplateHash::from_bytes(b"x"), TemplateHash::from_bytes(b"x"));
        assert_ne!(TemplateHash::from_bytes(b"x"), TemplateHash::from_bytes(b"y"));
    }

    #[test]
    fn null_is_all_zeros() {
        assert!(TemplateHash::null().is_null());
        assert!(!TemplateHash::from_bytes(b"x").is_null());
    }

    #[test]
    fn hex_roundtrip() {
        let hash = TemplateHash::from_bytes(b"diamond");
        let parsed = TemplateHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn from_hex_rejects_short_input() {
        let err = TemplateHash::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn display_is_full_hex() {
        let hash = TemplateHash::from_bytes(b"display");
        assert_eq!(format!("{hash}").len(), 64);
        assert_eq!(hash.short_hex().len(), 8);
    }
}
