//! Content hashes for stored payloads

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// BLAKE3 digest of a payload, used as its storage key
///
/// Identical content always maps to the same hash, which is what makes
/// request/response bodies deduplicate across tasks and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlobHash(pub [u8; 32]);

impl BlobHash {
    /// Hash a payload
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex encoding (used for external file names)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hash for display (first 8 hex chars)
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Rebuild a hash from raw table key bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHash(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self(hash))
    }
}

impl FromStr for BlobHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHash(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for BlobHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_same_hash() {
        let a = BlobHash::of(b"Hello, world!");
        let b = BlobHash::of(b"Hello, world!");
        let c = BlobHash::of(b"Different data");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = BlobHash::of(b"payload");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<BlobHash>().unwrap(), hash);
        assert!(hex.starts_with(&hash.short()));
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(BlobHash::from_slice(&[0u8; 16]).is_err());
        assert!("abcd".parse::<BlobHash>().is_err());
        assert!("zz".parse::<BlobHash>().is_err());
    }
}
