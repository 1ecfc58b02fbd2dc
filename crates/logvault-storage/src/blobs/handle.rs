//! Blob handle records

use serde::{Deserialize, Serialize};

use logvault_core::BlobHash;

/// Where a blob's stored bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlobPlacement {
    /// Stored as an inline-data row in the database
    Inline,
    /// Stored as a file named by the hex hash
    External,
}

/// Reference to a stored byte payload
///
/// One handle exists per distinct content hash. `ref_count` tracks how many
/// request/response body fields currently point at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHandle {
    /// Hash of the original (decompressed) payload
    pub hash: BlobHash,
    /// Bytes actually persisted (post-compression)
    pub size: u64,
    /// Original payload size
    pub decompressed_size: u64,
    /// Number of body fields referencing this handle
    pub ref_count: u32,
    pub placement: BlobPlacement,
    /// When the payload was first stored (Unix millis)
    pub stored_at_millis: i64,
}

impl BlobHandle {
    pub fn is_inline(&self) -> bool {
        self.placement == BlobPlacement::Inline
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Blob({}, {} bytes stored, {} refs)",
            self.hash.short(),
            self.size,
            self.ref_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let handle = BlobHandle {
            hash: BlobHash::of(b"test"),
            size: 4,
            decompressed_size: 4,
            ref_count: 2,
            placement: BlobPlacement::Inline,
            stored_at_millis: 0,
        };
        let display = handle.to_string();
        assert!(display.contains("Blob"));
        assert!(display.contains("2 refs"));
        assert!(handle.is_inline());
    }
}
