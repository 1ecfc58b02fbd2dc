//! Payload compression
//!
//! The blob store treats compression as a pluggable function pair.

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// A compress/decompress function pair applied to every stored payload
pub trait BlobCodec: Send + Sync {
    fn compress(&self, data: &[u8]) -> StorageResult<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> StorageResult<Vec<u8>>;
}

/// zstd compression at a fixed level
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl BlobCodec for ZstdCodec {
    fn compress(&self, data: &[u8]) -> StorageResult<Vec<u8>> {
        zstd::bulk::compress(data, self.level)
            .map_err(|e| StorageError::compression(format!("zstd encode: {e}")))
    }

    fn decompress(&self, data: &[u8]) -> StorageResult<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| StorageError::compression(format!("zstd decode: {e}")))
    }
}

/// Stores payloads as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl BlobCodec for PassthroughCodec {
    fn compress(&self, data: &[u8]) -> StorageResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> StorageResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Serializable codec selection for configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Compression {
    None,
    Zstd { level: i32 },
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Zstd {
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Compression {
    /// Build the codec this setting selects
    pub fn codec(&self) -> Box<dyn BlobCodec> {
        match *self {
            Compression::None => Box::new(PassthroughCodec),
            Compression::Zstd { level } => Box::new(ZstdCodec::new(level)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip() {
        let codec = ZstdCodec::default();
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".repeat(16);
        let compressed = codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_zstd_empty_input() {
        let codec = ZstdCodec::default();
        let compressed = codec.compress(&[]).unwrap();
        assert!(codec.decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_zstd_rejects_garbage() {
        let codec = ZstdCodec::default();
        assert!(matches!(
            codec.decompress(b"definitely not zstd"),
            Err(StorageError::Compression(_))
        ));
    }

    #[test]
    fn test_compression_setting() {
        let codec = Compression::None.codec();
        assert_eq!(codec.compress(b"abc").unwrap(), b"abc");
    }
}
