//! Content-addressed blob storage
//!
//! This module provides deduplicated, reference-counted storage for
//! request and response bodies.
//!
//! Uses BLAKE3 for hashing, zstd for compression, redb rows for small
//! payloads and files for large ones.

mod codec;
mod handle;
mod store;

pub use codec::{BlobCodec, Compression, PassthroughCodec, ZstdCodec};
pub use handle::{BlobHandle, BlobPlacement};
pub use store::{BlobStats, BlobStore, BlobStoreConfig, GcResult};
