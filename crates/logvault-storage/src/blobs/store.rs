//! Blob store implementation
//!
//! Content-addressed storage using BLAKE3 hashing. Small payloads live in
//! the `inline_data` table next to their handle; larger payloads are written
//! to files named by the hex hash. Both are stored compressed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use redb::{ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use logvault_core::BlobHash;

use super::codec::{BlobCodec, Compression};
use super::handle::{BlobHandle, BlobPlacement};
use crate::error::{StorageError, StorageResult};
use crate::structured::tables::{BLOBS, INLINE_DATA, RedbStorage, decode, encode};

/// Configuration for the blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Directory for externally stored payloads
    ///
    /// Inside a [`StoreConfig`](crate::StoreConfig) a relative path resolves
    /// against the store's base directory.
    pub base_dir: PathBuf,
    /// Number of subdirectory levels (for sharding)
    pub shard_depth: u8,
    /// Payloads of at most this many bytes are stored inline
    pub inline_threshold: usize,
    /// Maximum blob size (bytes)
    pub max_blob_size: u64,
    /// Compression applied to stored payloads
    pub compression: Compression,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("blobs"),
            shard_depth: 2,                   // e.g., ab/cd/abcdef...
            inline_threshold: 32 * 1024,      // 32KB
            max_blob_size: 512 * 1024 * 1024, // 512MB
            compression: Compression::default(),
        }
    }
}

/// Aggregate numbers about stored blobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobStats {
    pub count: u64,
    pub inline_count: u64,
    /// Bytes persisted (post-compression)
    pub stored_bytes: u64,
    /// Original payload bytes
    pub original_bytes: u64,
}

/// Result of garbage collection
#[derive(Debug, Default)]
pub struct GcResult {
    /// Number of orphaned files deleted
    pub deleted_count: usize,
    /// Number of files retained
    pub retained_count: usize,
    /// Bytes freed
    pub bytes_freed: u64,
}

/// Content-addressed, reference-counted blob store
///
/// `put` and `release` are serialized per content hash; `get` takes no lock.
pub struct BlobStore {
    config: BlobStoreConfig,
    db: Arc<RedbStorage>,
    codec: Box<dyn BlobCodec>,
    locks: DashMap<BlobHash, Arc<Mutex<()>>>,
}

impl BlobStore {
    /// Open a blob store using the codec selected by the configuration
    pub fn open(config: BlobStoreConfig, db: Arc<RedbStorage>) -> StorageResult<Self> {
        let codec = config.compression.codec();
        Self::open_with_codec(config, db, codec)
    }

    /// Open a blob store with a custom codec
    pub fn open_with_codec(
        config: BlobStoreConfig,
        db: Arc<RedbStorage>,
        codec: Box<dyn BlobCodec>,
    ) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.base_dir)?;

        info!(path = %config.base_dir.display(), "Blob store initialized");

        Ok(Self {
            config,
            db,
            codec,
            locks: DashMap::new(),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &BlobStoreConfig {
        &self.config
    }

    /// The codec used for stored payloads
    pub fn codec(&self) -> &dyn BlobCodec {
        self.codec.as_ref()
    }

    /// Store a payload, or add a reference to an existing identical one
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub fn put(&self, data: &[u8]) -> StorageResult<BlobHandle> {
        if data.len() as u64 > self.config.max_blob_size {
            return Err(StorageError::CapacityExceeded {
                size: data.len() as u64,
                max: self.config.max_blob_size,
            });
        }

        let hash = BlobHash::of(data);
        self.with_hash_lock(hash, || {
            if let Some(handle) = self.retain_existing(&hash)? {
                debug!(hash = %hash.short(), refs = handle.ref_count, "Blob already exists");
                return Ok(handle);
            }

            let stored = self.codec.compress(data)?;
            let placement = if data.len() <= self.config.inline_threshold {
                BlobPlacement::Inline
            } else {
                BlobPlacement::External
            };
            let handle = BlobHandle {
                hash,
                size: stored.len() as u64,
                decompressed_size: data.len() as u64,
                ref_count: 1,
                placement,
                stored_at_millis: logvault_core::now_millis(),
            };
            self.insert_new(&handle, &stored)?;

            debug!(hash = %hash.short(), ?placement, stored = stored.len(), "Stored blob");
            Ok(handle)
        })
    }

    /// Add a reference for an already-compressed payload (used when copying
    /// between stores that share a codec)
    pub fn put_stored(&self, source: &BlobHandle, stored: &[u8]) -> StorageResult<BlobHandle> {
        self.with_hash_lock(source.hash, || {
            if let Some(handle) = self.retain_existing(&source.hash)? {
                return Ok(handle);
            }
            let handle = BlobHandle {
                ref_count: 1,
                size: stored.len() as u64,
                ..*source
            };
            self.insert_new(&handle, stored)?;
            Ok(handle)
        })
    }

    /// Load and decompress a payload
    #[instrument(skip(self), fields(hash = %hash.short()))]
    pub fn get(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        let (_handle, stored) = self.get_stored(hash)?;
        let data = self.codec.decompress(&stored)?;

        let actual = BlobHash::of(&data);
        if actual != *hash {
            warn!(expected = %hash, actual = %actual, "Blob hash mismatch");
            return Err(StorageError::deserialization("Hash mismatch"));
        }

        Ok(Bytes::from(data))
    }

    /// Load the stored (still compressed) bytes of a payload
    pub fn get_stored(&self, hash: &BlobHash) -> StorageResult<(BlobHandle, Vec<u8>)> {
        let (handle, inline) = self.db.read(|txn| {
            let blobs = txn.open_table(BLOBS)?;
            let Some(value) = blobs.get(hash.as_bytes().as_slice())? else {
                return Ok((None, None));
            };
            let handle: BlobHandle = decode(value.value())?;
            let inline = txn
                .open_table(INLINE_DATA)?
                .get(hash.as_bytes().as_slice())?
                .map(|v| v.value().to_vec());
            Ok((Some(handle), inline))
        })?;

        let handle = handle.ok_or_else(|| StorageError::not_found(format!("blob {hash}")))?;
        let stored = match handle.placement {
            BlobPlacement::Inline => inline,
            BlobPlacement::External => self.read_file(hash)?,
        };
        let stored = stored.ok_or_else(|| {
            StorageError::not_found(format!("payload for blob {hash} ({:?})", handle.placement))
        })?;
        Ok((handle, stored))
    }

    /// Look up a handle without touching its payload
    pub fn handle(&self, hash: &BlobHash) -> StorageResult<Option<BlobHandle>> {
        self.db.read(|txn| {
            txn.open_table(BLOBS)?
                .get(hash.as_bytes().as_slice())?
                .map(|v| decode(v.value()))
                .transpose()
        })
    }

    /// Check if a handle exists
    pub fn exists(&self, hash: &BlobHash) -> StorageResult<bool> {
        Ok(self.handle(hash)?.is_some())
    }

    /// Drop one reference; the payload and handle are deleted at zero
    ///
    /// Returns the updated handle, or `None` once it has been removed.
    #[instrument(skip(self), fields(hash = %hash.short()))]
    pub fn release(&self, hash: &BlobHash) -> StorageResult<Option<BlobHandle>> {
        self.with_hash_lock(*hash, || {
            let outcome = self.db.write(|txn| {
                let mut blobs = txn.open_table(BLOBS)?;
                let key = hash.as_bytes().as_slice();
                let mut handle: BlobHandle = match blobs.get(key)? {
                    Some(value) => decode(value.value())?,
                    None => return Err(StorageError::not_found(format!("blob {hash}"))),
                };

                handle.ref_count = handle.ref_count.saturating_sub(1);
                if handle.ref_count > 0 {
                    blobs.insert(key, encode(&handle)?.as_slice())?;
                    return Ok((handle, false));
                }

                blobs.remove(key)?;
                txn.open_table(INLINE_DATA)?.remove(key)?;
                Ok((handle, true))
            })?;

            match outcome {
                (handle, false) => Ok(Some(handle)),
                (handle, true) => {
                    if handle.placement == BlobPlacement::External {
                        self.delete_file(hash)?;
                    }
                    debug!("Deleted blob");
                    Ok(None)
                }
            }
        })
    }

    /// All handles, ordered by hash
    pub fn list(&self) -> StorageResult<Vec<BlobHandle>> {
        self.db.read(|txn| {
            let table = txn.open_table(BLOBS)?;
            let mut handles = Vec::with_capacity(table.len()? as usize);
            for entry in table.iter()? {
                let (_key, value) = entry?;
                handles.push(decode(value.value())?);
            }
            Ok(handles)
        })
    }

    /// Aggregate statistics over all handles
    pub fn stats(&self) -> StorageResult<BlobStats> {
        Ok(self.list()?.iter().fold(BlobStats::default(), |mut stats, handle| {
            stats.count += 1;
            stats.stored_bytes += handle.size;
            stats.original_bytes += handle.decompressed_size;
            if handle.is_inline() {
                stats.inline_count += 1;
            }
            stats
        }))
    }

    /// Get the file path for an externally stored payload
    pub fn blob_path(&self, hash: &BlobHash) -> PathBuf {
        let hash_hex = hash.to_hex();

        let mut path = self.config.base_dir.clone();

        for i in 0..self.config.shard_depth as usize {
            let start = i * 2;
            let end = start + 2;
            if end <= hash_hex.len() {
                path.push(&hash_hex[start..end]);
            }
        }

        path.push(&hash_hex);
        path
    }

    /// Delete external files that no handle references
    ///
    /// Such files are left behind when a process dies between writing the
    /// file and committing its handle.
    pub fn gc(&self) -> StorageResult<GcResult> {
        let mut files = Vec::new();
        collect_files(&self.config.base_dir, &mut files)?;

        let mut result = GcResult::default();
        for (hash, path, len) in files {
            let removed = self.with_hash_lock(hash, || {
                if self.exists(&hash)? {
                    return Ok(false);
                }
                match std::fs::remove_file(&path) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(e.into()),
                }
            })?;
            if removed {
                result.deleted_count += 1;
                result.bytes_freed += len;
            } else {
                result.retained_count += 1;
            }
        }

        info!(
            deleted = result.deleted_count,
            retained = result.retained_count,
            bytes_freed = result.bytes_freed,
            "Garbage collection complete"
        );
        Ok(result)
    }

    fn retain_existing(&self, hash: &BlobHash) -> StorageResult<Option<BlobHandle>> {
        self.db.write(|txn| {
            let mut blobs = txn.open_table(BLOBS)?;
            let key = hash.as_bytes().as_slice();
            let existing: Option<BlobHandle> =
                blobs.get(key)?.map(|v| decode(v.value())).transpose()?;
            let Some(mut handle) = existing else {
                return Ok(None);
            };
            handle.ref_count += 1;
            blobs.insert(key, encode(&handle)?.as_slice())?;
            Ok(Some(handle))
        })
    }

    fn insert_new(&self, handle: &BlobHandle, stored: &[u8]) -> StorageResult<()> {
        if handle.placement == BlobPlacement::External {
            self.write_file(&handle.hash, stored)?;
        }

        let committed = self.db.write(|txn| {
            let key = handle.hash.as_bytes().as_slice();
            txn.open_table(BLOBS)?.insert(key, encode(handle)?.as_slice())?;
            if handle.placement == BlobPlacement::Inline {
                txn.open_table(INLINE_DATA)?.insert(key, stored)?;
            }
            Ok(())
        });

        if committed.is_err() && handle.placement == BlobPlacement::External {
            let _ = self.delete_file(&handle.hash);
        }
        committed
    }

    /// Write atomically (write to temp, then rename)
    fn write_file(&self, hash: &BlobHash, stored: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(hash);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, stored)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn read_file(&self, hash: &BlobHash) -> StorageResult<Option<Vec<u8>>> {
        match std::fs::read(self.blob_path(hash)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_file(&self, hash: &BlobHash) -> StorageResult<bool> {
        match std::fs::remove_file(self.blob_path(hash)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_for(&self, hash: BlobHash) -> Arc<Mutex<()>> {
        self.locks.entry(hash).or_default().clone()
    }

    /// Run `f` while holding the mutation lock for `hash`
    fn with_hash_lock<T>(&self, hash: BlobHash, f: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
        let lock = self.lock_for(hash);
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.locks.remove_if(&hash, |_, lock| Arc::strong_count(lock) == 1);
        result
    }
}

/// Recursively collect `(hash, path, len)` for files named by a hex hash
fn collect_files(dir: &Path, out: &mut Vec<(BlobHash, PathBuf, u64)>) -> StorageResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
            continue;
        }
        let hash = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|name| name.len() == 64)
            .and_then(|name| name.parse::<BlobHash>().ok());
        if let Some(hash) = hash {
            out.push((hash, path.clone(), entry.metadata()?.len()));
        }
    }
    Ok(())
}
