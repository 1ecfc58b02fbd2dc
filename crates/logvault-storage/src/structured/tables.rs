//! redb table definitions and storage manager
//!
//! Defines all tables used for structured storage. Records are
//! postcard-serialized; relationships between tables are plain keys.

use std::path::PathBuf;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::{StorageError, StorageResult};

// Key: counter/setting name, Value: integer
pub const META: TableDefinition<&str, i64> = TableDefinition::new("meta");

// Key: session id (16 bytes), Value: serialized SessionRecord
pub const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");

// Key: message id, Value: serialized MessageRecord
pub const MESSAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("messages");

// Key: task id, Value: serialized NetworkTaskRecord
pub const NETWORK_TASKS: TableDefinition<u64, &[u8]> = TableDefinition::new("network_tasks");

// Key: label name, Value: number of messages using it
pub const LABELS: TableDefinition<&str, u64> = TableDefinition::new("labels");

// Key: host name, Value: number of tasks using it
pub const DOMAINS: TableDefinition<&str, u64> = TableDefinition::new("domains");

// Key: content hash (32 bytes), Value: serialized BlobHandle
pub const BLOBS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("blobs");

// Key: content hash (32 bytes), Value: stored (compressed) payload
pub const INLINE_DATA: TableDefinition<&[u8], &[u8]> = TableDefinition::new("inline_data");

pub(crate) const NEXT_MESSAGE_ID: &str = "next_message_id";
pub(crate) const NEXT_TASK_ID: &str = "next_task_id";
pub(crate) const CREATED_AT: &str = "created_at_millis";

/// Configuration for redb storage
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/logvault.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Database,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> StorageResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)?;

        info!("Opened redb database");

        let storage = Self { db, config };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Create every table and stamp the creation time on first open
    fn init_tables(&self) -> StorageResult<()> {
        self.write(|txn| {
            txn.open_table(SESSIONS)?;
            txn.open_table(MESSAGES)?;
            txn.open_table(NETWORK_TASKS)?;
            txn.open_table(LABELS)?;
            txn.open_table(DOMAINS)?;
            txn.open_table(BLOBS)?;
            txn.open_table(INLINE_DATA)?;

            let mut meta = txn.open_table(META)?;
            if meta.get(CREATED_AT)?.is_none() {
                meta.insert(CREATED_AT, logvault_core::now_millis())?;
            }
            Ok(())
        })?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Run `f` inside a read transaction (a consistent snapshot)
    pub fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> StorageResult<T>) -> StorageResult<T> {
        let txn = self.db.begin_read()?;
        f(&txn)
    }

    /// Run `f` inside a write transaction, committing if it succeeds
    ///
    /// The transaction is aborted when `f` returns an error.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let txn = self.db.begin_write()?;
        let value = f(&txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Read a value from the meta table
    pub fn meta(&self, key: &str) -> StorageResult<Option<i64>> {
        self.read(|txn| {
            let table = txn.open_table(META)?;
            Ok(table.get(key)?.map(|v| v.value()))
        })
    }

    /// Size of the database file on disk
    pub fn file_size(&self) -> StorageResult<u64> {
        Ok(std::fs::metadata(&self.config.db_path)?.len())
    }
}

/// Allocate the next id from a meta counter inside a write transaction
pub(crate) fn next_id(txn: &WriteTransaction, counter: &str) -> StorageResult<u64> {
    let mut meta = txn.open_table(META)?;
    let next = meta.get(counter)?.map(|v| v.value()).unwrap_or(1);
    meta.insert(counter, next + 1)?;
    Ok(next as u64)
}

/// Raise a meta counter so it stays above an imported id
pub(crate) fn bump_counter(txn: &WriteTransaction, counter: &str, used: u64) -> StorageResult<()> {
    let mut meta = txn.open_table(META)?;
    let next = meta.get(counter)?.map(|v| v.value()).unwrap_or(1);
    if (used as i64) >= next {
        meta.insert(counter, used as i64 + 1)?;
    }
    Ok(())
}

/// Serialize a record for storage
pub(crate) fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| StorageError::serialization(e.to_string()))
}

/// Deserialize a stored record
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

/// Adjust a usage counter (labels, domains), removing the row at zero
pub(crate) fn adjust_count(
    txn: &WriteTransaction,
    table: TableDefinition<&str, u64>,
    key: &str,
    delta: i64,
) -> StorageResult<u64> {
    let mut table = txn.open_table(table)?;
    let current = table.get(key)?.map(|v| v.value()).unwrap_or(0);
    let updated = (current as i64 + delta).max(0) as u64;
    if updated == 0 {
        table.remove(key)?;
    } else {
        table.insert(key, updated)?;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (RedbStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStorageConfig {
            db_path: temp_dir.path().join("test.redb"),
            ..Default::default()
        };
        let storage = RedbStorage::open(config).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_created_at_stamped_once() {
        let (storage, temp) = create_test_storage();
        let created = storage.meta(CREATED_AT).unwrap().unwrap();
        drop(storage);

        let reopened = RedbStorage::open(RedbStorageConfig {
            db_path: temp.path().join("test.redb"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(reopened.meta(CREATED_AT).unwrap(), Some(created));
    }

    #[test]
    fn test_next_id_is_dense() {
        let (storage, _temp) = create_test_storage();
        let ids: Vec<u64> = (0..3)
            .map(|_| storage.write(|txn| next_id(txn, NEXT_MESSAGE_ID)).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        storage.write(|txn| bump_counter(txn, NEXT_MESSAGE_ID, 10)).unwrap();
        let id = storage.write(|txn| next_id(txn, NEXT_MESSAGE_ID)).unwrap();
        assert_eq!(id, 11);
    }

    #[test]
    fn test_failed_write_is_aborted() {
        let (storage, _temp) = create_test_storage();
        let result: StorageResult<()> = storage.write(|txn| {
            next_id(txn, NEXT_TASK_ID)?;
            Err(StorageError::InvalidRecord("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(storage.meta(NEXT_TASK_ID).unwrap(), None);
    }

    #[test]
    fn test_adjust_count_removes_at_zero() {
        let (storage, _temp) = create_test_storage();
        storage.write(|txn| adjust_count(txn, LABELS, "network", 2)).unwrap();
        let remaining = storage.write(|txn| adjust_count(txn, LABELS, "network", -1)).unwrap();
        assert_eq!(remaining, 1);
        storage.write(|txn| adjust_count(txn, LABELS, "network", -1)).unwrap();

        let present = storage
            .read(|txn| Ok(txn.open_table(LABELS)?.get("network")?.is_some()))
            .unwrap();
        assert!(!present);
    }
}
