//! Session registry storage
//!
//! Stores metadata about capture sessions.

use std::sync::Arc;

use redb::{ReadableTable, WriteTransaction};
use tracing::debug;

use logvault_core::{SessionId, SessionRecord};

use super::tables::{RedbStorage, SESSIONS, decode, encode};
use crate::error::StorageResult;

/// Session registry for managing session metadata
pub struct SessionStore {
    storage: Arc<RedbStorage>,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Register or update a session record
    pub fn upsert(&self, record: &SessionRecord) -> StorageResult<()> {
        self.storage.write(|txn| upsert_in(txn, record))?;
        debug!(session = %record.id.short(), "Updated session record");
        Ok(())
    }

    /// Get a session record
    pub fn get(&self, id: &SessionId) -> StorageResult<Option<SessionRecord>> {
        self.storage.read(|txn| {
            let table = txn.open_table(SESSIONS)?;
            table
                .get(id.as_bytes().as_slice())?
                .map(|v| decode(v.value()))
                .transpose()
        })
    }

    /// All sessions, oldest first
    pub fn all(&self) -> StorageResult<Vec<SessionRecord>> {
        let mut records = self.storage.read(|txn| {
            let table = txn.open_table(SESSIONS)?;
            let mut records = Vec::new();
            for entry in table.iter()? {
                let (_key, value) = entry?;
                records.push(decode::<SessionRecord>(value.value())?);
            }
            Ok(records)
        })?;
        records.sort_by_key(|r| (r.started_at_millis, r.id));
        Ok(records)
    }

    /// Count all sessions
    pub fn count(&self) -> StorageResult<u64> {
        self.storage.read(|txn| {
            use redb::ReadableTableMetadata;
            Ok(txn.open_table(SESSIONS)?.len()?)
        })
    }
}

/// Insert or replace a session record inside an open transaction
pub(crate) fn upsert_in(txn: &WriteTransaction, record: &SessionRecord) -> StorageResult<()> {
    let value = encode(record)?;
    let mut table = txn.open_table(SESSIONS)?;
    table.insert(record.id.as_bytes().as_slice(), value.as_slice())?;
    Ok(())
}

/// Register a session on first use, keeping an existing record untouched
pub(crate) fn ensure_in(
    txn: &WriteTransaction,
    id: SessionId,
    started_at_millis: i64,
) -> StorageResult<()> {
    let exists = txn
        .open_table(SESSIONS)?
        .get(id.as_bytes().as_slice())?
        .is_some();
    if !exists {
        upsert_in(txn, &SessionRecord::new(id, started_at_millis))?;
    }
    Ok(())
}

/// Remove a session record inside an open transaction
pub(crate) fn remove_in(txn: &WriteTransaction, id: &SessionId) -> StorageResult<bool> {
    let mut table = txn.open_table(SESSIONS)?;
    Ok(table.remove(id.as_bytes().as_slice())?.is_some())
}
