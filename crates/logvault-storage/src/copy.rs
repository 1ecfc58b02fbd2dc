//! Filtered store copies
//!
//! Archive exports materialize the entities selected by a [`LogFilter`]
//! into a fresh store, keeping ids, and copy the referenced bodies as
//! stored (still compressed) bytes.

use std::collections::{BTreeMap, BTreeSet};

use redb::{ReadableTable, ReadableTableMetadata};
use tracing::{debug, info, instrument};

use logvault_core::{BlobHash, MessageRecord, NetworkTaskRecord, SessionId, SessionRecord};

use crate::error::{StorageError, StorageResult};
use crate::log_store::{LogStore, StoreConfig, insert_message_in, insert_task_in};
use crate::query::LogFilter;
use crate::structured::sessions;
use crate::structured::tables::{
    DOMAINS, LABELS, MESSAGES, NETWORK_TASKS, NEXT_MESSAGE_ID, NEXT_TASK_ID, SESSIONS,
    adjust_count, bump_counter, decode,
};

/// What a filtered copy contains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub sessions: Vec<SessionId>,
    pub messages: usize,
    pub tasks: usize,
    /// Distinct bodies copied
    pub bodies: usize,
}

struct Snapshot {
    sessions: Vec<SessionRecord>,
    messages: Vec<MessageRecord>,
    tasks: Vec<NetworkTaskRecord>,
}

impl LogStore {
    /// Copy the entities matching `filter` into a new store at `dest`
    ///
    /// `should_continue` is polled between bodies; when it returns false
    /// the copy stops and `Ok(None)` is returned. The destination always
    /// uses this store's compression so stored bytes can be copied as-is.
    #[instrument(skip(self, filter, dest, should_continue), fields(dest = %dest.base_dir.display()))]
    pub fn copy_filtered(
        &self,
        filter: &LogFilter,
        mut dest: StoreConfig,
        mut should_continue: impl FnMut() -> bool,
    ) -> StorageResult<Option<(LogStore, CopySummary)>> {
        let snapshot = self.snapshot(filter)?;
        if !should_continue() {
            return Ok(None);
        }

        dest.blobs.compression = self.config().blobs.compression;
        let target = LogStore::open(dest)?;
        if target.info()?.messages > 0 {
            return Err(StorageError::InvalidRecord(format!(
                "copy destination {} is not empty",
                target.config().base_dir.display()
            )));
        }

        let mut summary = CopySummary {
            sessions: snapshot.sessions.iter().map(|s| s.id).collect(),
            messages: snapshot.messages.len(),
            tasks: snapshot.tasks.len(),
            bodies: 0,
        };

        target.storage().write(|txn| {
            for session in &snapshot.sessions {
                sessions::upsert_in(txn, session)?;
            }
            for message in &snapshot.messages {
                insert_message_in(txn, message)?;
                adjust_count(txn, LABELS, &message.label, 1)?;
                bump_counter(txn, NEXT_MESSAGE_ID, message.id.0)?;
            }
            for task in &snapshot.tasks {
                insert_task_in(txn, task)?;
                if let Some(host) = &task.host {
                    adjust_count(txn, DOMAINS, host, 1)?;
                }
                bump_counter(txn, NEXT_TASK_ID, task.id.0)?;
            }
            Ok(())
        })?;

        // One reference per body field, so ref counts match the copied tasks
        let mut copied = BTreeSet::<BlobHash>::new();
        for hash in snapshot.tasks.iter().flat_map(NetworkTaskRecord::body_refs) {
            if !should_continue() {
                return Ok(None);
            }
            let (handle, stored) = self.blobs().get_stored(&hash)?;
            target.blobs().put_stored(&handle, &stored)?;
            copied.insert(hash);
        }
        summary.bodies = copied.len();

        info!(
            sessions = summary.sessions.len(),
            messages = summary.messages,
            tasks = summary.tasks,
            bodies = summary.bodies,
            "Copied filtered store"
        );
        Ok(Some((target, summary)))
    }

    /// Read the filtered entities and everything they reference in one transaction
    fn snapshot(&self, filter: &LogFilter) -> StorageResult<Snapshot> {
        let predicate = filter.predicate();

        self.storage().read(|txn| {
            let message_table = txn.open_table(MESSAGES)?;
            let task_table = txn.open_table(NETWORK_TASKS)?;
            let session_table = txn.open_table(SESSIONS)?;

            let mut messages = Vec::new();
            let mut tasks = Vec::new();
            for entry in message_table.iter()? {
                let (_key, value) = entry?;
                let message: MessageRecord = decode(value.value())?;
                if !predicate.matches_message(&message) {
                    continue;
                }
                if let Some(task_id) = message.task {
                    let task = task_table
                        .get(task_id.0)?
                        .ok_or_else(|| StorageError::not_found(format!("task {task_id}")))?;
                    tasks.push(decode::<NetworkTaskRecord>(task.value())?);
                }
                messages.push(message);
            }

            let mut sessions = BTreeMap::new();
            for id in messages.iter().map(|m| m.session) {
                if sessions.contains_key(&id) {
                    continue;
                }
                let record = match session_table.get(id.as_bytes().as_slice())? {
                    Some(value) => decode(value.value())?,
                    None => SessionRecord::new(id, 0),
                };
                sessions.insert(id, record);
            }

            debug!(
                scanned = message_table.len()?,
                messages = messages.len(),
                tasks = tasks.len(),
                "Took filtered snapshot"
            );
            Ok(Snapshot {
                sessions: sessions.into_values().collect(),
                messages,
                tasks,
            })
        })
    }
}
