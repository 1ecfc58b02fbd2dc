//! The entity store
//!
//! [`LogStore`] combines the redb tables and the [`BlobStore`] behind the
//! create-only ingestion API and the filtered query API.
//!
//! ## Storage Flow
//!
//! ```text
//! Message arrives → LogStore.record_message()
//!   ├─ Register the session on first use
//!   ├─ Allocate a message id
//!   └─ Insert the message, bump its label count
//!
//! Task starts → LogStore.begin_task()
//!   ├─ Store the request body in the BlobStore
//!   ├─ Insert the pending task, bump its domain count
//!   └─ Insert its lifecycle message (label "network")
//!
//! Task ends → LogStore.complete_task()
//!   ├─ Store the response body in the BlobStore
//!   └─ Update the task and its lifecycle message level
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use redb::{ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use logvault_core::network::host_of;
use logvault_core::{
    BlobHash, DomainRecord, LabelRecord, LogLevel, MessageId, MessageRecord, NetworkTaskRecord,
    ProgressRecord, RequestState, SessionId, SessionRecord, TaskId, now_millis,
};

use crate::blobs::{BlobHandle, BlobStats, BlobStore, BlobStoreConfig};
use crate::error::{StorageError, StorageResult};
use crate::ingest::{NETWORK_LABEL, NewMessage, NewTask, TaskCompletion};
use crate::query::{LogFilter, task_level};
use crate::structured::sessions::{self, SessionStore};
use crate::structured::tables::{
    CREATED_AT, DOMAINS, LABELS, MESSAGES, NETWORK_TASKS, NEXT_MESSAGE_ID, NEXT_TASK_ID,
    RedbStorage, SESSIONS, RedbStorageConfig, adjust_count, decode, encode, next_id,
};

/// Configuration for a store directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for all storage
    pub base_dir: PathBuf,
    /// Database file name inside `base_dir`
    pub db_file: String,
    /// redb cache size in bytes
    pub cache_size: usize,
    /// Blob store configuration
    pub blobs: BlobStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data"),
            db_file: "logvault.redb".to_string(),
            cache_size: RedbStorageConfig::default().cache_size,
            blobs: BlobStoreConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration with a custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_blobs(mut self, blobs: BlobStoreConfig) -> Self {
        self.blobs = blobs;
        self
    }

    pub fn with_inline_threshold(mut self, inline_threshold: usize) -> Self {
        self.blobs.inline_threshold = inline_threshold;
        self
    }

    /// Path of the database file
    pub fn db_path(&self) -> PathBuf {
        self.base_dir.join(&self.db_file)
    }

    /// Blob configuration with its directory resolved against `base_dir`
    pub fn blob_config(&self) -> BlobStoreConfig {
        BlobStoreConfig {
            base_dir: self.base_dir.join(&self.blobs.base_dir),
            ..self.blobs.clone()
        }
    }

    fn redb_config(&self) -> RedbStorageConfig {
        RedbStorageConfig {
            db_path: self.db_path(),
            cache_size: self.cache_size,
        }
    }
}

/// One fetched entity, in display order
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Message(MessageRecord),
    /// A network task, standing in for its lifecycle message
    Task(Box<NetworkTaskRecord>),
}

impl LogEntry {
    pub fn created_at_millis(&self) -> i64 {
        match self {
            LogEntry::Message(message) => message.created_at_millis,
            LogEntry::Task(task) => task.created_at_millis,
        }
    }

    pub fn session(&self) -> SessionId {
        match self {
            LogEntry::Message(message) => message.session,
            LogEntry::Task(task) => task.session,
        }
    }

    pub fn level(&self) -> LogLevel {
        match self {
            LogEntry::Message(message) => message.level,
            LogEntry::Task(task) => task_level(task),
        }
    }

    pub fn as_task(&self) -> Option<&NetworkTaskRecord> {
        match self {
            LogEntry::Task(task) => Some(task),
            LogEntry::Message(_) => None,
        }
    }
}

/// Store-wide statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreInfo {
    pub sessions: u64,
    pub messages: u64,
    pub tasks: u64,
    pub labels: u64,
    pub domains: u64,
    pub blobs: BlobStats,
    /// Size of the database file
    pub db_bytes: u64,
    /// When the store was created (Unix millis)
    pub created_at_millis: Option<i64>,
}

/// What a session deletion removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedSession {
    pub messages: usize,
    pub tasks: usize,
    /// Body references released
    pub released_bodies: usize,
}

/// Persistent store of sessions, messages, network tasks and their bodies
pub struct LogStore {
    redb: Arc<RedbStorage>,
    sessions: SessionStore,
    blobs: Arc<BlobStore>,
    config: StoreConfig,
}

impl LogStore {
    /// Open (or create) the store under `config.base_dir`
    #[instrument(skip(config), fields(base_dir = %config.base_dir.display()))]
    pub fn open(config: StoreConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.base_dir)?;

        let redb = Arc::new(RedbStorage::open(config.redb_config())?);
        let sessions = SessionStore::new(redb.clone());
        let blobs = Arc::new(BlobStore::open(config.blob_config(), redb.clone())?);

        info!("Log store initialized");

        Ok(Self {
            redb,
            sessions,
            blobs,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying database
    pub fn storage(&self) -> &Arc<RedbStorage> {
        &self.redb
    }

    /// The body store
    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    // ========== Sessions ==========

    /// Register (or update) a session's metadata
    pub fn register_session(&self, record: &SessionRecord) -> StorageResult<()> {
        self.sessions.upsert(record)
    }

    pub fn session(&self, id: &SessionId) -> StorageResult<Option<SessionRecord>> {
        self.sessions.get(id)
    }

    /// All sessions, oldest first
    pub fn sessions(&self) -> StorageResult<Vec<SessionRecord>> {
        self.sessions.all()
    }

    /// Remove a session with all of its messages, tasks and body references
    #[instrument(skip(self), fields(session = %id.short()))]
    pub fn delete_session(&self, id: &SessionId) -> StorageResult<DeletedSession> {
        let (summary, bodies) = self.redb.write(|txn| {
            let mut summary = DeletedSession::default();
            let mut labels = Vec::new();
            let mut hosts = Vec::new();
            let mut bodies = Vec::new();

            {
                let mut messages = txn.open_table(MESSAGES)?;
                let mut doomed = Vec::new();
                for entry in messages.iter()? {
                    let (key, value) = entry?;
                    let message: MessageRecord = decode(value.value())?;
                    if message.session == *id {
                        doomed.push(key.value());
                        labels.push(message.label);
                    }
                }
                for key in &doomed {
                    messages.remove(*key)?;
                }
                summary.messages = doomed.len();
            }

            {
                let mut tasks = txn.open_table(NETWORK_TASKS)?;
                let mut doomed = Vec::new();
                for entry in tasks.iter()? {
                    let (key, value) = entry?;
                    let task: NetworkTaskRecord = decode(value.value())?;
                    if task.session == *id {
                        doomed.push(key.value());
                        bodies.extend(task.body_refs());
                        hosts.extend(task.host);
                    }
                }
                for key in &doomed {
                    tasks.remove(*key)?;
                }
                summary.tasks = doomed.len();
            }

            for label in &labels {
                adjust_count(txn, LABELS, label, -1)?;
            }
            for host in &hosts {
                adjust_count(txn, DOMAINS, host, -1)?;
            }
            sessions::remove_in(txn, id)?;
            Ok((summary, bodies))
        })?;

        let mut summary = summary;
        for hash in &bodies {
            self.blobs.release(hash)?;
            summary.released_bodies += 1;
        }

        info!(
            messages = summary.messages,
            tasks = summary.tasks,
            bodies = summary.released_bodies,
            "Deleted session"
        );
        Ok(summary)
    }

    // ========== Ingestion ==========

    /// Record a log line
    pub fn record_message(&self, new: NewMessage) -> StorageResult<MessageRecord> {
        let created_at_millis = new.created_at_millis.unwrap_or_else(now_millis);

        let record = self.redb.write(|txn| {
            sessions::ensure_in(txn, new.session, created_at_millis)?;
            let record = MessageRecord {
                id: MessageId(next_id(txn, NEXT_MESSAGE_ID)?),
                session: new.session,
                created_at_millis,
                level: new.level,
                label: new.label,
                text: new.text,
                file: new.file,
                function: new.function,
                line: new.line,
                metadata: new.metadata,
                task: None,
                pinned: false,
            };
            insert_message_in(txn, &record)?;
            adjust_count(txn, LABELS, &record.label, 1)?;
            Ok(record)
        })?;

        debug!(id = %record.id, level = %record.level, "Recorded message");
        Ok(record)
    }

    /// Record a task that has just started, with its lifecycle message
    #[instrument(skip(self, new), fields(session = %new.session.short()))]
    pub fn begin_task(&self, new: NewTask) -> StorageResult<NetworkTaskRecord> {
        let created_at_millis = new.created_at_millis.unwrap_or_else(now_millis);
        let request_body = self.put_body(new.request_body.as_ref())?;

        let result = self.redb.write(|txn| {
            sessions::ensure_in(txn, new.session, created_at_millis)?;
            let id = TaskId(next_id(txn, NEXT_TASK_ID)?);
            let message_id = MessageId(next_id(txn, NEXT_MESSAGE_ID)?);

            let url = new.request.url.clone();
            let host = url.as_deref().and_then(host_of);
            let task = NetworkTaskRecord {
                id,
                session: new.session,
                created_at_millis,
                task_identifier: new.task_identifier,
                task_type: new.task_type,
                http_method: new.request.method.clone(),
                url,
                host,
                status_code: None,
                error_domain: None,
                error_code: None,
                response_content_type: None,
                is_from_cache: false,
                state: RequestState::Pending,
                duration_millis: None,
                original_request: new.request,
                current_request: None,
                response: None,
                error: None,
                metrics: None,
                progress: None,
                request_body: request_body.map(|h| h.hash),
                response_body: None,
                request_body_size: request_body.map_or(0, |h| h.decompressed_size),
                response_body_size: 0,
                message: Some(message_id),
                pinned: false,
            };

            let message = lifecycle_message(&task, message_id);
            insert_task_in(txn, &task)?;
            insert_message_in(txn, &message)?;
            adjust_count(txn, LABELS, NETWORK_LABEL, 1)?;
            if let Some(host) = &task.host {
                adjust_count(txn, DOMAINS, host, 1)?;
            }
            Ok(task)
        });

        self.release_on_error(result, request_body)
            .inspect(|task| debug!(id = %task.id, "Began task"))
    }

    /// Record transfer progress for a pending task
    pub fn update_progress(
        &self,
        id: TaskId,
        completed_units: i64,
        total_units: i64,
    ) -> StorageResult<NetworkTaskRecord> {
        self.redb.write(|txn| {
            let mut task = load_task_in(txn, id)?;
            let progress = task.progress.get_or_insert(ProgressRecord {
                completed_units: 0,
                total_units: 0,
            });
            progress.completed_units = completed_units;
            progress.total_units = total_units;
            insert_task_in(txn, &task)?;
            Ok(task)
        })
    }

    /// Record the outcome of a pending task
    #[instrument(skip(self, completion), fields(task = %id))]
    pub fn complete_task(
        &self,
        id: TaskId,
        completion: TaskCompletion,
    ) -> StorageResult<NetworkTaskRecord> {
        completion.validate()?;
        let completed_at_millis = completion.completed_at_millis.unwrap_or_else(now_millis);
        let failed = completion.is_failure();
        let response_body = self.put_body(completion.response_body.as_ref())?;

        let result = self.redb.write(|txn| {
            let mut task = load_task_in(txn, id)?;
            if task.state != RequestState::Pending {
                return Err(StorageError::InvalidRecord(format!(
                    "task {id} already completed"
                )));
            }

            task.state = if failed {
                RequestState::Failure
            } else {
                RequestState::Success
            };
            task.status_code = completion.response.as_ref().and_then(|r| r.status_code);
            task.response_content_type =
                completion.response.as_ref().and_then(|r| r.content_type());
            task.error_domain = completion.error.as_ref().map(|e| e.domain.clone());
            task.error_code = completion.error.as_ref().map(|e| e.code);
            task.is_from_cache = completion.is_from_cache;
            task.duration_millis = Some(
                completion
                    .metrics
                    .as_ref()
                    .map(|m| m.duration_millis)
                    .unwrap_or(completed_at_millis - task.created_at_millis)
                    .max(0),
            );
            if let Some(request) = completion.current_request {
                task.current_request = Some(request);
            }
            task.response = completion.response;
            task.error = completion.error;
            task.metrics = completion.metrics;
            task.response_body = response_body.map(|h| h.hash);
            task.response_body_size = response_body.map_or(0, |h| h.decompressed_size);

            if let Some(message_id) = task.message {
                let mut message = load_message_in(txn, message_id)?;
                message.level = task_level(&task);
                message.text = task.summary();
                insert_message_in(txn, &message)?;
            }
            insert_task_in(txn, &task)?;
            Ok(task)
        });

        self.release_on_error(result, response_body).inspect(|task| {
            debug!(state = ?task.state, status = ?task.status_code, "Completed task")
        })
    }

    /// Record a task that has already finished
    pub fn record_task(
        &self,
        new: NewTask,
        completion: TaskCompletion,
    ) -> StorageResult<NetworkTaskRecord> {
        completion.validate()?;
        let task = self.begin_task(new)?;
        self.complete_task(task.id, completion)
    }

    // ========== Lookups ==========

    pub fn message(&self, id: MessageId) -> StorageResult<Option<MessageRecord>> {
        self.redb
            .read(|txn| get_record(&txn.open_table(MESSAGES)?, id.0))
    }

    pub fn task(&self, id: TaskId) -> StorageResult<Option<NetworkTaskRecord>> {
        self.redb
            .read(|txn| get_record(&txn.open_table(NETWORK_TASKS)?, id.0))
    }

    pub fn set_message_pinned(&self, id: MessageId, pinned: bool) -> StorageResult<MessageRecord> {
        self.redb.write(|txn| {
            let mut message = load_message_in(txn, id)?;
            message.pinned = pinned;
            insert_message_in(txn, &message)?;
            Ok(message)
        })
    }

    pub fn set_task_pinned(&self, id: TaskId, pinned: bool) -> StorageResult<NetworkTaskRecord> {
        self.redb.write(|txn| {
            let mut task = load_task_in(txn, id)?;
            task.pinned = pinned;
            insert_task_in(txn, &task)?;
            Ok(task)
        })
    }

    /// Labels in use, by name
    pub fn labels(&self) -> StorageResult<Vec<LabelRecord>> {
        self.redb.read(|txn| {
            let table = txn.open_table(LABELS)?;
            let mut labels = Vec::new();
            for entry in table.iter()? {
                let (name, count) = entry?;
                labels.push(LabelRecord {
                    name: name.value().to_string(),
                    count: count.value(),
                });
            }
            Ok(labels)
        })
    }

    /// Hosts in use, by name
    pub fn domains(&self) -> StorageResult<Vec<DomainRecord>> {
        self.redb.read(|txn| {
            let table = txn.open_table(DOMAINS)?;
            let mut domains = Vec::new();
            for entry in table.iter()? {
                let (value, count) = entry?;
                domains.push(DomainRecord {
                    value: value.value().to_string(),
                    count: count.value(),
                });
            }
            Ok(domains)
        })
    }

    /// Load a body payload
    pub fn body(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        self.blobs.get(hash)
    }

    // ========== Queries ==========

    /// Entities matching `filter`, oldest first, read from one snapshot
    ///
    /// Lifecycle messages are replaced by the task they document.
    #[instrument(skip(self, filter))]
    pub fn fetch(&self, filter: &LogFilter) -> StorageResult<Vec<LogEntry>> {
        let predicate = filter.predicate();
        debug!(%predicate, "Fetching entries");

        let mut entries = self.redb.read(|txn| {
            let messages = txn.open_table(MESSAGES)?;
            let tasks = txn.open_table(NETWORK_TASKS)?;
            let mut entries = Vec::new();
            for entry in messages.iter()? {
                let (_key, value) = entry?;
                let message: MessageRecord = decode(value.value())?;
                if !predicate.matches_message(&message) {
                    continue;
                }
                match message.task {
                    None => entries.push((message.id, LogEntry::Message(message))),
                    Some(task_id) => {
                        let task: NetworkTaskRecord =
                            get_record(&tasks, task_id.0)?.ok_or_else(|| {
                                StorageError::not_found(format!(
                                    "task {task_id} referenced by message {}",
                                    message.id
                                ))
                            })?;
                        entries.push((message.id, LogEntry::Task(Box::new(task))));
                    }
                }
            }
            Ok(entries)
        })?;

        entries.sort_by_key(|(id, entry)| (entry.created_at_millis(), *id));
        debug!(count = entries.len(), "Fetched entries");
        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Network tasks matching `filter`, oldest first
    pub fn fetch_tasks(&self, filter: &LogFilter) -> StorageResult<Vec<NetworkTaskRecord>> {
        let predicate = filter.predicate();
        let mut tasks = self.redb.read(|txn| {
            let table = txn.open_table(NETWORK_TASKS)?;
            let mut tasks = Vec::new();
            for entry in table.iter()? {
                let (_key, value) = entry?;
                let task: NetworkTaskRecord = decode(value.value())?;
                if predicate.matches_task(&task) {
                    tasks.push(task);
                }
            }
            Ok(tasks)
        })?;

        tasks.sort_by_key(|task| (task.created_at_millis, task.id));
        Ok(tasks)
    }

    /// Store-wide statistics
    pub fn info(&self) -> StorageResult<StoreInfo> {
        let (sessions, messages, tasks, labels, domains) = self.redb.read(|txn| {
            Ok((
                txn.open_table(SESSIONS)?.len()?,
                txn.open_table(MESSAGES)?.len()?,
                txn.open_table(NETWORK_TASKS)?.len()?,
                txn.open_table(LABELS)?.len()?,
                txn.open_table(DOMAINS)?.len()?,
            ))
        })?;

        Ok(StoreInfo {
            sessions,
            messages,
            tasks,
            labels,
            domains,
            blobs: self.blobs.stats()?,
            db_bytes: self.redb.file_size()?,
            created_at_millis: self.redb.meta(CREATED_AT)?,
        })
    }

    fn put_body(&self, body: Option<&Bytes>) -> StorageResult<Option<BlobHandle>> {
        body.map(|data| self.blobs.put(data)).transpose()
    }

    /// Drop a body reference taken for a write that did not commit
    fn release_on_error<T>(
        &self,
        result: StorageResult<T>,
        body: Option<BlobHandle>,
    ) -> StorageResult<T> {
        if let (Err(_), Some(handle)) = (&result, body) {
            if let Err(e) = self.blobs.release(&handle.hash) {
                warn!(hash = %handle.hash.short(), error = %e, "Failed to release body");
            }
        }
        result
    }
}

/// Lifecycle message documenting a task
fn lifecycle_message(task: &NetworkTaskRecord, id: MessageId) -> MessageRecord {
    MessageRecord {
        id,
        session: task.session,
        created_at_millis: task.created_at_millis,
        level: task_level(task),
        label: NETWORK_LABEL.to_string(),
        text: task.summary(),
        file: String::new(),
        function: String::new(),
        line: 0,
        metadata: Vec::new(),
        task: Some(task.id),
        pinned: false,
    }
}

fn get_record<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> StorageResult<Option<T>> {
    table.get(id)?.map(|v| decode(v.value())).transpose()
}

pub(crate) fn insert_message_in(txn: &WriteTransaction, message: &MessageRecord) -> StorageResult<()> {
    let value = encode(message)?;
    txn.open_table(MESSAGES)?
        .insert(message.id.0, value.as_slice())?;
    Ok(())
}

pub(crate) fn insert_task_in(txn: &WriteTransaction, task: &NetworkTaskRecord) -> StorageResult<()> {
    let value = encode(task)?;
    txn.open_table(NETWORK_TASKS)?
        .insert(task.id.0, value.as_slice())?;
    Ok(())
}

fn load_message_in(txn: &WriteTransaction, id: MessageId) -> StorageResult<MessageRecord> {
    get_record(&txn.open_table(MESSAGES)?, id.0)?
        .ok_or_else(|| StorageError::not_found(format!("message {id}")))
}

fn load_task_in(txn: &WriteTransaction, id: TaskId) -> StorageResult<NetworkTaskRecord> {
    get_record(&txn.open_table(NETWORK_TASKS)?, id.0)?
        .ok_or_else(|| StorageError::not_found(format!("task {id}")))
}
