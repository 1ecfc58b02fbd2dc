//! # Logvault Storage
//!
//! Persistent storage for captured log messages and network tasks.
//!
//! ## Layers
//!
//! - **Structured storage** ([`RedbStorage`]): redb tables of postcard
//!   records keyed by id, name, session or content hash
//! - **Blob storage** ([`BlobStore`]): deduplicated, reference-counted
//!   request/response bodies, inline for small payloads and as files for
//!   large ones
//! - **Entity store** ([`LogStore`]): the ingestion API plus filtered
//!   queries over one consistent snapshot
//!
//! ## Example
//!
//! ```rust,ignore
//! use logvault_core::{LogLevel, SessionId};
//! use logvault_storage::{LogFilter, LogStore, NewMessage, StoreConfig};
//!
//! let store = LogStore::open(StoreConfig::with_base_dir("./data"))?;
//! let session = SessionId::new();
//! store.record_message(NewMessage::new(session, LogLevel::Error, "auth", "token expired"))?;
//!
//! let errors = store.fetch(&LogFilter::sessions([session]).with_levels([LogLevel::Error]))?;
//! assert_eq!(errors.len(), 1);
//! ```

pub mod blobs;
pub mod copy;
pub mod error;
pub mod ingest;
pub mod log_store;
pub mod query;
pub mod structured;

pub use blobs::{
    BlobCodec, BlobHandle, BlobPlacement, BlobStats, BlobStore, BlobStoreConfig, Compression,
    GcResult, PassthroughCodec, ZstdCodec,
};
pub use copy::CopySummary;
pub use error::{StorageError, StorageResult};
pub use ingest::{NETWORK_LABEL, NewMessage, NewTask, TaskCompletion};
pub use log_store::{DeletedSession, LogEntry, LogStore, StoreConfig, StoreInfo};
pub use query::{LogFilter, Predicate, level_summary, task_level};
pub use structured::{RedbStorage, RedbStorageConfig, SessionStore};
