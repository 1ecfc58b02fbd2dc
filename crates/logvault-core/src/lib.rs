//! # Logvault Core
//!
//! Core record types, identifiers, and errors shared by the Logvault stack.
//!
//! Everything captured by an instrumented application lands in one of two
//! families of records:
//!
//! - [`MessageRecord`]: a single log line with its [`LogLevel`], label, and
//!   source location
//! - [`NetworkTaskRecord`]: one request/response cycle with its request,
//!   response, metrics, error, progress, and body references
//!
//! Every record belongs to a [`SessionId`]. Shared entities ([`LabelRecord`],
//! [`DomainRecord`]) and payloads ([`BlobHash`]) are referenced by key rather
//! than embedded, so the storage layer can resolve them with explicit lookups.
//!
//! This crate performs no I/O.

pub mod blob;
pub mod error;
pub mod headers;
pub mod level;
pub mod message;
pub mod metrics;
pub mod network;
pub mod session;

pub use blob::BlobHash;
pub use error::{CoreError, CoreResult};
pub use headers::Headers;
pub use level::LogLevel;
pub use message::{LabelRecord, MessageId, MessageRecord, MetadataEntry};
pub use metrics::{
    ConnectionFlags, FetchType, MetricsRecord, TransactionMetricsRecord, TransactionTiming,
    TransferSizes,
};
pub use network::{
    DomainRecord, ErrorRecord, NetworkTaskRecord, ProgressRecord, RequestOptions, RequestRecord,
    RequestState, ResponseRecord, TaskId, TaskType,
};
pub use session::{SessionId, SessionRecord};

/// Current wall-clock time as Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
