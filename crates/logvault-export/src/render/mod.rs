//! Renderer: entities to styled documents
//!
//! Rendering is deterministic: the same entity snapshot and detail mode
//! always produce the same document.

mod body;
mod message;
mod task;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use logvault_core::BlobHash;
use logvault_storage::{LogEntry, LogStore, StorageResult};

use crate::document::{Document, Style};
use crate::error::{ExportError, ExportResult};

pub use body::{BodyText, describe_body};
pub use message::render_message;
pub use task::render_task;

/// How much of a network task to include
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskDetail {
    /// Reduced detail for sharing: long bodies are truncated, per-transaction
    /// metrics are summarized
    #[default]
    Sharing,
    /// Everything, as shown interactively
    Full,
}

/// Resolves body references while rendering
pub trait BodySource {
    fn body(&self, hash: &BlobHash) -> StorageResult<Bytes>;
}

impl BodySource for LogStore {
    fn body(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        LogStore::body(self, hash)
    }
}

/// Render one fetched entry
pub fn render_entry(
    entry: &LogEntry,
    detail: TaskDetail,
    bodies: &dyn BodySource,
) -> ExportResult<Document> {
    match entry {
        LogEntry::Message(message) => Ok(render_message(message)),
        LogEntry::Task(task) => render_task(task, detail, bodies),
    }
}

/// Render entries in order, separated by blank lines
///
/// `should_continue` is polled before each entry; a `false` answer ends
/// rendering with [`ExportError::Cancelled`].
pub fn render_entries(
    entries: &[LogEntry],
    detail: TaskDetail,
    bodies: &dyn BodySource,
    mut should_continue: impl FnMut() -> bool,
) -> ExportResult<Document> {
    let mut document = Document::new();
    for (position, entry) in entries.iter().enumerate() {
        if !should_continue() {
            return Err(ExportError::Cancelled);
        }
        if position > 0 {
            document.text("\n", Style::Body);
        }
        document.append(render_entry(entry, detail, bodies)?);
    }
    Ok(document)
}

/// `2024-05-01 12:00:00.250` (UTC)
pub(crate) fn format_timestamp(millis: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_core::{LogLevel, MessageId, MessageRecord, SessionId};

    struct NoBodies;

    impl BodySource for NoBodies {
        fn body(&self, hash: &BlobHash) -> StorageResult<Bytes> {
            Err(logvault_storage::StorageError::not_found(format!("blob {hash}")))
        }
    }

    fn message(id: u64, text: &str) -> LogEntry {
        LogEntry::Message(MessageRecord {
            id: MessageId(id),
            session: SessionId::new(),
            created_at_millis: 0,
            level: LogLevel::Info,
            label: "app".to_string(),
            text: text.to_string(),
            file: String::new(),
            function: String::new(),
            line: 0,
            metadata: Vec::new(),
            task: None,
            pinned: false,
        })
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_714_564_800_250), "2024-05-01 12:00:00.250");
    }

    #[test]
    fn test_render_entries_is_deterministic() {
        let entries = vec![message(1, "first"), message(2, "second")];
        let a = render_entries(&entries, TaskDetail::Sharing, &NoBodies, || true).unwrap();
        let b = render_entries(&entries, TaskDetail::Sharing, &NoBodies, || true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_entries_stops_when_cancelled() {
        let entries = vec![message(1, "first"), message(2, "second")];
        let mut polls = 0;
        let result = render_entries(&entries, TaskDetail::Full, &NoBodies, || {
            polls += 1;
            polls < 2
        });
        assert!(matches!(result, Err(ExportError::Cancelled)));
    }
}
