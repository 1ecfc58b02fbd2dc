//! Log message records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::level::LogLevel;
use crate::network::TaskId;
use crate::session::SessionId;

/// Identifier of a stored message (dense, allocated by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A key/value annotation attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned identifier
    pub id: MessageId,
    /// Owning session (immutable)
    pub session: SessionId,
    /// Creation time (Unix millis)
    pub created_at_millis: i64,
    /// Severity
    pub level: LogLevel,
    /// Label (log category) name
    pub label: String,
    /// Message text
    pub text: String,
    /// Source file
    pub file: String,
    /// Source function
    pub function: String,
    /// Source line
    pub line: u32,
    /// Key/value annotations, in insertion order
    pub metadata: Vec<MetadataEntry>,
    /// Network task this message documents, if any
    pub task: Option<TaskId>,
    /// User-marked "keep" flag
    pub pinned: bool,
}

impl MessageRecord {
    /// `file:line` location string, or empty when no file was captured
    pub fn location(&self) -> String {
        if self.file.is_empty() {
            String::new()
        } else {
            format!("{}:{}", self.file, self.line)
        }
    }
}

/// A log category and how many messages reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub name: String,
    pub count: u64,
}
