//! Session identifiers and records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// 128-bit identifier grouping everything captured during one process run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Key bytes for table storage
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Rebuild from table key bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|e| CoreError::InvalidSession(e.to_string()))
    }

    /// First eight hex characters, for display in summaries
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SessionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidSession(format!("{s}: {e}")))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata about one capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (immutable)
    pub id: SessionId,
    /// When the session started (Unix millis)
    pub started_at_millis: i64,
    /// Version of the instrumented application
    pub app_version: Option<String>,
    /// Build number of the instrumented application
    pub app_build: Option<String>,
}

impl SessionRecord {
    /// Create a new session record
    pub fn new(id: SessionId, started_at_millis: i64) -> Self {
        Self {
            id,
            started_at_millis,
            app_version: None,
            app_build: None,
        }
    }

    /// Set the application version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Set the application build number
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.app_build = Some(build.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let id = SessionId::new();
        assert_eq!(SessionId::from_slice(id.as_bytes()).unwrap(), id);
        assert!(SessionId::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_invalid_string() {
        assert!("not-a-session".parse::<SessionId>().is_err());
    }
}
