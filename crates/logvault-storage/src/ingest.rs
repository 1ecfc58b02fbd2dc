//! Ingestion inputs
//!
//! The capture pipeline describes new entities with these builders; the
//! [`LogStore`](crate::LogStore) assigns ids, resolves shared entities and
//! stores bodies.

use bytes::Bytes;

use crate::error::StorageResult;

use logvault_core::{
    ErrorRecord, LogLevel, MetadataEntry, MetricsRecord, RequestRecord, ResponseRecord, SessionId,
    TaskType,
};

/// Label given to the lifecycle message of every network task
pub const NETWORK_LABEL: &str = "network";

/// A log line to record
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session: SessionId,
    pub level: LogLevel,
    pub label: String,
    pub text: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    pub metadata: Vec<MetadataEntry>,
    /// Creation time; defaults to now
    pub created_at_millis: Option<i64>,
}

impl NewMessage {
    pub fn new(
        session: SessionId,
        level: LogLevel,
        label: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session,
            level,
            label: label.into(),
            text: text.into(),
            file: String::new(),
            function: String::new(),
            line: 0,
            metadata: Vec::new(),
            created_at_millis: None,
        }
    }

    pub fn with_location(
        mut self,
        file: impl Into<String>,
        function: impl Into<String>,
        line: u32,
    ) -> Self {
        self.file = file.into();
        self.function = function.into();
        self.line = line;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push(MetadataEntry::new(key, value));
        self
    }

    pub fn at(mut self, created_at_millis: i64) -> Self {
        self.created_at_millis = Some(created_at_millis);
        self
    }
}

/// A network task that has just started
#[derive(Debug, Clone)]
pub struct NewTask {
    pub session: SessionId,
    pub task_identifier: i64,
    pub task_type: TaskType,
    pub request: RequestRecord,
    pub request_body: Option<Bytes>,
    /// Creation time; defaults to now
    pub created_at_millis: Option<i64>,
}

impl NewTask {
    pub fn new(session: SessionId, request: RequestRecord) -> Self {
        Self {
            session,
            task_identifier: 0,
            task_type: TaskType::default(),
            request,
            request_body: None,
            created_at_millis: None,
        }
    }

    pub fn with_identifier(mut self, task_identifier: i64) -> Self {
        self.task_identifier = task_identifier;
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn at(mut self, created_at_millis: i64) -> Self {
        self.created_at_millis = Some(created_at_millis);
        self
    }
}

/// Final outcome of a network task
#[derive(Debug, Clone, Default)]
pub struct TaskCompletion {
    /// The request as finally sent, when it differs from the original
    pub current_request: Option<RequestRecord>,
    pub response: Option<ResponseRecord>,
    pub error: Option<ErrorRecord>,
    pub metrics: Option<MetricsRecord>,
    pub response_body: Option<Bytes>,
    pub is_from_cache: bool,
    /// Completion time; defaults to now
    pub completed_at_millis: Option<i64>,
}

impl TaskCompletion {
    /// A completion that received a response
    pub fn response(response: ResponseRecord) -> Self {
        Self {
            response: Some(response),
            ..Default::default()
        }
    }

    /// A completion that failed before or while receiving a response
    pub fn failure(error: ErrorRecord) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRecord) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_current_request(mut self, request: RequestRecord) -> Self {
        self.current_request = Some(request);
        self
    }

    pub fn from_cache(mut self) -> Self {
        self.is_from_cache = true;
        self
    }

    pub fn at(mut self, completed_at_millis: i64) -> Self {
        self.completed_at_millis = Some(completed_at_millis);
        self
    }

    /// A task fails when it carries an error or an HTTP status of 400 or above
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
            || self
                .response
                .as_ref()
                .and_then(|r| r.status_code)
                .is_some_and(|code| code >= 400)
    }

    /// Reject metrics whose transactions are not in dense index order
    pub fn validate(&self) -> StorageResult<()> {
        if let Some(metrics) = &self.metrics {
            metrics.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_builder() {
        let session = SessionId::new();
        let message = NewMessage::new(session, LogLevel::Info, "auth", "signed in")
            .with_location("auth.rs", "sign_in", 42)
            .with_metadata("user", "7")
            .at(1_000);

        assert_eq!(message.line, 42);
        assert_eq!(message.metadata, vec![MetadataEntry::new("user", "7")]);
        assert_eq!(message.created_at_millis, Some(1_000));
    }

    #[test]
    fn test_completion_failure_rules() {
        assert!(!TaskCompletion::response(ResponseRecord::new(204)).is_failure());
        assert!(TaskCompletion::response(ResponseRecord::new(404)).is_failure());
        assert!(TaskCompletion::failure(ErrorRecord::new("URLError", -1001, "timed out")).is_failure());
        assert!(!TaskCompletion::default().is_failure());
    }
}
