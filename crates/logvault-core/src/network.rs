//! Network task records

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::blob::BlobHash;
use crate::headers::Headers;
use crate::message::MessageId;
use crate::metrics::MetricsRecord;
use crate::session::SessionId;

/// Identifier of a stored network task (dense, allocated by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Lifecycle state of a network task
///
/// Persisted as its raw value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i16", into = "i16")]
pub enum RequestState {
    #[default]
    Pending,
    Success,
    Failure,
}

impl RequestState {
    /// Map a raw stored value; unknown and zero values are pending
    pub fn from_raw(raw: i16) -> Self {
        match raw {
            1 => RequestState::Success,
            2 => RequestState::Failure,
            _ => RequestState::Pending,
        }
    }

    pub fn raw(self) -> i16 {
        match self {
            RequestState::Pending => 0,
            RequestState::Success => 1,
            RequestState::Failure => 2,
        }
    }
}

impl From<i16> for RequestState {
    fn from(raw: i16) -> Self {
        Self::from_raw(raw)
    }
}

impl From<RequestState> for i16 {
    fn from(state: RequestState) -> Self {
        state.raw()
    }
}

/// Kind of transfer a task performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[default]
    Data,
    Download,
    Upload,
    Stream,
    WebSocket,
}

impl TaskType {
    pub fn name(self) -> &'static str {
        match self {
            TaskType::Data => "data",
            TaskType::Download => "download",
            TaskType::Upload => "upload",
            TaskType::Stream => "stream",
            TaskType::WebSocket => "websocket",
        }
    }
}

/// Per-request policy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub allows_cellular_access: bool,
    pub allows_expensive_network_access: bool,
    pub allows_constrained_network_access: bool,
    pub should_handle_cookies: bool,
    pub should_use_pipelining: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            allows_cellular_access: true,
            allows_expensive_network_access: true,
            allows_constrained_network_access: true,
            should_handle_cookies: true,
            should_use_pipelining: false,
        }
    }
}

/// A captured HTTP request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub url: Option<String>,
    pub method: Option<String>,
    /// Encoded header block (see [`Headers`])
    pub headers: String,
    pub cache_policy: u8,
    /// Timeout in milliseconds
    pub timeout_millis: i64,
    pub options: RequestOptions,
}

impl RequestRecord {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            method: Some(method.into()),
            headers: String::new(),
            cache_policy: 0,
            timeout_millis: 60_000,
            options: RequestOptions::default(),
        }
    }

    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers = headers.encode();
        self
    }

    /// Decoded header fields
    pub fn header_fields(&self) -> Headers {
        Headers::decode(&self.headers)
    }
}

/// A captured HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub url: Option<String>,
    pub status_code: Option<u16>,
    /// Encoded header block (see [`Headers`])
    pub headers: String,
}

impl ResponseRecord {
    pub fn new(status_code: u16) -> Self {
        Self {
            url: None,
            status_code: Some(status_code),
            headers: String::new(),
        }
    }

    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers = headers.encode();
        self
    }

    pub fn header_fields(&self) -> Headers {
        Headers::decode(&self.headers)
    }

    /// `Content-Type` header, without parameters
    pub fn content_type(&self) -> Option<String> {
        crate::headers::header_value(&self.headers, "Content-Type")
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
    }
}

/// A captured failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: i64,
    pub domain: String,
    pub description: String,
    /// Serialized underlying error, when the source provided one
    pub underlying: Option<Vec<u8>>,
}

impl ErrorRecord {
    pub fn new(domain: impl Into<String>, code: i64, description: impl Into<String>) -> Self {
        Self {
            code,
            domain: domain.into(),
            description: description.into(),
            underlying: None,
        }
    }
}

/// In-flight transfer progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub completed_units: i64,
    pub total_units: i64,
}

impl ProgressRecord {
    /// Completed fraction in `0.0..=1.0`, when the total is known
    pub fn fraction(&self) -> Option<f64> {
        (self.total_units > 0)
            .then(|| (self.completed_units as f64 / self.total_units as f64).clamp(0.0, 1.0))
    }
}

/// A distinct host name and how many tasks reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub value: String,
    pub count: u64,
}

/// One network request/response cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTaskRecord {
    /// Store-assigned identifier
    pub id: TaskId,
    /// Owning session (immutable)
    pub session: SessionId,
    /// Creation time (Unix millis)
    pub created_at_millis: i64,
    /// Identifier assigned by the capturing HTTP client
    pub task_identifier: i64,
    pub task_type: TaskType,
    pub url: Option<String>,
    /// Host name, also the key of the referenced [`DomainRecord`]
    pub host: Option<String>,
    pub http_method: Option<String>,
    pub status_code: Option<u16>,
    pub error_domain: Option<String>,
    pub error_code: Option<i64>,
    pub response_content_type: Option<String>,
    pub is_from_cache: bool,
    pub state: RequestState,
    /// Total duration in milliseconds, once completed
    pub duration_millis: Option<i64>,
    pub original_request: RequestRecord,
    pub current_request: Option<RequestRecord>,
    pub response: Option<ResponseRecord>,
    pub error: Option<ErrorRecord>,
    pub metrics: Option<MetricsRecord>,
    pub progress: Option<ProgressRecord>,
    pub request_body: Option<BlobHash>,
    pub response_body: Option<BlobHash>,
    /// Original (decompressed) request body size in bytes
    pub request_body_size: u64,
    /// Original (decompressed) response body size in bytes
    pub response_body_size: u64,
    /// Lifecycle message documenting this task
    pub message: Option<MessageId>,
    pub pinned: bool,
}

impl NetworkTaskRecord {
    /// The request as last sent (falls back to the original request)
    pub fn request(&self) -> &RequestRecord {
        self.current_request.as_ref().unwrap_or(&self.original_request)
    }

    /// Body references currently held by this task
    pub fn body_refs(&self) -> impl Iterator<Item = BlobHash> {
        self.request_body.into_iter().chain(self.response_body)
    }

    /// One-line summary (`GET https://... 200`)
    pub fn summary(&self) -> String {
        let method = self.http_method.as_deref().unwrap_or("GET");
        let url = self.url.as_deref().unwrap_or("–");
        match (self.state, self.status_code) {
            (RequestState::Pending, _) => format!("{method} {url} (pending)"),
            (_, Some(code)) => format!("{method} {url} {code}"),
            (RequestState::Failure, None) => format!("{method} {url} (failed)"),
            (RequestState::Success, None) => format!("{method} {url}"),
        }
    }
}

/// Host component of a URL, lowercased
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_state_from_raw() {
        assert_eq!(RequestState::from_raw(0), RequestState::Pending);
        assert_eq!(RequestState::from_raw(1), RequestState::Success);
        assert_eq!(RequestState::from_raw(2), RequestState::Failure);
        assert_eq!(RequestState::from_raw(-4), RequestState::Pending);
        assert_eq!(RequestState::from_raw(99), RequestState::Pending);
        for state in [RequestState::Pending, RequestState::Success, RequestState::Failure] {
            assert_eq!(RequestState::from_raw(state.raw()), state);
        }
    }

    #[test]
    fn test_unknown_stored_state_reads_as_pending() {
        let stored = postcard::to_allocvec(&7i16).unwrap();
        let state: RequestState = postcard::from_bytes(&stored).unwrap();
        assert_eq!(state, RequestState::Pending);

        let stored = postcard::to_allocvec(&RequestState::Failure).unwrap();
        assert_eq!(postcard::from_bytes::<i16>(&stored).unwrap(), 2);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://Example.com/path?q=1"), Some("example.com".to_string()));
        assert_eq!(host_of("http://user:pw@api.test:8080/x"), Some("api.test".to_string()));
        assert_eq!(host_of("http://[::1]:80/"), Some("[::1]".to_string()));
        assert_eq!(host_of("not a url"), None);
        assert_eq!(host_of("file:///tmp/x"), None);
    }

    #[test]
    fn test_host_of_follows_whatwg_parsing() {
        // Special schemes treat a backslash as a path separator
        assert_eq!(
            host_of("https://good.example\\@evil.example/"),
            Some("good.example".to_string())
        );
        assert_eq!(
            host_of("https://user%40x:pw@API.Example.org:8443/"),
            Some("api.example.org".to_string())
        );
        assert_eq!(host_of("https://xn--bcher-kva.example/"), Some("xn--bcher-kva.example".to_string()));
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let headers = Headers::new().with("content-type", "application/json; charset=utf-8");
        let response = ResponseRecord::new(200).with_headers(&headers);
        assert_eq!(response.content_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn test_progress_fraction() {
        let progress = ProgressRecord { completed_units: 50, total_units: 200 };
        assert_eq!(progress.fraction(), Some(0.25));
        let unknown = ProgressRecord { completed_units: 10, total_units: -1 };
        assert_eq!(unknown.fraction(), None);
    }
}
