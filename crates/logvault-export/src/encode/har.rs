//! HTTP Archive (HAR 1.2) encoding of network tasks

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::SecondsFormat;
use serde::Serialize;
use url::{Url, form_urlencoded};

use logvault_core::{Headers, NetworkTaskRecord, TransactionMetricsRecord, TransactionTiming};

use crate::error::{ExportError, ExportResult};
use crate::render::BodySource;

pub const HAR_VERSION: &str = "1.2";

#[derive(Debug, Serialize)]
struct Har {
    log: HarLog,
}

#[derive(Debug, Serialize)]
struct HarLog {
    version: &'static str,
    creator: HarCreator,
    entries: Vec<HarEntry>,
}

#[derive(Debug, Serialize)]
struct HarCreator {
    name: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarEntry {
    started_date_time: String,
    time: f64,
    request: HarRequest,
    response: HarResponse,
    cache: HarCache,
    timings: HarTimings,
    #[serde(rename = "serverIPAddress", skip_serializing_if = "Option::is_none")]
    server_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    method: String,
    url: String,
    http_version: String,
    cookies: Vec<HarNameValue>,
    headers: Vec<HarNameValue>,
    query_string: Vec<HarNameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_data: Option<HarPostData>,
    headers_size: i64,
    body_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarResponse {
    status: u16,
    status_text: String,
    http_version: String,
    cookies: Vec<HarNameValue>,
    headers: Vec<HarNameValue>,
    content: HarContent,
    #[serde(rename = "redirectURL")]
    redirect_url: String,
    headers_size: i64,
    body_size: i64,
}

#[derive(Debug, Serialize)]
struct HarNameValue {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarPostData {
    mime_type: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarContent {
    size: i64,
    mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct HarCache {}

#[derive(Debug, Serialize)]
struct HarTimings {
    blocked: i64,
    dns: i64,
    connect: i64,
    send: i64,
    wait: i64,
    receive: i64,
    ssl: i64,
}

/// Encode tasks as a HAR 1.2 JSON document
///
/// `should_continue` is polled before each task.
pub fn encode_har(
    tasks: &[NetworkTaskRecord],
    bodies: &dyn BodySource,
    mut should_continue: impl FnMut() -> bool,
) -> ExportResult<Vec<u8>> {
    let mut entries = Vec::with_capacity(tasks.len());
    for task in tasks {
        if !should_continue() {
            return Err(ExportError::Cancelled);
        }
        entries.push(entry(task, bodies)?);
    }

    let har = Har {
        log: HarLog {
            version: HAR_VERSION,
            creator: HarCreator {
                name: "logvault",
                version: env!("CARGO_PKG_VERSION"),
            },
            entries,
        },
    };
    Ok(serde_json::to_vec_pretty(&har)?)
}

fn entry(task: &NetworkTaskRecord, bodies: &dyn BodySource) -> ExportResult<HarEntry> {
    let transaction = task.metrics.as_ref().and_then(|m| m.last_transaction());
    let http_version = http_version(transaction);
    let request = task.request();
    let request_headers = request.header_fields();
    let transfer = task.metrics.as_ref().map(|m| m.total_transfer());

    let post_data = match &task.request_body {
        Some(hash) => {
            let (text, encoding) = body_text(&bodies.body(hash)?);
            Some(HarPostData {
                mime_type: request_headers.get("Content-Type").unwrap_or("").to_string(),
                text,
                encoding,
            })
        }
        None => None,
    };

    let url = request.url.clone().unwrap_or_default();
    let har_request = HarRequest {
        method: request.method.clone().unwrap_or_else(|| "GET".to_string()),
        query_string: query_string(&url),
        url,
        http_version: http_version.clone(),
        cookies: Vec::new(),
        headers: name_values(&request_headers),
        post_data,
        headers_size: transfer.map_or(-1, |t| t.request_header_bytes_sent),
        body_size: task.request_body_size as i64,
    };

    let response_headers = task
        .response
        .as_ref()
        .map(|r| r.header_fields())
        .unwrap_or_default();
    let status = task.status_code.unwrap_or(0);
    let (text, encoding) = match &task.response_body {
        Some(hash) => {
            let (text, encoding) = body_text(&bodies.body(hash)?);
            (Some(text), encoding)
        }
        None => (None, None),
    };
    let har_response = HarResponse {
        status,
        status_text: status_text(status).to_string(),
        http_version,
        cookies: Vec::new(),
        content: HarContent {
            size: task.response_body_size as i64,
            mime_type: response_headers.get("Content-Type").unwrap_or("").to_string(),
            text,
            encoding,
        },
        redirect_url: response_headers.get("Location").unwrap_or("").to_string(),
        headers: name_values(&response_headers),
        headers_size: transfer.map_or(-1, |t| t.response_header_bytes_received),
        body_size: transfer.map_or(task.response_body_size as i64, |t| {
            t.response_body_bytes_received
        }),
    };

    let timings = timings(transaction.map(|t| &t.timing));
    let measured: i64 = [
        timings.blocked,
        timings.dns,
        timings.connect,
        timings.send,
        timings.wait,
        timings.receive,
    ]
    .into_iter()
    .filter(|t| *t > 0)
    .sum();
    let time = task.duration_millis.unwrap_or(measured).max(0) as f64;

    Ok(HarEntry {
        started_date_time: started_date_time(task.created_at_millis),
        time,
        request: har_request,
        response: har_response,
        cache: HarCache {},
        timings,
        server_ip_address: transaction.and_then(|t| t.remote_address.clone()),
        connection: transaction.and_then(|t| t.local_port).map(|p| p.to_string()),
        comment: task
            .error
            .as_ref()
            .map(|e| format!("{} {}: {}", e.domain, e.code, e.description)),
    })
}

fn started_date_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn http_version(transaction: Option<&TransactionMetricsRecord>) -> String {
    let protocol = transaction.and_then(|t| t.network_protocol.as_deref());
    match protocol.map(str::to_ascii_lowercase).as_deref() {
        Some("h2") | Some("http/2") | Some("http/2.0") => "HTTP/2".to_string(),
        Some("h3") | Some("http/3") => "HTTP/3".to_string(),
        Some("http/1.0") => "HTTP/1.0".to_string(),
        _ => "HTTP/1.1".to_string(),
    }
}

fn name_values(headers: &Headers) -> Vec<HarNameValue> {
    headers
        .iter()
        .map(|(name, value)| HarNameValue {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// Decoded query pairs; a URL that does not parse keeps its raw query text
fn query_string(url: &str) -> Vec<HarNameValue> {
    let pairs: Vec<(String, String)> = match Url::parse(url) {
        Ok(parsed) => parsed.query_pairs().into_owned().collect(),
        Err(_) => {
            let Some((_, query)) = url.split_once('?') else {
                return Vec::new();
            };
            let query = query.split('#').next().unwrap_or_default();
            form_urlencoded::parse(query.as_bytes()).into_owned().collect()
        }
    };
    pairs
        .into_iter()
        .map(|(name, value)| HarNameValue { name, value })
        .collect()
}

/// UTF-8 text as-is, anything else base64
fn body_text(data: &[u8]) -> (String, Option<&'static str>) {
    match std::str::from_utf8(data) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (BASE64.encode(data), Some("base64")),
    }
}

fn timings(timing: Option<&TransactionTiming>) -> HarTimings {
    let Some(t) = timing else {
        return HarTimings {
            blocked: -1,
            dns: -1,
            connect: -1,
            send: 0,
            wait: 0,
            receive: 0,
            ssl: -1,
        };
    };
    let span = |start, end| TransactionTiming::span(start, end).unwrap_or(-1);
    let first_network_mark = t.domain_lookup_start.or(t.connect_start).or(t.request_start);
    HarTimings {
        blocked: span(t.fetch_start, first_network_mark),
        dns: span(t.domain_lookup_start, t.domain_lookup_end),
        connect: span(t.connect_start, t.connect_end),
        ssl: span(t.secure_connection_start, t.secure_connection_end),
        send: span(t.request_start, t.request_end).max(0),
        wait: span(t.request_end, t.response_start).max(0),
        receive: span(t.response_start, t.response_end).max(0),
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use logvault_core::{
        BlobHash, FetchType, MetricsRecord, RequestRecord, RequestState, ResponseRecord, SessionId,
        TaskId, TaskType,
    };
    use logvault_storage::{StorageError, StorageResult};
    use serde_json::Value;

    struct OneBody(Bytes);

    impl BodySource for OneBody {
        fn body(&self, hash: &BlobHash) -> StorageResult<Bytes> {
            if BlobHash::of(&self.0) == *hash {
                Ok(self.0.clone())
            } else {
                Err(StorageError::not_found(format!("blob {hash}")))
            }
        }
    }

    fn task(body: &Bytes) -> NetworkTaskRecord {
        let mut transaction = TransactionMetricsRecord::new(0, FetchType::NetworkLoad);
        transaction.network_protocol = Some("h2".to_string());
        transaction.remote_address = Some("93.184.216.34".to_string());
        transaction.timing = TransactionTiming {
            fetch_start: Some(1_000),
            domain_lookup_start: Some(1_002),
            domain_lookup_end: Some(1_010),
            connect_start: Some(1_010),
            connect_end: Some(1_030),
            request_start: Some(1_030),
            request_end: Some(1_031),
            response_start: Some(1_080),
            response_end: Some(1_090),
            ..Default::default()
        };
        let request = RequestRecord::new("GET", "https://example.com/items?page=2&sort=asc");
        NetworkTaskRecord {
            id: TaskId(1),
            session: SessionId::new(),
            created_at_millis: 1_000,
            task_identifier: 1,
            task_type: TaskType::Data,
            url: request.url.clone(),
            host: Some("example.com".to_string()),
            http_method: request.method.clone(),
            status_code: Some(200),
            error_domain: None,
            error_code: None,
            response_content_type: None,
            is_from_cache: false,
            state: RequestState::Success,
            duration_millis: Some(90),
            original_request: request,
            current_request: None,
            response: Some(ResponseRecord::new(200).with_headers(
                &Headers::new().with("Content-Type", "application/octet-stream"),
            )),
            error: None,
            metrics: Some(MetricsRecord::new(1_000, 90, 0, vec![transaction]).unwrap()),
            progress: None,
            request_body: None,
            response_body: Some(BlobHash::of(body)),
            request_body_size: 0,
            response_body_size: body.len() as u64,
            message: None,
            pinned: false,
        }
    }

    #[test]
    fn test_har_document_shape() {
        let body = Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]);
        let tasks = vec![task(&body)];
        let bytes = encode_har(&tasks, &OneBody(body), || true).unwrap();
        let har: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(har["log"]["version"], "1.2");
        let entry = &har["log"]["entries"][0];
        assert_eq!(entry["startedDateTime"], "1970-01-01T00:00:01.000Z");
        assert_eq!(entry["time"], 90.0);
        assert_eq!(entry["serverIPAddress"], "93.184.216.34");
        assert_eq!(entry["request"]["httpVersion"], "HTTP/2");
        assert_eq!(entry["request"]["queryString"][0]["name"], "page");
        assert_eq!(entry["request"]["queryString"][1]["value"], "asc");
        assert_eq!(entry["response"]["status"], 200);
        assert_eq!(entry["response"]["statusText"], "OK");
        assert_eq!(entry["response"]["content"]["encoding"], "base64");
        assert_eq!(entry["response"]["content"]["text"], "3q2+7w==");
        assert_eq!(entry["response"]["content"]["size"], 4);
        assert_eq!(entry["timings"]["dns"], 8);
        assert_eq!(entry["timings"]["connect"], 20);
        assert_eq!(entry["timings"]["wait"], 49);
        assert_eq!(entry["timings"]["ssl"], -1);
    }

    #[test]
    fn test_query_string_is_decoded() {
        let pairs = query_string("https://x.example/s?q=a%20b&tag=c+d&empty#frag");
        let pairs: Vec<(&str, &str)> = pairs
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("q", "a b"), ("tag", "c d"), ("empty", "")]);

        assert!(query_string("https://x.example/plain").is_empty());
    }

    #[test]
    fn test_query_string_of_unparsable_url() {
        let pairs = query_string("/relative/path?name=J%C3%B6rg");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].name, "name");
        assert_eq!(pairs[0].value, "Jörg");
    }

    #[test]
    fn test_cancelled_before_first_task() {
        let body = Bytes::from_static(b"{}");
        let tasks = vec![task(&body)];
        let result = encode_har(&tasks, &OneBody(body), || false);
        assert!(matches!(result, Err(ExportError::Cancelled)));
    }
}
