use logvault_core::{BlobHash, ConnectionFlags, Headers, NetworkTaskRecord, RequestState};
use logvault_storage::task_level;

use super::body::{SHARING_BODY_LIMIT, describe_body};
use super::{BodySource, TaskDetail, format_timestamp};
use crate::document::{Document, Style};
use crate::error::ExportResult;

/// Render a network task, resolving its bodies through `bodies`
///
/// A body that cannot be loaded fails the render with `NotFound`.
pub fn render_task(
    task: &NetworkTaskRecord,
    detail: TaskDetail,
    bodies: &dyn BodySource,
) -> ExportResult<Document> {
    let limit = match detail {
        TaskDetail::Sharing => Some(SHARING_BODY_LIMIT),
        TaskDetail::Full => None,
    };
    let level = task_level(task);

    let mut doc = Document::new();
    doc.line(
        format!(
            "{} [{}] network",
            format_timestamp(task.created_at_millis),
            level.title()
        ),
        Style::Caption,
    );
    doc.line(task.summary(), Style::Strong);
    doc.technical(format!(
        "task {} identifier {} ({}) session {}",
        task.id,
        task.task_identifier,
        task.task_type.name(),
        task.session.short()
    ));

    let request = task.request();
    doc.subheadline("Request");
    doc.line(
        format!(
            "{} {}",
            request.method.as_deref().unwrap_or("GET"),
            request.url.as_deref().unwrap_or("–")
        ),
        Style::Monospace,
    );
    headers(&mut doc, &request.header_fields());
    if let Some(hash) = &task.request_body {
        let content_type = request.header_fields().get("Content-Type").map(str::to_string);
        body(&mut doc, bodies, hash, content_type.as_deref(), limit)?;
    }

    if let Some(response) = &task.response {
        doc.subheadline("Response");
        let status = response
            .status_code
            .map_or_else(|| "–".to_string(), |code| code.to_string());
        let cache = if task.is_from_cache { " (from cache)" } else { "" };
        doc.line(format!("Status: {status}{cache}"), Style::Severity(level));
        headers(&mut doc, &response.header_fields());
        if let Some(hash) = &task.response_body {
            body(&mut doc, bodies, hash, task.response_content_type.as_deref(), limit)?;
        }
    }

    if let Some(error) = &task.error {
        doc.subheadline("Error");
        doc.line(
            format!("{} {}: {}", error.domain, error.code, error.description),
            Style::Severity(level),
        );
    }

    if task.state == RequestState::Pending {
        if let Some(fraction) = task.progress.as_ref().and_then(|p| p.fraction()) {
            doc.line(format!("Progress: {:.0}%", fraction * 100.0), Style::Body);
        }
    }

    if let Some(metrics) = &task.metrics {
        doc.subheadline("Metrics");
        doc.line(format!("Duration: {} ms", metrics.duration_millis), Style::Body);
        doc.line(format!("Redirects: {}", metrics.redirect_count), Style::Body);
        let transfer = metrics.total_transfer();
        doc.line(
            format!(
                "Transferred: {} bytes sent, {} bytes received",
                transfer.total_sent(),
                transfer.total_received()
            ),
            Style::Body,
        );

        if detail == TaskDetail::Full {
            for transaction in &metrics.transactions {
                let remote = match (&transaction.remote_address, transaction.remote_port) {
                    (Some(address), Some(port)) => format!("{address}:{port}"),
                    (Some(address), None) => address.clone(),
                    _ => "–".to_string(),
                };
                let total = transaction
                    .timing
                    .total()
                    .map_or_else(|| "–".to_string(), |ms| format!("{ms} ms"));
                doc.line(
                    format!(
                        "#{} {:?} {} {} {}",
                        transaction.index,
                        transaction.fetch_type,
                        transaction.network_protocol.as_deref().unwrap_or("–"),
                        remote,
                        total
                    ),
                    Style::Monospace,
                );
                if let Some(local) = &transaction.local_address {
                    let local = match transaction.local_port {
                        Some(port) => format!("{local}:{port}"),
                        None => local.clone(),
                    };
                    doc.line(format!("  Local: {local}"), Style::Monospace);
                }
                if transaction.tls_version.is_some() || transaction.tls_cipher_suite.is_some() {
                    doc.line(
                        format!(
                            "  TLS: {} {}",
                            transaction.tls_version.as_deref().unwrap_or("–"),
                            transaction.tls_cipher_suite.as_deref().unwrap_or("–")
                        ),
                        Style::Monospace,
                    );
                }
                let flags = connection_flags(&transaction.flags);
                if !flags.is_empty() {
                    doc.line(format!("  Connection: {}", flags.join(", ")), Style::Monospace);
                }
            }
        }
    }

    for (name, hash) in [("request", task.request_body), ("response", task.response_body)] {
        if let Some(hash) = hash {
            doc.technical(format!("{name} body {hash}"));
        }
    }

    Ok(doc)
}

fn connection_flags(flags: &ConnectionFlags) -> Vec<&'static str> {
    [
        (flags.reused_connection, "reused"),
        (flags.proxy_connection, "proxy"),
        (flags.cellular, "cellular"),
        (flags.expensive, "expensive"),
        (flags.constrained, "constrained"),
        (flags.multipath, "multipath"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect()
}

fn headers(doc: &mut Document, headers: &Headers) {
    for (name, value) in headers.iter() {
        doc.line(format!("{name}: {value}"), Style::Monospace);
    }
}

fn body(
    doc: &mut Document,
    bodies: &dyn BodySource,
    hash: &BlobHash,
    content_type: Option<&str>,
    limit: Option<usize>,
) -> ExportResult<()> {
    let data = bodies.body(hash)?;
    doc.text("\n", Style::Body);
    doc.line(describe_body(&data, content_type).display(limit), Style::Monospace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Segment;
    use crate::error::ExportError;
    use bytes::Bytes;
    use logvault_core::{
        ErrorRecord, FetchType, MetricsRecord, RequestRecord, ResponseRecord, SessionId, TaskId,
        TaskType, TransactionMetricsRecord,
    };
    use logvault_storage::{StorageError, StorageResult};
    use std::collections::HashMap;

    struct MapBodies(HashMap<BlobHash, Bytes>);

    impl BodySource for MapBodies {
        fn body(&self, hash: &BlobHash) -> StorageResult<Bytes> {
            self.0
                .get(hash)
                .cloned()
                .ok_or_else(|| StorageError::not_found(format!("blob {hash}")))
        }
    }

    fn task() -> NetworkTaskRecord {
        let request = RequestRecord::new("POST", "https://api.example.com/login")
            .with_headers(&Headers::new().with("Content-Type", "application/json"));
        NetworkTaskRecord {
            id: TaskId(1),
            session: SessionId::new(),
            created_at_millis: 0,
            task_identifier: 17,
            task_type: TaskType::Data,
            url: request.url.clone(),
            host: Some("api.example.com".to_string()),
            http_method: request.method.clone(),
            status_code: Some(401),
            error_domain: None,
            error_code: None,
            response_content_type: Some("application/json".to_string()),
            is_from_cache: false,
            state: RequestState::Failure,
            duration_millis: Some(40),
            original_request: request,
            current_request: None,
            response: Some(ResponseRecord::new(401)),
            error: Some(ErrorRecord::new("HTTP", 401, "unauthorized")),
            metrics: None,
            progress: None,
            request_body: None,
            response_body: None,
            request_body_size: 0,
            response_body_size: 0,
            message: None,
            pinned: false,
        }
    }

    fn visible(doc: &Document) -> String {
        doc.segments()
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_render_task_sections() {
        let body = Bytes::from_static(br#"{"user":"ada"}"#);
        let hash = BlobHash::of(&body);
        let mut task = task();
        task.request_body = Some(hash);
        let bodies = MapBodies(HashMap::from([(hash, body)]));

        let doc = render_task(&task, TaskDetail::Full, &bodies).unwrap();
        let subheadlines: Vec<&str> = doc
            .segments()
            .iter()
            .filter_map(|s| match s {
                Segment::Subheadline(title) => Some(title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(subheadlines, vec!["Request", "Response", "Error"]);

        let text = visible(&doc);
        assert!(text.contains("[Error] network"));
        assert!(text.contains("POST https://api.example.com/login 401"));
        assert!(text.contains("\"user\": \"ada\""));
        assert!(text.contains("HTTP 401: unauthorized"));
        assert!(!text.contains(&hash.to_hex()));
    }

    #[test]
    fn test_full_detail_shows_connection_details() {
        let mut transaction = TransactionMetricsRecord::new(0, FetchType::NetworkLoad);
        transaction.network_protocol = Some("h2".to_string());
        transaction.remote_address = Some("93.184.216.34".to_string());
        transaction.remote_port = Some(443);
        transaction.local_address = Some("10.0.0.2".to_string());
        transaction.local_port = Some(51234);
        transaction.tls_version = Some("TLSv1.3".to_string());
        transaction.tls_cipher_suite = Some("TLS_AES_128_GCM_SHA256".to_string());
        transaction.flags = ConnectionFlags {
            reused_connection: true,
            expensive: true,
            ..ConnectionFlags::default()
        };
        let mut task = task();
        task.metrics = Some(MetricsRecord::new(0, 40, 0, vec![transaction]).unwrap());
        let bodies = MapBodies(HashMap::new());

        let full = visible(&render_task(&task, TaskDetail::Full, &bodies).unwrap());
        assert!(full.contains("#0 NetworkLoad h2 93.184.216.34:443"));
        assert!(full.contains("Local: 10.0.0.2:51234"));
        assert!(full.contains("TLS: TLSv1.3 TLS_AES_128_GCM_SHA256"));
        assert!(full.contains("Connection: reused, expensive"));

        let sharing = visible(&render_task(&task, TaskDetail::Sharing, &bodies).unwrap());
        assert!(sharing.contains("Duration: 40 ms"));
        assert!(!sharing.contains("TLSv1.3"));
        assert!(!sharing.contains("Connection:"));
    }

    #[test]
    fn test_missing_body_is_not_found() {
        let mut task = task();
        task.response_body = Some(BlobHash::of(b"gone"));
        let bodies = MapBodies(HashMap::new());

        let err = render_task(&task, TaskDetail::Sharing, &bodies).unwrap_err();
        assert!(matches!(err, ExportError::NotFound(_)));
    }
}
