//! Body presentation

/// Bodies longer than this are truncated in [`TaskDetail::Sharing`](super::TaskDetail) mode
pub const SHARING_BODY_LIMIT: usize = 16 * 1024;

/// A body prepared for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyText {
    Empty,
    /// Pretty-printed JSON
    Json(String),
    Text(String),
    /// Not valid UTF-8
    Binary { len: usize },
}

impl BodyText {
    /// Display text, truncated to `limit` bytes on a character boundary
    pub fn display(&self, limit: Option<usize>) -> String {
        match self {
            BodyText::Empty => "(empty)".to_string(),
            BodyText::Binary { len } => format!("<binary, {len} bytes>"),
            BodyText::Json(text) | BodyText::Text(text) => match limit {
                Some(limit) if text.len() > limit => {
                    let mut cut = limit;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    format!("{}\n… ({} bytes total)", &text[..cut], text.len())
                }
                _ => text.clone(),
            },
        }
    }
}

/// Classify a body; JSON is recognised by content type or leading bracket
pub fn describe_body(data: &[u8], content_type: Option<&str>) -> BodyText {
    if data.is_empty() {
        return BodyText::Empty;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return BodyText::Binary { len: data.len() };
    };

    let looks_like_json = content_type.is_some_and(|ct| ct.contains("json"))
        || text.trim_start().starts_with(['{', '[']);
    if looks_like_json {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return BodyText::Json(pretty);
            }
        }
    }
    BodyText::Text(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_pretty_printed() {
        let body = describe_body(br#"{"a":1}"#, None);
        assert_eq!(body, BodyText::Json("{\n  \"a\": 1\n}".to_string()));
    }

    #[test]
    fn test_invalid_json_stays_text() {
        let body = describe_body(b"{not json", Some("application/json"));
        assert_eq!(body, BodyText::Text("{not json".to_string()));
    }

    #[test]
    fn test_binary_and_empty() {
        assert_eq!(describe_body(&[0xff, 0xfe, 0x00], None), BodyText::Binary { len: 3 });
        assert_eq!(describe_body(b"", None).display(None), "(empty)");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let body = BodyText::Text("héllo".to_string());
        assert_eq!(body.display(Some(2)), "h\n… (6 bytes total)");
        assert_eq!(body.display(Some(10)), "héllo");
    }
}
