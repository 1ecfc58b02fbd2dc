use crate::document::{Document, Segment, Style};
use crate::error::{ExportError, ExportResult};

const STYLESHEET: &str = "body{font-family:-apple-system,Helvetica,sans-serif;font-size:13px}\
pre{white-space:pre-wrap;margin:0}\
.caption{color:#6e6e73}.strong{font-weight:600}.mono{font-family:Menlo,monospace}\
.level-warning{color:#b25000}.level-error,.level-critical{color:#d70015}\
h3{font-size:13px;border-bottom:1px solid #d2d2d7;margin:12px 0 4px}";

/// Standalone HTML document; technical segments are dropped
///
/// Fails when the text contains control characters HTML cannot carry.
pub fn encode_html(document: &Document, title: &str) -> ExportResult<Vec<u8>> {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape(title)?));
    out.push_str(&format!("<style>{STYLESHEET}</style>\n</head>\n<body>\n<pre>"));

    for segment in document.segments() {
        match segment {
            Segment::Text { text, style } => {
                out.push_str(&format!("<span class=\"{}\">{}</span>", class(*style), escape(text)?));
            }
            Segment::Subheadline(title) => {
                out.push_str(&format!("</pre>\n<h3>{}</h3>\n<pre>", escape(title)?));
            }
            Segment::Technical(_) => {}
        }
    }

    out.push_str("</pre>\n</body>\n</html>\n");
    Ok(out.into_bytes())
}

fn class(style: Style) -> String {
    match style {
        Style::Body => "body".to_string(),
        Style::Caption => "caption".to_string(),
        Style::Strong => "strong".to_string(),
        Style::Monospace => "mono".to_string(),
        Style::Severity(level) => format!("level-{}", level.name()),
    }
}

fn escape(text: &str) -> ExportResult<String> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' | '\t' | '\r' => out.push(c),
            c if c.is_control() => {
                return Err(ExportError::encoding(format!(
                    "control character U+{:04X} cannot be represented in HTML",
                    c as u32
                )));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_core::LogLevel;

    #[test]
    fn test_encode_html() {
        let mut doc = Document::new();
        doc.line("a < b", Style::Severity(LogLevel::Error))
            .technical("secret id")
            .subheadline("Response");

        let html = String::from_utf8(encode_html(&doc, "Export").unwrap()).unwrap();
        assert!(html.contains("<title>Export</title>"));
        assert!(html.contains("<span class=\"level-error\">a &lt; b\n</span>"));
        assert!(html.contains("<h3>Response</h3>"));
        assert!(!html.contains("secret id"));
    }

    #[test]
    fn test_control_characters_fail() {
        let mut doc = Document::new();
        doc.line("bell \u{7}", Style::Body);
        assert!(matches!(
            encode_html(&doc, "Export"),
            Err(ExportError::Encoding(_))
        ));
    }
}
