use crate::document::{Document, Segment};

/// Width of a subheadline rule line, in characters
pub const RULE_WIDTH: usize = 80;

/// `-- Title ------…` padded to [`RULE_WIDTH`]
pub fn rule_line(title: &str) -> String {
    if title.is_empty() {
        return "-".repeat(RULE_WIDTH);
    }
    let mut line = format!("-- {title} ");
    let used = line.chars().count();
    line.push_str(&"-".repeat(RULE_WIDTH.saturating_sub(used)));
    line
}

/// Plain text: technical segments removed, subheadlines as rule lines
pub fn encode_text(document: &Document) -> Vec<u8> {
    let mut out = String::new();
    for segment in document.segments() {
        match segment {
            Segment::Text { text, .. } => out.push_str(text),
            Segment::Subheadline(title) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&rule_line(title));
                out.push('\n');
            }
            Segment::Technical(_) => {}
        }
    }
    out.into_bytes()
}
