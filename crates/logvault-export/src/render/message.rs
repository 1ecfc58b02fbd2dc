use logvault_core::MessageRecord;

use super::format_timestamp;
use crate::document::{Document, Style};

/// Render a log message
pub fn render_message(message: &MessageRecord) -> Document {
    let mut doc = Document::new();
    doc.line(
        format!(
            "{} [{}] {}",
            format_timestamp(message.created_at_millis),
            message.level.title(),
            message.label
        ),
        Style::Caption,
    );
    doc.line(&message.text, Style::Severity(message.level));
    for entry in &message.metadata {
        doc.line(format!("{}: {}", entry.key, entry.value), Style::Monospace);
    }

    let mut origin = format!("{} session {}", message.id, message.session.short());
    if !message.file.is_empty() {
        origin.push_str(&format!(" at {} {}", message.location(), message.function));
    }
    doc.technical(origin);
    doc
}
