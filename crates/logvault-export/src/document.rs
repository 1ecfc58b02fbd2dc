//! Styled document intermediate representation
//!
//! Renderers produce a [`Document`]: an ordered list of typed segments.
//! Encoders decide per segment kind what to emit, so stripping internal
//! detail is a structural filter rather than a scan over display attributes.

use logvault_core::LogLevel;

/// Visual role of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Style {
    #[default]
    Body,
    /// Entry headline (timestamp, level, label)
    Caption,
    /// Emphasized summary line
    Strong,
    /// Headers, bodies and other verbatim data
    Monospace,
    /// Text colored by severity
    Severity(LogLevel),
}

/// One typed piece of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Visible text
    Text { text: String, style: Style },
    /// Section separator with a title
    Subheadline(String),
    /// Internal detail, omitted from every export format
    Technical(String),
}

/// A rendered, styled document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    segments: Vec<Segment>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a text run
    pub fn text(&mut self, text: impl Into<String>, style: Style) -> &mut Self {
        let text = text.into();
        if !text.is_empty() {
            self.segments.push(Segment::Text { text, style });
        }
        self
    }

    /// Append a text run terminated by a newline
    pub fn line(&mut self, text: impl AsRef<str>, style: Style) -> &mut Self {
        self.text(format!("{}\n", text.as_ref()), style)
    }

    pub fn subheadline(&mut self, title: impl Into<String>) -> &mut Self {
        self.segments.push(Segment::Subheadline(title.into()));
        self
    }

    pub fn technical(&mut self, text: impl Into<String>) -> &mut Self {
        self.segments.push(Segment::Technical(text.into()));
        self
    }

    /// Append every segment of `other`
    pub fn append(&mut self, other: Document) -> &mut Self {
        self.segments.extend(other.segments);
        self
    }

    /// Number of technical segments
    pub fn technical_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Technical(_)))
            .count()
    }
}

impl FromIterator<Document> for Document {
    fn from_iter<T: IntoIterator<Item = Document>>(iter: T) -> Self {
        let mut document = Document::new();
        for part in iter {
            document.append(part);
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_skips_empty_text() {
        let mut doc = Document::new();
        doc.text("", Style::Body)
            .line("hello", Style::Strong)
            .technical("id 7")
            .subheadline("Request");

        assert_eq!(
            doc.segments(),
            &[
                Segment::Text {
                    text: "hello\n".to_string(),
                    style: Style::Strong
                },
                Segment::Technical("id 7".to_string()),
                Segment::Subheadline("Request".to_string()),
            ]
        );
        assert_eq!(doc.technical_count(), 1);
    }

    #[test]
    fn test_collect_concatenates() {
        let parts = (0..3).map(|i| {
            let mut doc = Document::new();
            doc.line(i.to_string(), Style::Body);
            doc
        });
        let doc: Document = parts.collect();
        assert_eq!(doc.segments().len(), 3);
    }
}
