use crate::document::{Document, Segment};
use crate::error::ExportResult;

use super::text::encode_text;

/// A PDF renderer available on this platform
///
/// Implementations must drop technical segments, like the HTML encoder.
pub trait PdfBackend: Send + Sync {
    fn render(&self, document: &Document, title: &str) -> ExportResult<Vec<u8>>;
}

/// Result of PDF encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfOutput {
    /// Binary PDF from a registered backend
    Pdf(Vec<u8>),
    /// UTF-8 text explaining that no backend exists, followed by the content
    Diagnostic(Vec<u8>),
}

impl PdfOutput {
    pub fn bytes(&self) -> &[u8] {
        match self {
            PdfOutput::Pdf(bytes) | PdfOutput::Diagnostic(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PdfOutput::Pdf(bytes) | PdfOutput::Diagnostic(bytes) => bytes,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            PdfOutput::Pdf(_) => "pdf",
            PdfOutput::Diagnostic(_) => "txt",
        }
    }
}

/// Encoder used when no [`PdfBackend`] is registered
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPdf;

impl FallbackPdf {
    pub fn encode(&self, document: &Document, title: &str) -> Vec<u8> {
        let subheadlines = document
            .segments()
            .iter()
            .filter(|s| matches!(s, Segment::Subheadline(_)))
            .count();
        let mut out = format!(
            "PDF rendering is not available on this platform.\n\
             Title: {title}\n\
             Segments: {} ({subheadlines} sections)\n\
             The content follows as plain text.\n\n",
            document.segments().len()
        )
        .into_bytes();
        out.extend(encode_text(document));
        out
    }

    /// Encode with `backend`, or fall back to the diagnostic payload
    pub fn encode_with(
        backend: Option<&dyn PdfBackend>,
        document: &Document,
        title: &str,
    ) -> ExportResult<PdfOutput> {
        match backend {
            Some(backend) => backend.render(document, title).map(PdfOutput::Pdf),
            None => Ok(PdfOutput::Diagnostic(FallbackPdf.encode(document, title))),
        }
    }
}
