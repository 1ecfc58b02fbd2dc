//! Format encoders
//!
//! Document encoders ([`encode_text`], [`encode_html`], PDF) are pure
//! functions of a [`Document`](crate::Document) and drop every technical
//! segment. The HAR encoder works on the raw task set instead.

mod har;
mod html;
mod pdf;
mod text;

pub use har::{HAR_VERSION, encode_har};
pub use html::encode_html;
pub use pdf::{FallbackPdf, PdfBackend, PdfOutput};
pub use text::{RULE_WIDTH, encode_text, rule_line};
