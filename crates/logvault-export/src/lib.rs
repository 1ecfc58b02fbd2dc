//! # Logvault Export
//!
//! Turns a filtered view of a [`LogStore`](logvault_storage::LogStore) into
//! a shareable artifact.
//!
//! ## Pipeline
//!
//! ```text
//! Exporter.start(filter, format) → ExportTask
//!   ├─ Document formats (text, HTML, PDF):
//!   │    fetch → render (Document) → encode, technical segments dropped
//!   ├─ HAR:
//!   │    fetch tasks → encode HAR 1.2 JSON
//!   └─ Archive formats (.logvault, .logpkg):
//!        filtered store copy + bodies → tar + zstd
//! ```
//!
//! Every export runs on the blocking thread pool inside its own temporary
//! directory. Cancellation and failures remove that directory before the
//! outcome resolves; on success the caller owns it and calls
//! [`ExportOutput::cleanup`] when done.

pub mod archive;
pub mod document;
pub mod encode;
pub mod error;
pub mod exporter;
pub mod format;
pub mod render;

pub use archive::{
    ArchiveKind, ArchiveManifest, archive_store_config, read_manifest, unpack_archive,
    write_archive,
};
pub use document::{Document, Segment, Style};
pub use encode::{FallbackPdf, PdfBackend, PdfOutput, encode_har, encode_html, encode_text, rule_line};
pub use error::{ExportError, ExportResult};
pub use exporter::{
    ExportConfig, ExportOutput, ExportProgress, ExportTask, Exporter, ProgressObserver, export,
};
pub use format::ExportFormat;
pub use render::{BodySource, TaskDetail, render_entries, render_message, render_task};
