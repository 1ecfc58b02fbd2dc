//! Export orchestrator
//!
//! Coordinates fetch → render → encode (or store copy → archive) on the
//! blocking thread pool. Each export owns a private temporary directory and
//! a [`CancellationToken`]; the caller gets an [`ExportTask`] handle and
//! awaits a single outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use logvault_storage::{LogFilter, LogStore};

use crate::archive::{ArchiveManifest, write_archive};
use crate::encode::{FallbackPdf, PdfBackend, encode_har, encode_html, encode_text};
use crate::error::{ExportError, ExportResult};
use crate::format::ExportFormat;
use crate::render::{TaskDetail, render_entries};

/// Configuration for exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Parent of the per-export temporary directories (system default when unset)
    pub temp_root: Option<PathBuf>,
    /// Title of HTML and PDF documents
    pub title: String,
    /// Artifact file name without extension
    pub file_stem: String,
    /// Task detail for document formats
    pub detail: TaskDetail,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            temp_root: None,
            title: "Logvault export".to_string(),
            file_stem: "logvault-export".to_string(),
            detail: TaskDetail::Sharing,
        }
    }
}

impl ExportConfig {
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(temp_root.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_detail(mut self, detail: TaskDetail) -> Self {
        self.detail = detail;
        self
    }
}

/// A finished export
///
/// The artifact lives in a temporary directory that stays on disk until
/// [`cleanup`](Self::cleanup) is called.
#[derive(Debug)]
pub struct ExportOutput {
    format: ExportFormat,
    root: PathBuf,
    locations: Vec<PathBuf>,
    size: Option<u64>,
    manifest: Option<ArchiveManifest>,
}

impl ExportOutput {
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Every produced file
    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    /// The primary artifact
    pub fn location(&self) -> Option<&Path> {
        self.locations.first().map(PathBuf::as_path)
    }

    /// Total size of the produced files in bytes
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Temporary directory holding the artifact
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive manifest, for archive formats
    pub fn manifest(&self) -> Option<&ArchiveManifest> {
        self.manifest.as_ref()
    }

    /// Remove the temporary directory and everything in it
    pub fn cleanup(self) -> ExportResult<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(root = %self.root.display(), "Removed export directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Where a running export is, reported before each cancellation check
#[derive(Debug, Clone, Copy)]
pub struct ExportProgress<'a> {
    pub format: ExportFormat,
    /// The export's temporary directory
    pub root: &'a Path,
    /// Units of work done so far (entities, bodies, archive members)
    pub step: usize,
}

/// Observer of [`ExportProgress`], called on the blocking thread
pub type ProgressObserver = Arc<dyn Fn(&ExportProgress<'_>) + Send + Sync>;

/// Handle to a running export
#[derive(Debug)]
pub struct ExportTask {
    format: ExportFormat,
    token: CancellationToken,
    handle: JoinHandle<ExportResult<ExportOutput>>,
}

impl ExportTask {
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Request cancellation; the outcome resolves to `Cancelled`
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the outcome
    ///
    /// A cancelled export never yields an artifact: output that finished
    /// after cancellation was requested is cleaned up before `Cancelled` is
    /// returned.
    pub async fn wait(self) -> ExportResult<ExportOutput> {
        let result = self
            .handle
            .await
            .map_err(|e| ExportError::Io(format!("export task failed: {e}")))?;

        match result {
            Ok(output) if self.token.is_cancelled() => {
                output.cleanup()?;
                Err(ExportError::Cancelled)
            }
            other => other,
        }
    }
}

/// Starts exports from a bound store
///
/// Starting an export while another is running is allowed; exports are
/// independent. The exporter only remembers the most recent one so it can
/// be cancelled with [`cancel_current`](Self::cancel_current).
pub struct Exporter {
    store: Option<Arc<LogStore>>,
    config: ExportConfig,
    pdf: Option<Arc<dyn PdfBackend>>,
    progress: Option<ProgressObserver>,
    current: Mutex<Option<CancellationToken>>,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            store: None,
            config,
            pdf: None,
            progress: None,
            current: Mutex::new(None),
        }
    }

    pub fn with_store(mut self, store: Arc<LogStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bind or unbind the store used by later exports
    pub fn set_store(&mut self, store: Option<Arc<LogStore>>) {
        self.store = store;
    }

    /// Register a PDF renderer
    pub fn with_pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.pdf = Some(backend);
        self
    }

    /// Whether PDF exports produce real PDF documents
    pub fn has_pdf_backend(&self) -> bool {
        self.pdf.is_some()
    }

    /// Observe progress of every export started afterwards
    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Start an export on the blocking thread pool
    ///
    /// Must be called from within a Tokio runtime. Fails immediately with
    /// `StoreUnavailable` when no store is bound.
    #[instrument(skip_all, fields(format = %format, levels = %filter.level_summary()))]
    pub fn start(&self, filter: LogFilter, format: ExportFormat) -> ExportResult<ExportTask> {
        self.start_with_token(filter, format, CancellationToken::new())
    }

    /// Start an export that is also cancelled through `token`
    ///
    /// Pass a child token to tie the export to a wider cancellation scope.
    pub fn start_with_token(
        &self,
        filter: LogFilter,
        format: ExportFormat,
        token: CancellationToken,
    ) -> ExportResult<ExportTask> {
        let store = self.store.clone().ok_or(ExportError::StoreUnavailable)?;

        let job = ExportJob {
            store,
            filter,
            format,
            config: self.config.clone(),
            pdf: self.pdf.clone(),
            progress: self.progress.clone(),
            steps: AtomicUsize::new(0),
            token: token.clone(),
        };
        let handle = tokio::task::spawn_blocking(move || job.run());

        *self.current.lock() = Some(token.clone());
        info!("Export started");

        Ok(ExportTask {
            format,
            token,
            handle,
        })
    }

    /// Cancel the most recently started export
    ///
    /// Returns false when there is none or it was already cancelled.
    pub fn cancel_current(&self) -> bool {
        match self.current.lock().take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Export `filter` from `store` as `format` and wait for the outcome
pub async fn export(
    store: Arc<LogStore>,
    filter: LogFilter,
    format: ExportFormat,
    config: ExportConfig,
) -> ExportResult<ExportOutput> {
    Exporter::new(config)
        .with_store(store)
        .start(filter, format)?
        .wait()
        .await
}

/// Everything one export needs, moved onto the blocking pool
struct ExportJob {
    store: Arc<LogStore>,
    filter: LogFilter,
    format: ExportFormat,
    config: ExportConfig,
    pdf: Option<Arc<dyn PdfBackend>>,
    progress: Option<ProgressObserver>,
    steps: AtomicUsize,
    token: CancellationToken,
}

impl ExportJob {
    fn run(self) -> ExportResult<ExportOutput> {
        let result = self.produce();
        match &result {
            Ok(output) => info!(
                format = %self.format,
                size = ?output.size,
                location = ?output.location(),
                "Export finished"
            ),
            Err(ExportError::Cancelled) => info!(format = %self.format, "Export cancelled"),
            Err(e) => warn!(format = %self.format, error = %e, "Export failed"),
        }
        result
    }

    /// Report progress, then poll the token
    fn keep_going(&self, root: &Path) -> bool {
        let step = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(observer) = &self.progress {
            observer(&ExportProgress {
                format: self.format,
                root,
                step,
            });
        }
        !self.token.is_cancelled()
    }

    fn check(&self) -> ExportResult<()> {
        if self.token.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Produce the artifact; the temporary directory is removed on every
    /// early return
    fn produce(&self) -> ExportResult<ExportOutput> {
        self.check()?;
        let dir = self.temp_dir()?;
        let keep_going = || self.keep_going(dir.path());
        let title = self.config.title.as_str();

        let mut manifest = None;
        let location = if let Some(kind) = self.format.archive_kind() {
            let location = self.artifact_path(dir.path(), self.format.extension());
            manifest = Some(write_archive(
                &self.store,
                &self.filter,
                kind,
                &dir.path().join("staging"),
                &location,
                keep_going,
            )?);
            location
        } else if self.format.is_document() {
            let entries = self.store.fetch(&self.filter)?;
            self.check()?;
            debug!(entries = entries.len(), "Rendering document");
            let document =
                render_entries(&entries, self.config.detail, &*self.store, keep_going)?;
            self.check()?;
            debug!(
                technical = document.technical_count(),
                "Encoding document without technical segments"
            );

            let (bytes, extension) = match self.format {
                ExportFormat::Html => {
                    let bytes = encode_html(&document, title).unwrap_or_else(|e| {
                        warn!(error = %e, "HTML encoding failed, writing an empty document");
                        Vec::new()
                    });
                    (bytes, "html")
                }
                ExportFormat::Pdf => {
                    let output = FallbackPdf::encode_with(self.pdf.as_deref(), &document, title)?;
                    let extension = output.extension();
                    (output.into_bytes(), extension)
                }
                _ => (encode_text(&document), "txt"),
            };
            self.write(dir.path(), extension, &bytes)?
        } else {
            let tasks = self.store.fetch_tasks(&self.filter)?;
            self.check()?;
            debug!(tasks = tasks.len(), "Encoding HAR");
            let bytes = encode_har(&tasks, &*self.store, keep_going)?;
            self.write(dir.path(), self.format.extension(), &bytes)?
        };

        self.check()?;
        let size = std::fs::metadata(&location)?.len();
        Ok(ExportOutput {
            format: self.format,
            root: dir.keep(),
            locations: vec![location],
            size: Some(size),
            manifest,
        })
    }

    fn temp_dir(&self) -> ExportResult<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("logvault-export-");
        let dir = match &self.config.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!(dir = %dir.path().display(), "Created export directory");
        Ok(dir)
    }

    fn artifact_path(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{}.{extension}", self.config.file_stem))
    }

    fn write(&self, dir: &Path, extension: &str, bytes: &[u8]) -> ExportResult<PathBuf> {
        let path = self.artifact_path(dir, extension);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}
