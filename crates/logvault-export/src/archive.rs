//! Archive containers
//!
//! Archive exports bypass rendering: they materialize a filtered copy of
//! the store and its referenced bodies into a zstd-compressed tar file.
//!
//! ```text
//! export.logvault / export.logpkg
//! ├── manifest.json
//! ├── store.redb
//! └── blobs/
//!     └── <hex content hash>    (stored, zstd-compressed bytes)
//! ```
//!
//! The `.logvault` kind carries only the externally stored bodies; inline
//! bodies live in `store.redb`. The `.logpkg` package also writes every
//! inline body under `blobs/`, so the bodies can be read without the
//! database engine.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use logvault_storage::{BlobStoreConfig, LogFilter, LogStore, StoreConfig};

use crate::error::{ExportError, ExportResult};

/// Version written into (and required from) `manifest.json`
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STORE_FILE: &str = "store.redb";
pub const BLOBS_DIR: &str = "blobs";

const ZSTD_LEVEL: i32 = 3;

/// Which container to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Store copy plus external bodies
    Store,
    /// Self-contained package: inline bodies are written out as files too
    Package,
}

impl ArchiveKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveKind::Store => "logvault",
            ArchiveKind::Package => "logpkg",
        }
    }
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub format_version: u32,
    pub kind: ArchiveKind,
    /// RFC 3339 creation time
    pub created_at: String,
    pub creator: String,
    pub sessions: Vec<String>,
    pub messages: usize,
    pub tasks: usize,
    /// Files under `blobs/`
    pub blob_files: usize,
    /// Level selection the archive was filtered with
    pub levels: String,
    /// BLAKE3 hex digest of `store.redb`
    pub store_checksum: String,
}

/// Store layout inside an unpacked archive directory
pub fn archive_store_config(dir: impl Into<PathBuf>) -> StoreConfig {
    StoreConfig {
        db_file: STORE_FILE.to_string(),
        blobs: BlobStoreConfig {
            base_dir: PathBuf::from(BLOBS_DIR),
            shard_depth: 0,
            ..Default::default()
        },
        ..StoreConfig::with_base_dir(dir)
    }
}

/// Write an archive of the entities matching `filter` to `output`
///
/// `staging` must not exist yet; it holds the intermediate store copy and
/// is removed once the container is written. `should_continue` is polled
/// between phases and bodies.
#[instrument(skip_all, fields(kind = ?kind, output = %output.display()))]
pub fn write_archive(
    store: &LogStore,
    filter: &LogFilter,
    kind: ArchiveKind,
    staging: &Path,
    output: &Path,
    mut should_continue: impl FnMut() -> bool,
) -> ExportResult<ArchiveManifest> {
    let config = archive_store_config(staging);
    let blobs_dir = config.blob_config().base_dir;

    let (copy, summary) = store
        .copy_filtered(filter, config, &mut should_continue)?
        .ok_or(ExportError::Cancelled)?;

    if kind == ArchiveKind::Package {
        for handle in copy.blobs().list()? {
            if !should_continue() {
                return Err(ExportError::Cancelled);
            }
            if handle.is_inline() {
                let (_, stored) = copy.blobs().get_stored(&handle.hash)?;
                std::fs::write(blobs_dir.join(handle.hash.to_hex()), stored)?;
            }
        }
    }
    drop(copy);

    let store_checksum = checksum_file(&staging.join(STORE_FILE))?;
    let mut blob_files = blob_file_names(&blobs_dir)?;
    blob_files.sort();

    let manifest = ArchiveManifest {
        format_version: ARCHIVE_FORMAT_VERSION,
        kind,
        created_at: chrono::Utc::now().to_rfc3339(),
        creator: format!("logvault {}", env!("CARGO_PKG_VERSION")),
        sessions: summary.sessions.iter().map(|s| s.to_string()).collect(),
        messages: summary.messages,
        tasks: summary.tasks,
        blob_files: blob_files.len(),
        levels: filter.level_summary(),
        store_checksum,
    };
    std::fs::write(
        staging.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(&manifest)?,
    )?;

    if !should_continue() {
        return Err(ExportError::Cancelled);
    }

    let encoder = zstd::Encoder::new(BufWriter::new(File::create(output)?), ZSTD_LEVEL)
        .map_err(|e| ExportError::archive(format!("zstd encode: {e}")))?;
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    let append = |builder: &mut tar::Builder<_>, name: &str| {
        builder
            .append_path_with_name(staging.join(name), name)
            .map_err(|e| ExportError::archive(format!("append {name}: {e}")))
    };
    append(&mut builder, MANIFEST_FILE)?;
    append(&mut builder, STORE_FILE)?;
    for name in &blob_files {
        if !should_continue() {
            return Err(ExportError::Cancelled);
        }
        append(&mut builder, &format!("{BLOBS_DIR}/{name}"))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ExportError::archive(format!("finish tar: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ExportError::archive(format!("finish zstd: {e}")))?
        .flush()?;

    std::fs::remove_dir_all(staging)?;

    info!(
        messages = manifest.messages,
        tasks = manifest.tasks,
        blobs = manifest.blob_files,
        "Wrote archive"
    );
    Ok(manifest)
}

/// Read `manifest.json` from an archive without extracting it
pub fn read_manifest(path: &Path) -> ExportResult<ArchiveManifest> {
    let mut archive = open_archive(path)?;
    for entry in archive
        .entries()
        .map_err(|e| ExportError::archive(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| ExportError::archive(e.to_string()))?;
        let is_manifest = entry
            .path()
            .map_err(|e| ExportError::archive(e.to_string()))?
            .as_os_str()
            == MANIFEST_FILE;
        if is_manifest {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| ExportError::archive(format!("read {MANIFEST_FILE}: {e}")))?;
            return parse_manifest(&data);
        }
    }
    Err(ExportError::archive(format!("missing {MANIFEST_FILE}")))
}

/// Extract an archive into `dest` and validate it
///
/// The extracted directory can be opened with
/// `LogStore::open(archive_store_config(dest))`.
#[instrument(skip_all, fields(path = %path.display(), dest = %dest.display()))]
pub fn unpack_archive(path: &Path, dest: &Path) -> ExportResult<ArchiveManifest> {
    std::fs::create_dir_all(dest)?;
    let mut archive = open_archive(path)?;
    for entry in archive
        .entries()
        .map_err(|e| ExportError::archive(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| ExportError::archive(e.to_string()))?;
        // unpack_in refuses paths that escape `dest`
        entry
            .unpack_in(dest)
            .map_err(|e| ExportError::archive(format!("extract: {e}")))?;
    }

    let manifest_path = dest.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(ExportError::archive(format!("missing {MANIFEST_FILE}")));
    }
    let manifest = parse_manifest(&std::fs::read(manifest_path)?)?;

    let store_path = dest.join(STORE_FILE);
    if !store_path.exists() {
        return Err(ExportError::archive(format!("missing {STORE_FILE}")));
    }
    let actual = checksum_file(&store_path)?;
    if actual != manifest.store_checksum {
        return Err(ExportError::archive(format!(
            "{STORE_FILE} checksum mismatch: expected {}, found {actual}",
            manifest.store_checksum
        )));
    }

    debug!(blobs = manifest.blob_files, "Unpacked archive");
    Ok(manifest)
}

fn open_archive(path: &Path) -> ExportResult<tar::Archive<zstd::Decoder<'static, BufReader<File>>>> {
    let decoder = zstd::Decoder::new(File::open(path)?)
        .map_err(|e| ExportError::archive(format!("zstd decode: {e}")))?;
    Ok(tar::Archive::new(decoder))
}

fn parse_manifest(data: &[u8]) -> ExportResult<ArchiveManifest> {
    let manifest: ArchiveManifest = serde_json::from_slice(data)
        .map_err(|e| ExportError::archive(format!("invalid {MANIFEST_FILE}: {e}")))?;
    if manifest.format_version != ARCHIVE_FORMAT_VERSION {
        return Err(ExportError::archive(format!(
            "unsupported archive format version {}",
            manifest.format_version
        )));
    }
    Ok(manifest)
}

fn checksum_file(path: &Path) -> ExportResult<String> {
    let mut hasher = blake3::Hasher::new();
    let mut file = BufReader::new(File::open(path)?);
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn blob_file_names(dir: &Path) -> ExportResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_core::{LogLevel, RequestRecord, ResponseRecord, SessionId};
    use logvault_storage::{NewMessage, NewTask, TaskCompletion};
    use tempfile::TempDir;

    fn populated_store(dir: &Path) -> LogStore {
        let store = LogStore::open(StoreConfig::with_base_dir(dir)).unwrap();
        let session = SessionId::new();
        store
            .record_message(NewMessage::new(session, LogLevel::Info, "app", "hello"))
            .unwrap();
        store
            .record_task(
                NewTask::new(session, RequestRecord::new("GET", "https://example.com/small")),
                TaskCompletion::response(ResponseRecord::new(200)).with_body(b"tiny".to_vec()),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_store_archive_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = populated_store(&temp_dir.path().join("src"));
        let output = temp_dir.path().join("export.logvault");

        let manifest = write_archive(
            &store,
            &LogFilter::all(),
            ArchiveKind::Store,
            &temp_dir.path().join("staging"),
            &output,
            || true,
        )
        .unwrap();
        assert_eq!(manifest.messages, 2);
        assert_eq!(manifest.tasks, 1);
        // The only body is inline
        assert_eq!(manifest.blob_files, 0);
        assert!(!temp_dir.path().join("staging").exists());

        assert_eq!(read_manifest(&output).unwrap(), manifest);

        let unpacked = temp_dir.path().join("unpacked");
        assert_eq!(unpack_archive(&output, &unpacked).unwrap(), manifest);
        let reopened = LogStore::open(archive_store_config(&unpacked)).unwrap();
        assert_eq!(reopened.fetch(&LogFilter::all()).unwrap().len(), 2);
    }

    #[test]
    fn test_package_materializes_inline_bodies() {
        let temp_dir = TempDir::new().unwrap();
        let store = populated_store(&temp_dir.path().join("src"));
        let output = temp_dir.path().join("export.logpkg");

        let manifest = write_archive(
            &store,
            &LogFilter::all(),
            ArchiveKind::Package,
            &temp_dir.path().join("staging"),
            &output,
            || true,
        )
        .unwrap();
        assert_eq!(manifest.blob_files, 1);

        let unpacked = temp_dir.path().join("unpacked");
        unpack_archive(&output, &unpacked).unwrap();
        let hash = logvault_core::BlobHash::of(b"tiny");
        let stored = std::fs::read(unpacked.join(BLOBS_DIR).join(hash.to_hex())).unwrap();
        assert_eq!(zstd::decode_all(stored.as_slice()).unwrap(), b"tiny");
    }

    #[test]
    fn test_tampered_store_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = populated_store(&temp_dir.path().join("src"));
        let staging = temp_dir.path().join("staging");
        let output = temp_dir.path().join("export.logvault");
        write_archive(&store, &LogFilter::all(), ArchiveKind::Store, &staging, &output, || true)
            .unwrap();

        // Rebuild the container with a different store file
        let unpacked = temp_dir.path().join("unpacked");
        unpack_archive(&output, &unpacked).unwrap();
        std::fs::write(unpacked.join(STORE_FILE), b"not a database").unwrap();
        let tampered = temp_dir.path().join("tampered.logvault");
        {
            let encoder = zstd::Encoder::new(File::create(&tampered).unwrap(), 3).unwrap();
            let mut builder = tar::Builder::new(encoder);
            builder
                .append_path_with_name(unpacked.join(MANIFEST_FILE), MANIFEST_FILE)
                .unwrap();
            builder
                .append_path_with_name(unpacked.join(STORE_FILE), STORE_FILE)
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let err = unpack_archive(&tampered, &temp_dir.path().join("again")).unwrap_err();
        assert!(matches!(err, ExportError::Archive(ref m) if m.contains("checksum")));
    }
}
