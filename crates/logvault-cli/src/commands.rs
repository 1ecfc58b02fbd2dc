//! Subcommand implementations

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use logvault_core::SessionRecord;
use logvault_export::{ExportConfig, ExportFormat, ExportOutput, Exporter};
use logvault_storage::{LogFilter, LogStore, StoreConfig, StoreInfo};

/// Open an existing store; never creates one
pub fn open_store(config: &StoreConfig) -> anyhow::Result<LogStore> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("no store at {}", db_path.display());
    }
    LogStore::open(config.clone()).with_context(|| format!("opening {}", db_path.display()))
}

/// `logvault info`
pub fn format_info(info: &StoreInfo, config: &StoreConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Store:     {}", config.base_dir.display());
    if let Some(created) = info.created_at_millis {
        let _ = writeln!(out, "Created:   {}", format_millis(created));
    }
    let _ = writeln!(out, "Sessions:  {}", info.sessions);
    let _ = writeln!(out, "Messages:  {}", info.messages);
    let _ = writeln!(out, "Tasks:     {}", info.tasks);
    let _ = writeln!(out, "Labels:    {}", info.labels);
    let _ = writeln!(out, "Domains:   {}", info.domains);
    let _ = writeln!(
        out,
        "Blobs:     {} ({} inline), {} stored / {} original",
        info.blobs.count,
        info.blobs.inline_count,
        human_bytes(info.blobs.stored_bytes),
        human_bytes(info.blobs.original_bytes),
    );
    let _ = writeln!(out, "Database:  {}", human_bytes(info.db_bytes));
    out
}

/// `logvault sessions`, oldest first
pub fn format_sessions(sessions: &[SessionRecord]) -> String {
    if sessions.is_empty() {
        return "No sessions\n".to_string();
    }
    let mut out = String::new();
    for session in sessions {
        let _ = write!(
            out,
            "{}  {}",
            session.id,
            format_millis(session.started_at_millis)
        );
        match (&session.app_version, &session.app_build) {
            (Some(version), Some(build)) => {
                let _ = write!(out, "  {version} ({build})");
            }
            (Some(version), None) => {
                let _ = write!(out, "  {version}");
            }
            (None, Some(build)) => {
                let _ = write!(out, "  build {build}");
            }
            (None, None) => {}
        }
        out.push('\n');
    }
    out
}

/// Run an export, copy the artifact to `dest`, then remove the temporary files
///
/// Ctrl-C cancels the running export.
pub async fn run_export(
    store: Arc<LogStore>,
    filter: LogFilter,
    format: ExportFormat,
    config: ExportConfig,
    dest: Option<&Path>,
) -> anyhow::Result<Vec<PathBuf>> {
    info!(
        %format,
        sessions = filter.sessions.len(),
        levels = %filter.level_summary(),
        "Starting export"
    );

    let task = Exporter::new(config).with_store(store).start(filter, format)?;
    let token = task.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let result = task.wait().await;
    interrupt.abort();
    let output = result?;

    let delivered = deliver(&output, dest);
    if let Err(e) = output.cleanup() {
        warn!(error = %e, "Failed to remove export directory");
    }
    delivered
}

/// Copy every produced file to `dest`
///
/// `dest` may name an existing directory, or the file to write when the
/// export produced a single file. Defaults to the current directory.
pub fn deliver(output: &ExportOutput, dest: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let dest = match dest {
        Some(dest) => dest.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let locations = output.locations();
    if locations.is_empty() {
        bail!("export produced no files");
    }

    let into_dir = dest.is_dir() || locations.len() > 1;
    if into_dir {
        std::fs::create_dir_all(&dest)?;
    } else if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut delivered = Vec::with_capacity(locations.len());
    for location in locations {
        let target = if into_dir {
            let name = location
                .file_name()
                .with_context(|| format!("unnamed artifact {}", location.display()))?;
            dest.join(name)
        } else {
            dest.clone()
        };
        std::fs::copy(location, &target)
            .with_context(|| format!("copying to {}", target.display()))?;
        info!(path = %target.display(), "Wrote export");
        delivered.push(target);
    }
    Ok(delivered)
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
