//! Command flows against an on-disk store.

use std::sync::Arc;

use logvault_cli::commands::{format_info, open_store, run_export};
use logvault_cli::{Cli, CliConfig};
use logvault_core::{LogLevel, SessionId, SessionRecord};
use logvault_export::{ExportConfig, ExportFormat, archive_store_config, unpack_archive};
use logvault_storage::{LogFilter, LogStore, NewMessage, StoreConfig};
use tempfile::TempDir;

use clap::Parser;

fn seeded_store(temp_dir: &TempDir) -> (StoreConfig, SessionId) {
    let config = StoreConfig::with_base_dir(temp_dir.path().join("store"));
    let store = LogStore::open(config.clone()).unwrap();
    let session = SessionId::new();
    store
        .register_session(&SessionRecord::new(session, 500).with_version("3.0"))
        .unwrap();
    store
        .record_message(NewMessage::new(session, LogLevel::Info, "app", "ready").at(1_000))
        .unwrap();
    store
        .record_message(NewMessage::new(session, LogLevel::Error, "sync", "conflict").at(2_000))
        .unwrap();
    (config, session)
}

#[test]
fn info_reports_counts() {
    let temp_dir = TempDir::new().unwrap();
    let (config, _) = seeded_store(&temp_dir);

    let store = open_store(&config).unwrap();
    let report = format_info(&store.info().unwrap(), &config);
    assert!(report.contains("Sessions:  1"));
    assert!(report.contains("Messages:  2"));
}

#[tokio::test]
async fn export_copies_artifact_and_removes_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let (config, session) = seeded_store(&temp_dir);
    let store = Arc::new(open_store(&config).unwrap());

    let exports = temp_dir.path().join("exports");
    let dest = temp_dir.path().join("out").join("errors.txt");
    let written = run_export(
        store,
        LogFilter::sessions([session]).with_levels([LogLevel::Error]),
        ExportFormat::PlainText,
        ExportConfig::default().with_temp_root(&exports),
        Some(dest.as_path()),
    )
    .await
    .unwrap();

    assert_eq!(written, vec![dest.clone()]);
    let text = std::fs::read_to_string(&dest).unwrap();
    assert!(text.contains("conflict"));
    assert!(!text.contains("ready"));

    let leftovers = std::fs::read_dir(&exports)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn exported_archive_reopens_as_store() {
    let temp_dir = TempDir::new().unwrap();
    let (config, _) = seeded_store(&temp_dir);
    let store = Arc::new(open_store(&config).unwrap());

    let out_dir = temp_dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    let written = run_export(
        store,
        LogFilter::all(),
        ExportFormat::Archive,
        ExportConfig::default().with_temp_root(temp_dir.path().join("exports")),
        Some(out_dir.as_path()),
    )
    .await
    .unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with(&out_dir));

    let unpacked = temp_dir.path().join("unpacked");
    let manifest = unpack_archive(&written[0], &unpacked).unwrap();
    assert_eq!(manifest.messages, 2);
    let reopened = LogStore::open(archive_store_config(&unpacked)).unwrap();
    assert_eq!(reopened.info().unwrap().messages, 2);
}

#[test]
fn config_file_and_flags_combine() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("logvault.toml");
    std::fs::write(&path, "[export]\ntitle = \"Nightly\"\n\n[log]\ndefault_level = \"error\"\n")
        .unwrap();

    let path_arg = path.to_string_lossy().into_owned();
    let cli = Cli::try_parse_from(["logvault", "--config", path_arg.as_str(), "sessions"]).unwrap();
    let mut config = CliConfig::load(cli.config.as_deref()).unwrap();
    config.apply(&cli);

    assert_eq!(config.export.title, "Nightly");
    assert_eq!(config.log.default_level, "error");
}
