//! Command line and configuration file

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use logvault_core::{LogLevel, SessionId};
use logvault_export::{ExportConfig, ExportFormat, TaskDetail};
use logvault_logging::LogConfig;
use logvault_storage::{LogFilter, StoreConfig};

/// Contents of the optional TOML configuration file
///
/// ```toml
/// [store]
/// base_dir = "/var/lib/logvault"
///
/// [store.blobs]
/// inline_threshold = 16384
///
/// [export]
/// title = "Support bundle"
/// detail = "full"
///
/// [log]
/// default_level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: StoreConfig,
    pub export: ExportConfig,
    pub log: LogConfig,
}

impl CliConfig {
    /// Parse a configuration file's contents
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("invalid configuration")
    }

    /// Load the file at `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml(&contents)
                    .with_context(|| format!("loading {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply command line overrides
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(store) = &cli.store {
            self.store.base_dir = store.clone();
        }
        if cli.verbose {
            self.log = LogConfig {
                filters: std::mem::take(&mut self.log.filters),
                ..LogConfig::development()
            };
        }
        if let Some(level) = &cli.log_level {
            self.log.default_level = level.clone();
        }
        if let Command::Export {
            title,
            detail,
            temp_dir,
            ..
        } = &cli.command
        {
            if let Some(title) = title {
                self.export.title = title.clone();
            }
            if let Some(detail) = detail {
                self.export.detail = *detail;
            }
            if let Some(temp_dir) = temp_dir {
                self.export.temp_root = Some(temp_dir.clone());
            }
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "logvault", version, about = "Inspect logvault stores and export captured logs")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides `store.base_dir`)
    #[arg(long, short = 's', global = true)]
    pub store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Human-readable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show store statistics
    Info,
    /// List capture sessions
    Sessions,
    /// Export a filtered view of the store
    Export {
        /// Output format (text, html, pdf, har, archive, package)
        #[arg(long, short = 'f', value_parser = parse_format)]
        format: ExportFormat,
        /// Restrict to a session (repeatable; all sessions when omitted)
        #[arg(long = "session", value_parser = parse_session)]
        sessions: Vec<SessionId>,
        /// Restrict to a severity level (repeatable; all levels when omitted)
        #[arg(long = "level", value_parser = parse_level, conflicts_with = "min_level")]
        levels: Vec<LogLevel>,
        /// Include this level and everything more severe
        #[arg(long, value_parser = parse_level)]
        min_level: Option<LogLevel>,
        /// Destination file or directory (current directory when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Document title for HTML and PDF
        #[arg(long)]
        title: Option<String>,
        /// Network task detail (sharing, full)
        #[arg(long, value_parser = parse_detail)]
        detail: Option<TaskDetail>,
        /// Parent directory for temporary export files
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },
}

impl Command {
    /// The filter an export command selects
    pub fn filter(&self) -> Option<LogFilter> {
        match self {
            Command::Export {
                sessions,
                levels,
                min_level,
                ..
            } => {
                let filter = LogFilter::sessions(sessions.iter().copied());
                let filter = match (min_level, levels.is_empty()) {
                    (Some(min), _) => filter
                        .with_levels(LogLevel::ALL.into_iter().filter(|level| level >= min)),
                    (None, false) => filter.with_levels(levels.iter().copied()),
                    (None, true) => filter,
                };
                Some(filter)
            }
            _ => None,
        }
    }
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    s.parse().map_err(|e: logvault_export::ExportError| e.to_string())
}

fn parse_session(s: &str) -> Result<SessionId, String> {
    s.parse().map_err(|e: logvault_core::CoreError| e.to_string())
}

fn parse_level(s: &str) -> Result<LogLevel, String> {
    s.parse().map_err(|e: logvault_core::CoreError| e.to_string())
}

fn parse_detail(s: &str) -> Result<TaskDetail, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "sharing" => Ok(TaskDetail::Sharing),
        "full" => Ok(TaskDetail::Full),
        other => Err(format!("unknown detail mode: {other}")),
    }
}
