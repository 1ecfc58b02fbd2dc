//! Process logging setup for logvault binaries
//!
//! A thin builder over `tracing-subscriber`: console output (pretty or JSON
//! lines), optional JSON-lines file output with rotation via
//! `tracing-appender`, and an `EnvFilter` that honours `RUST_LOG`.
//!
//! # Quick Start
//!
//! ```ignore
//! use logvault_logging::{LogConfig, LogvaultSubscriberBuilder};
//!
//! // Keep the guard alive until exit so file output is flushed
//! let _guard = LogvaultSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//!
//! tracing::info!(format = "html", "export started");
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, FilterConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};
use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// A type-erased output layer over the base registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Log file appender error: {0}")]
    Appender(#[from] InitError),

    #[error("Invalid filter directive: {0}")]
    Filter(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Keeps non-blocking writers alive; dropping it flushes pending lines
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

/// Builder for configuring and initializing the logvault logging subscriber
///
/// Defaults to pretty console output at `info`. Use [`LogConfig::production`]
/// for JSON-lines file output.
#[derive(Debug, Clone, Default)]
pub struct LogvaultSubscriberBuilder {
    config: LogConfig,
}

impl LogvaultSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// The level filter: `RUST_LOG` when set, else the configured directives
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.config.directives())
                .map_err(|e| LoggingError::Filter(e.to_string())),
        }
    }

    /// Build the configured output layers without installing them
    pub fn build_layers(&self) -> Result<(Vec<BoxedLayer>, LogGuard), LoggingError> {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guards = Vec::new();

        let console = &self.config.console;
        if console.enabled {
            if console.pretty {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(console.ansi)
                        .with_target(true)
                        .with_file(console.include_location)
                        .with_line_number(console.include_location)
                        .with_writer(io::stderr)
                        .boxed(),
                );
            } else {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .flatten_event(true)
                        .with_file(console.include_location)
                        .with_line_number(console.include_location)
                        .with_writer(io::stderr)
                        .boxed(),
                );
            }
        }

        if let Some(file_config) = &self.config.file {
            let (writer, guard) = file_writer(file_config)?;
            guards.push(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer)
                    .boxed(),
            );
        }

        Ok((layers, LogGuard { _guards: guards }))
    }

    /// Install the subscriber globally
    ///
    /// The returned guard must be kept alive for the duration of the program
    /// when file output is configured.
    pub fn init(self) -> Result<LogGuard, LoggingError> {
        let filter = self.env_filter()?;
        let (layers, guard) = self.build_layers()?;
        Registry::default()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }
}

/// Non-blocking writer for file output; `Never` truncates a single file
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let file = File::create(config.single_file_path())?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}
