//! Severity levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Ordinal classification of a log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace = 1,
    Debug = 2,
    Info = 3,
    Notice = 4,
    Warning = 5,
    Error = 6,
    Critical = 7,
}

impl LogLevel {
    /// Every level, lowest severity first
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Notice,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Stored ordinal value
    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Map a stored ordinal back to a level
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.raw() == raw)
    }

    /// Lowercase name, as used in filters and on the command line
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Capitalized name for display
    pub fn title(self) -> &'static str {
        match self {
            LogLevel::Trace => "Trace",
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Notice => "Notice",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Critical => "Critical",
        }
    }

    /// Whether this level represents a failure
    pub fn is_error(self) -> bool {
        self >= LogLevel::Error
    }
}

impl FromStr for LogLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        if let Ok(raw) = lowered.parse::<u8>() {
            return Self::from_raw(raw).ok_or_else(|| CoreError::InvalidLevel(s.to_string()));
        }
        match lowered.as_str() {
            "warn" => Ok(LogLevel::Warning),
            "fatal" => Ok(LogLevel::Critical),
            other => Self::ALL
                .into_iter()
                .find(|level| level.name() == other)
                .ok_or_else(|| CoreError::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
