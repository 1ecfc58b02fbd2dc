//! Export output kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveKind;
use crate::error::ExportError;

/// Output kind requested from the exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[serde(rename = "text", alias = "plaintext")]
    PlainText,
    Html,
    Pdf,
    /// HTTP Archive of the network tasks
    Har,
    /// Filtered store copy with external bodies
    Archive,
    /// Self-contained store copy with every body as a file
    Package,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 6] = [
        ExportFormat::PlainText,
        ExportFormat::Html,
        ExportFormat::Pdf,
        ExportFormat::Har,
        ExportFormat::Archive,
        ExportFormat::Package,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::PlainText => "text",
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Har => "har",
            ExportFormat::Archive => "archive",
            ExportFormat::Package => "package",
        }
    }

    /// File extension of the produced artifact
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::PlainText => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Har => "har",
            ExportFormat::Archive => ArchiveKind::Store.extension(),
            ExportFormat::Package => ArchiveKind::Package.extension(),
        }
    }

    /// Whether the output goes through the renderer
    pub fn is_document(self) -> bool {
        matches!(
            self,
            ExportFormat::PlainText | ExportFormat::Html | ExportFormat::Pdf
        )
    }

    pub fn archive_kind(self) -> Option<ArchiveKind> {
        match self {
            ExportFormat::Archive => Some(ArchiveKind::Store),
            ExportFormat::Package => Some(ArchiveKind::Package),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "txt" | "plaintext" => return Ok(ExportFormat::PlainText),
            "logvault" => return Ok(ExportFormat::Archive),
            "logpkg" => return Ok(ExportFormat::Package),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|format| format.name() == lower)
            .ok_or_else(|| ExportError::encoding(format!("unknown export format: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        for format in ExportFormat::ALL {
            assert_eq!(format.name().parse::<ExportFormat>().unwrap(), format);
        }
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::PlainText);
        assert_eq!("logpkg".parse::<ExportFormat>().unwrap(), ExportFormat::Package);
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_document_formats() {
        assert!(ExportFormat::Html.is_document());
        assert!(!ExportFormat::Har.is_document());
        assert_eq!(ExportFormat::Package.extension(), "logpkg");
        assert_eq!(ExportFormat::Har.archive_kind(), None);
    }

    #[test]
    fn test_serde_uses_command_line_names() {
        for format in ExportFormat::ALL {
            let json = serde_json::to_string(&format).unwrap();
            assert_eq!(json, format!("\"{}\"", format.name()));
            assert_eq!(serde_json::from_str::<ExportFormat>(&json).unwrap(), format);
        }
        assert_eq!(
            serde_json::from_str::<ExportFormat>("\"plaintext\"").unwrap(),
            ExportFormat::PlainText
        );
    }
}
