//! Error types for the export pipeline

use thiserror::Error;

use logvault_storage::StorageError;

/// Errors that can occur while producing an export
#[derive(Debug, Error)]
pub enum ExportError {
    /// A referenced entity or body could not be located
    #[error("Not found: {0}")]
    NotFound(String),

    /// A format encoder could not represent the input
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The caller cancelled the export; no artifact was produced
    #[error("Export cancelled")]
    Cancelled,

    /// No store is bound to the exporter
    #[error("No store available for export")]
    StoreUnavailable,

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("I/O error: {0}")]
    Io(String),

    /// Archive container could not be written or read
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

impl ExportError {
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    /// Whether this outcome means "no artifact" rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<StorageError> for ExportError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(item) => Self::NotFound(item),
            other => Self::Storage(other),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let err: ExportError = StorageError::not_found("blob ab12").into();
        assert!(matches!(err, ExportError::NotFound(ref item) if item == "blob ab12"));

        let err: ExportError = StorageError::compression("bad frame").into();
        assert!(matches!(err, ExportError::Storage(StorageError::Compression(_))));
    }

    #[test]
    fn test_cancelled() {
        assert!(ExportError::Cancelled.is_cancelled());
        assert!(!ExportError::StoreUnavailable.is_cancelled());
    }
}
