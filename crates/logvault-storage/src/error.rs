//! Error types for logvault-storage
//!
//! This module defines the error types used throughout the storage crate.

use logvault_core::CoreError;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested record or payload was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload exceeds the configured maximum size
    #[error("Storage capacity exceeded: {size} bytes (max {max})")]
    CapacityExceeded { size: u64, max: u64 },

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(String),

    /// Payload compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// A record violates a store invariant
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new Compression error
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression(message.into())
    }

    /// Whether this error means the item is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        StorageError::InvalidRecord(err.to_string())
    }
}

macro_rules! database_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    StorageError::Database(err.to_string())
                }
            }
        )*
    };
}

database_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = StorageError::not_found("blob abcd");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("blob abcd"));
    }

    #[test]
    fn test_capacity_exceeded_error() {
        let err = StorageError::CapacityExceeded { size: 10, max: 5 };
        assert!(err.to_string().contains("max 5"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_core_error_conversion() {
        let err: StorageError = CoreError::InvalidMetrics("gap".into()).into();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
    }
}
