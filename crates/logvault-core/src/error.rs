//! Error types for Logvault core types

use thiserror::Error;

/// Errors raised while parsing or validating core values
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    #[error("Invalid transaction metrics: {0}")]
    InvalidMetrics(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidLevel("loud".to_string());
        assert!(err.to_string().contains("Invalid log level"));
        assert!(err.to_string().contains("loud"));

        let err = CoreError::InvalidMetrics("gap at 2".to_string());
        assert!(err.to_string().contains("gap at 2"));
    }
}
