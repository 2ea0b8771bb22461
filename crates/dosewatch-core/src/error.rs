//! Unified error types for Dosewatch.

use thiserror::Error;

/// Result type alias using DosewatchError.
pub type Result<T> = std::result::Result<T, DosewatchError>;

#[derive(Error, Debug)]
pub enum DosewatchError {
    // Store errors
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    // Presentation errors
    #[error("Presentation error: {0}")]
    Presentation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Bridge errors
    #[error("Best-effort only: {0}")]
    BestEffortOnly(String),

    // Remote errors
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Remote error: {0}")]
    Remote(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl DosewatchError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    pub fn presentation(msg: impl Into<String>) -> Self {
        Self::Presentation(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DosewatchError::StorageUnavailable("disk gone".into());
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_error_constructors() {
        let e1 = DosewatchError::storage("test");
        assert!(matches!(e1, DosewatchError::StorageUnavailable(_)));

        let e2 = DosewatchError::malformed("test");
        assert!(matches!(e2, DosewatchError::MalformedRecord(_)));

        let e3 = DosewatchError::network("test");
        assert!(matches!(e3, DosewatchError::NetworkUnavailable(_)));

        let e4 = DosewatchError::timeout("test");
        assert!(matches!(e4, DosewatchError::Timeout(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DosewatchError = io_err.into();
        assert!(matches!(err, DosewatchError::Io(_)));
    }
}
