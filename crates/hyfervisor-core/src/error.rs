//! Error types for the core layer.

use hyfervisor_vz::VZError;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Virtualization framework error.
    #[error("virtualization error: {0}")]
    Vz(#[from] VZError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The host cannot do what was asked.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Restore image download failed.
    #[error("download error: {0}")]
    Download(String),

    /// macOS installation failed.
    #[error("install error: {0}")]
    Install(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CoreError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vz_error_conversion() {
        let err: CoreError = VZError::NotSupported.into();
        assert!(matches!(err, CoreError::Vz(VZError::NotSupported)));
        assert!(err.to_string().starts_with("virtualization error"));
    }

    #[test]
    fn test_display() {
        let err = CoreError::AlreadyExists("/tmp/VM.bundle".into());
        assert_eq!(err.to_string(), "already exists: /tmp/VM.bundle");
    }
}
