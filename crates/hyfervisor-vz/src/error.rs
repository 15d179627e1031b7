//! Error types for hyfervisor-vz.

use std::fmt;

/// Error type for Virtualization.framework operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VZError {
    /// Virtualization (or macOS guest virtualization) is not supported on this system.
    NotSupported,

    /// Invalid configuration parameters.
    InvalidConfiguration(String),

    /// A VM operation failed.
    OperationFailed(String),

    /// Invalid state transition attempted.
    InvalidState {
        /// Expected state(s).
        expected: String,
        /// Actual state.
        actual: String,
    },

    /// A completion handler was dropped without ever being invoked.
    Cancelled(String),

    /// Operation timed out.
    Timeout(String),

    /// File or path not found.
    NotFound(String),

    /// Internal framework error.
    Internal {
        /// Error code from NSError.
        code: i32,
        /// Error message.
        message: String,
    },
}

impl VZError {
    /// Creates an internal error with code `-1`, used for runtime failures
    /// that have no NSError behind them.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: -1,
            message: message.into(),
        }
    }

    /// Creates the error returned when an Objective-C class cannot be found.
    pub fn class_not_found(name: &str) -> Self {
        Self::internal(format!("{name} class not found"))
    }
}

impl fmt::Display for VZError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "Virtualization not supported on this system"),
            Self::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::OperationFailed(msg) => write!(f, "VM operation failed: {msg}"),
            Self::InvalidState { expected, actual } => {
                write!(f, "Invalid state: expected {expected}, got {actual}")
            }
            Self::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
            Self::Timeout(msg) => write!(f, "Timeout: {msg}"),
            Self::NotFound(path) => write!(f, "Not found: {path}"),
            Self::Internal { code, message } => {
                write!(f, "Internal error (code={code}): {message}")
            }
        }
    }
}

impl std::error::Error for VZError {}

/// Result type alias for VZError.
pub type VZResult<T> = Result<T, VZError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = VZError::InvalidState {
            expected: "can_stop=true".into(),
            actual: "state=Stopped".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state: expected can_stop=true, got state=Stopped"
        );

        let err = VZError::Internal {
            code: 10006,
            message: "The storage device attachment is invalid.".into(),
        };
        assert_eq!(
            err.to_string(),
            "Internal error (code=10006): The storage device attachment is invalid."
        );
    }

    #[test]
    fn test_class_not_found() {
        let err = VZError::class_not_found("VZMacOSInstaller");
        assert_eq!(
            err,
            VZError::Internal {
                code: -1,
                message: "VZMacOSInstaller class not found".into(),
            }
        );
    }
}
