//! Error types for the operations console.

use thiserror::Error;

/// Errors surfaced by console operations.
///
/// Per-item parse failures inside bulk listings and compiles never reach the
/// caller as a `ConsoleError`; they are collected as
/// [`ItemFailure`](crate::entities::ItemFailure) entries instead.
#[derive(Error, Debug, Clone)]
pub enum ConsoleError {
    // Lookup errors
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // Exclusivity errors
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    // Input errors
    #[error("Malformed input in '{path}': {reason}")]
    Malformed { path: String, reason: String },

    // Storage errors
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("Failed to read file '{path}': {reason}")]
    FileRead { path: String, reason: String },

    #[error("Failed to write file '{path}': {reason}")]
    FileWrite { path: String, reason: String },

    #[error("Alarm state unavailable: {reason}")]
    StateUnavailable { reason: String },

    // Execution errors
    #[error("Execution failed: {reason}")]
    Execution { reason: String },
}

impl ConsoleError {
    /// Shorthand for a [`ConsoleError::NotFound`].
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether this error means the referenced item does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ConsoleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Malformed {
            path: "<yaml>".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            path: "<json>".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ConsoleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StateUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ConsoleError::not_found("Namespace", "billing");
        assert_eq!(err.to_string(), "Namespace 'billing' not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_conflict_display() {
        let err = ConsoleError::Conflict {
            reason: "A run is already in progress".to_string(),
        };
        assert_eq!(err.to_string(), "Conflict: A run is already in progress");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConsoleError = io_err.into();
        assert!(matches!(err, ConsoleError::Storage { .. }));
    }
}
