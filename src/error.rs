//! Error types for browser-pilot
//!
//! This module provides the error type hierarchy using `thiserror`,
//! following the propagation policy of the session core: per-element and
//! per-strategy failures are swallowed where they occur, and only the
//! errors defined here surface to callers.

use thiserror::Error;

/// The main error type for browser-pilot operations
#[derive(Error, Debug)]
pub enum Error {
    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Element reference resolution errors
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Errors raised by the underlying automation driver
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// An operation required a live driver but none exists
    #[error("No active browser session; call ensure_session first")]
    NoActiveSession,

    /// Launching the browser process failed
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Invalid launch configuration
    #[error("Invalid session configuration: {0}")]
    ConfigError(String),
}

/// Element reference resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The reference is not present in the current catalog
    #[error("Unknown element reference '{reference}'; valid references: [{}]", .known.join(", "))]
    RefNotFound {
        /// The reference the caller supplied
        reference: String,
        /// References valid in the current catalog
        known: Vec<String>,
    },

    /// The reference was valid but every fallback strategy failed
    #[error("Could not locate a live element for reference '{reference}' (tag <{tag}>); re-capture the page and retry")]
    ResolutionFailed {
        /// The reference that failed to resolve
        reference: String,
        /// Tag name recorded in the descriptor
        tag: String,
    },

    /// Resolution requires a catalog but none has been captured
    #[error("No page snapshot available; capture one first")]
    NoCatalog,
}

/// Errors raised by the underlying automation driver
#[derive(Error, Debug)]
pub enum DriverError {
    /// A driver command failed
    #[error("Driver operation '{operation}' failed: {message}")]
    OperationFailed {
        /// Name of the failed driver command
        operation: String,
        /// Driver-reported message
        message: String,
    },

    /// A driver command exceeded its time bound
    #[error("Driver operation timed out after {0}ms")]
    Timeout(u64),

    /// The target window handle does not exist
    #[error("Unknown window handle: {0}")]
    UnknownWindow(String),

    /// No alert/dialog is currently open
    #[error("No alert present")]
    NoAlertPresent,
}

impl DriverError {
    /// Create a [`DriverError::OperationFailed`] with context
    pub fn operation(op: &str, message: impl Into<String>) -> Self {
        DriverError::OperationFailed {
            operation: op.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for browser-pilot operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_session_display() {
        let err = Error::Session(SessionError::NoActiveSession);
        assert!(err.to_string().contains("No active browser session"));
    }

    #[test]
    fn test_ref_not_found_lists_known_refs() {
        let err = ResolveError::RefNotFound {
            reference: "e9".to_string(),
            known: vec!["e1".to_string(), "e2".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'e9'"));
        assert!(msg.contains("e1, e2"));
    }

    #[test]
    fn test_resolution_failed_names_tag() {
        let err = ResolveError::ResolutionFailed {
            reference: "e3".to_string(),
            tag: "button".to_string(),
        };
        assert!(err.to_string().contains("<button>"));
        assert!(err.to_string().contains("re-capture"));
    }

    #[test]
    fn test_driver_operation_context() {
        let err = DriverError::operation("navigate", "net::ERR_NAME_NOT_RESOLVED");
        assert!(err.to_string().contains("navigate"));
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[test]
    fn test_generic_error() {
        let err = Error::generic("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
