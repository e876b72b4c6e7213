//! Error types and handling for dropsync
//!
//! The reconciler distinguishes three families of failure:
//!
//! - **Structural** errors ([`Error::MissingParent`], [`Error::NotADirectory`],
//!   [`Error::NotAFile`]) mean the tracked state no longer matches the disk.
//!   They halt the cycle instead of guessing a repair.
//! - **Reportable** errors ([`Error::DirectoryNotEmpty`]) are surfaced in the
//!   cycle report but do not abort it.
//! - **Transient** errors ([`Error::Network`], [`Error::Timeout`],
//!   [`Error::RateLimited`], 5xx [`Error::Remote`]) are retried by the
//!   transport and otherwise propagate to the caller.
//!
//! Outcomes that used to be swallowed errors (deleting something that is
//! already gone) are plain values, see [`crate::DeleteOutcome`].

use crate::SyncPath;
use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation should be retried
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - tracked state diverged from reality
    Critical,
}

/// Main error type for dropsync operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path to the file with permission issues
        path: PathBuf,
    },

    /// A download targets a folder that does not exist locally
    #[error("Parent folder does not exist locally: {path}")]
    MissingParent {
        /// The missing parent folder
        path: SyncPath,
    },

    /// A path expected to be a directory is something else
    #[error("Path exists but is not a directory: {path}")]
    NotADirectory {
        /// Offending path
        path: SyncPath,
    },

    /// A path expected to be a file is a directory
    #[error("Path exists but is not a file: {path}")]
    NotAFile {
        /// Offending path
        path: SyncPath,
    },

    /// A folder could not be removed because it still has content
    #[error("Folder is not empty: {path}")]
    DirectoryNotEmpty {
        /// Folder that still has entries
        path: PathBuf,
    },

    /// Network error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// The remote store asked us to slow down
    #[error("Rate limited by remote store")]
    RateLimited {
        /// Seconds the server asked us to wait, when it said
        retry_after: Option<u64>,
    },

    /// Authentication with the remote store failed
    #[error("Authentication failed: {message}")]
    Auth {
        /// Error message from the remote store
        message: String,
    },

    /// The remote store rejected a request
    #[error("Remote error ({status}): {summary}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Error summary returned by the remote store
        summary: String,
    },

    /// Snapshot state could not be read, written, or validated
    #[error("State error: {message}")]
    State {
        /// Error message describing the state issue
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Synchronization error
    #[error("Synchronization error: {message}")]
    Sync {
        /// Error message describing the synchronization issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation timed out
    #[error("Operation timed out after {seconds} seconds")]
    Timeout {
        /// Number of seconds after which the operation timed out
        seconds: u64,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Tracked state diverged from the filesystem
    Structural,
    /// Non-fatal errors that are reported and skipped
    Reportable,
    /// Network and transport errors
    Network,
    /// Authentication errors
    Auth,
    /// Errors returned by the remote store
    Remote,
    /// Snapshot persistence errors
    State,
    /// Configuration errors
    Config,
    /// Synchronization errors
    Sync,
    /// Cancellation
    Cancelled,
    /// Timeout
    Timeout,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorKind::Io
            }
            Self::MissingParent { .. } | Self::NotADirectory { .. } | Self::NotAFile { .. } => {
                ErrorKind::Structural
            }
            Self::DirectoryNotEmpty { .. } => ErrorKind::Reportable,
            Self::Network { .. } | Self::RateLimited { .. } => ErrorKind::Network,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::State { .. } => ErrorKind::State,
            Self::Config { .. } => ErrorKind::Config,
            Self::Sync { .. } => ErrorKind::Sync,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::FileNotFound { .. } | Self::PermissionDenied { .. } => ErrorSeverity::High,
            Self::MissingParent { .. } | Self::NotADirectory { .. } | Self::NotAFile { .. } => {
                ErrorSeverity::Critical
            }
            Self::DirectoryNotEmpty { .. } => ErrorSeverity::Low,
            Self::Network { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => {
                ErrorSeverity::Medium
            }
            Self::Auth { .. } | Self::State { .. } | Self::Config { .. } => ErrorSeverity::High,
            Self::Remote { status, .. } => {
                if *status >= 500 {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
            Self::Sync { .. } | Self::Other { .. } => ErrorSeverity::Medium,
            Self::Cancelled => ErrorSeverity::Low,
        }
    }

    /// Structural errors halt the cycle; the state must not be "repaired"
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }

    /// Errors that are reported in the cycle summary without aborting it
    pub fn is_reportable(&self) -> bool {
        self.kind() == ErrorKind::Reportable
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { message } => {
                // Check if the error message indicates a recoverable condition
                message.contains("Interrupted")
                    || message.contains("WouldBlock")
                    || message.contains("timed out")
                    || message.contains("TimedOut")
            }
            Self::Network { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::MissingParent { .. }
            | Self::NotADirectory { .. }
            | Self::NotAFile { .. }
            | Self::DirectoryNotEmpty { .. }
            | Self::Auth { .. }
            | Self::State { .. }
            | Self::Config { .. }
            | Self::Cancelled => false,
            Self::Sync { .. } | Self::Other { .. } => true,
        }
    }

    /// Check if this error should trigger a retry
    pub fn should_retry(&self) -> bool {
        self.is_recoverable() && self.severity() <= ErrorSeverity::Medium
    }

    /// Create a new I/O error that names the path and the action that failed
    pub fn io_at(action: &str, path: &Path, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                message: format!("Failed to {} '{}': {}", action, path.display(), error),
            },
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a new state error
    pub fn state<S: Into<String>>(message: S) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a new sync error
    pub fn sync<S: Into<String>>(message: S) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    proptest! {
        #[test]
        fn test_error_severity_consistency(
            message in ".*"
        ) {
            let errors = vec![
                Error::Io { message: message.clone() },
                Error::Config { message: message.clone() },
                Error::Network { message: message.clone() },
                Error::Auth { message: message.clone() },
                Error::State { message: message.clone() },
                Error::Sync { message: message.clone() },
                Error::Other { message: message.clone() },
            ];

            for error in errors {
                let kind = error.kind();

                // Only structural errors are fatal
                prop_assert!(!error.is_fatal());

                match error {
                    Error::Io { .. } => prop_assert_eq!(kind, ErrorKind::Io),
                    Error::Config { .. } => prop_assert_eq!(kind, ErrorKind::Config),
                    Error::Network { .. } => prop_assert_eq!(kind, ErrorKind::Network),
                    Error::Auth { .. } => prop_assert_eq!(kind, ErrorKind::Auth),
                    Error::State { .. } => prop_assert_eq!(kind, ErrorKind::State),
                    Error::Sync { .. } => prop_assert_eq!(kind, ErrorKind::Sync),
                    Error::Other { .. } => prop_assert_eq!(kind, ErrorKind::Other),
                    _ => {}
                }
            }
        }

        #[test]
        fn test_error_recoverability_logic(
            message in ".*"
        ) {
            let error = Error::Io { message };

            // If an error should retry, it must be recoverable
            if error.should_retry() {
                prop_assert!(error.is_recoverable());
                prop_assert!(error.severity() <= ErrorSeverity::Medium);
            }
        }

        #[test]
        fn test_timeout_error_properties(
            seconds in 1u64..3600u64
        ) {
            let error = Error::Timeout { seconds };

            prop_assert_eq!(error.kind(), ErrorKind::Timeout);
            prop_assert_eq!(error.severity(), ErrorSeverity::Medium);
            prop_assert!(error.should_retry());
        }
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    }

    #[rstest]
    #[case(Error::MissingParent { path: SyncPath::new("docs") })]
    #[case(Error::NotADirectory { path: SyncPath::new("docs") })]
    #[case(Error::NotAFile { path: SyncPath::new("a.txt") })]
    fn test_structural_errors_are_fatal(#[case] error: Error) {
        assert!(error.is_fatal());
        assert_eq!(error.kind(), ErrorKind::Structural);
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert!(!error.should_retry());
    }

    #[test]
    fn test_directory_not_empty_is_reportable() {
        let error = Error::DirectoryNotEmpty {
            path: PathBuf::from("/sync/photos"),
        };

        assert!(error.is_reportable());
        assert!(!error.is_fatal());
        assert!(!error.should_retry());
        assert!(error.to_string().contains("/sync/photos"));
    }

    #[rstest]
    #[case(Error::network("connection reset"), true)]
    #[case(Error::RateLimited { retry_after: Some(3) }, true)]
    #[case(Error::Remote { status: 503, summary: "unavailable".into() }, true)]
    #[case(Error::Remote { status: 409, summary: "path/conflict".into() }, false)]
    #[case(Error::auth("expired token"), false)]
    fn test_transport_error_retry(#[case] error: Error, #[case] expected: bool) {
        assert_eq!(error.should_retry(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "test file");
        let error = Error::from(io_error);

        assert_eq!(error.kind(), ErrorKind::Io);
        assert_eq!(error.severity(), ErrorSeverity::Medium);
        assert!(error.to_string().contains("test file"));
    }

    #[test]
    fn test_io_at_maps_permission_denied() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let error = Error::io_at("read", Path::new("/protected/file.txt"), &io_error);

        assert!(matches!(error, Error::PermissionDenied { .. }));
        assert!(!error.is_recoverable());

        let io_error = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let error = Error::io_at("write", Path::new("a.txt"), &io_error);
        assert!(error.to_string().contains("Failed to write 'a.txt'"));
    }
}
