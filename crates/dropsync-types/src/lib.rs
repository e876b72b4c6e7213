//! Core type system and error handling for dropsync
//!
//! This crate provides the foundational types, error handling, and collaborator
//! interfaces shared by the dropsync crates. It includes:
//!
//! - **Error handling**: an error taxonomy that separates structural failures,
//!   absorbed outcomes, and transient transport errors
//! - **Path normalization**: [`SyncPath`], the single key type used by every
//!   state map
//! - **Core types**: snapshot metadata for local and remote entries, operation
//!   outcomes, and cycle statistics
//! - **Traits**: the async `Transport` and `Filesystem` collaborators the
//!   reconciler drives (behind the `async` feature)
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `async`: Enable the async collaborator traits
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use dropsync_types::{Result, SyncPath, SyncStats};
//!
//! fn example_operation() -> Result<SyncStats> {
//!     let path = SyncPath::new("docs\\notes.txt");
//!     assert_eq!(path.as_str(), "docs/notes.txt");
//!
//!     let mut stats = SyncStats::new();
//!     stats.files_downloaded = 1;
//!     Ok(stats)
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod path;
pub mod result;
#[cfg(feature = "async")]
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{RetryConfig, TimeoutConfig};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use path::SyncPath;
pub use result::Result;
#[cfg(feature = "async")]
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_stats_creation() {
        let stats = SyncStats::new();
        assert_eq!(stats.files_downloaded, 0);
        assert_eq!(stats.files_uploaded, 0);
        assert_eq!(stats.total_operations(), 0);
    }

    #[test]
    fn test_sync_stats_merge() {
        let mut stats1 = SyncStats::new();
        stats1.files_downloaded = 5;
        stats1.bytes_downloaded = 1000;

        let mut stats2 = SyncStats::new();
        stats2.files_downloaded = 3;
        stats2.remote_files_deleted = 2;

        stats1.merge(&stats2);
        assert_eq!(stats1.files_downloaded, 8);
        assert_eq!(stats1.bytes_downloaded, 1000);
        assert_eq!(stats1.total_operations(), 10);
    }

    #[test]
    fn test_error_severity() {
        let io_error = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let missing_parent = Error::MissingParent {
            path: SyncPath::new("docs"),
        };
        assert_eq!(missing_parent.severity(), ErrorSeverity::Critical);
        assert!(missing_parent.is_fatal());
        assert!(!missing_parent.is_recoverable());
    }
}
