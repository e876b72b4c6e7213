//! Core data types for dropsync
//!
//! Snapshot metadata for the four state maps, the flat entries produced by
//! listing and walking, operation outcomes, and cycle statistics.

use crate::SyncPath;
use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Local file snapshot: the modification time at the last sync point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalFileMeta {
    /// On-disk modification time right after the file was last synced
    pub modified: SystemTime,
}

impl LocalFileMeta {
    /// Create a new local file snapshot
    pub fn new(modified: SystemTime) -> Self {
        Self { modified }
    }

    /// Whether `current` is strictly newer than the recorded time
    pub fn is_modified_since(&self, current: SystemTime) -> bool {
        current > self.modified
    }
}

/// Remote file snapshot as returned by the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteFileMeta {
    /// Opaque revision; changes whenever the content changes
    pub rev: String,
    /// Content identifier, when the store provides one
    pub content_hash: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Server-side modification time
    pub server_modified: Option<DateTime<Utc>>,
}

impl RemoteFileMeta {
    /// Create a snapshot with only a revision
    pub fn with_rev(rev: impl Into<String>) -> Self {
        Self {
            rev: rev.into(),
            content_hash: None,
            size: 0,
            server_modified: None,
        }
    }

    /// Whether the remote content changed relative to `previous`
    pub fn differs_from(&self, previous: &Self) -> bool {
        self.rev != previous.rev
    }
}

/// Local folder snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalDirMeta {
    /// Folder modification time when it was recorded
    pub modified: SystemTime,
}

impl LocalDirMeta {
    /// Create a new local folder snapshot
    pub fn new(modified: SystemTime) -> Self {
        Self { modified }
    }
}

/// Remote folder snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteDirMeta {
    /// Remote identifier, when the store provides one
    pub id: Option<String>,
}

impl RemoteDirMeta {
    /// Create a folder snapshot with an identifier
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// What a remote listing entry describes
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RemoteEntryKind {
    /// A file with its current metadata
    File(RemoteFileMeta),
    /// A folder
    Folder(RemoteDirMeta),
    /// A tombstone reported by the store
    Deleted,
}

/// One entry of a recursive remote listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteEntry {
    /// Root-relative normalized path
    pub path: SyncPath,
    /// Entry kind and metadata
    pub kind: RemoteEntryKind,
}

impl RemoteEntry {
    /// A file entry
    pub fn file(path: impl Into<SyncPath>, meta: RemoteFileMeta) -> Self {
        Self {
            path: path.into(),
            kind: RemoteEntryKind::File(meta),
        }
    }

    /// A folder entry
    pub fn folder(path: impl Into<SyncPath>, meta: RemoteDirMeta) -> Self {
        Self {
            path: path.into(),
            kind: RemoteEntryKind::Folder(meta),
        }
    }

    /// A deleted entry
    pub fn deleted(path: impl Into<SyncPath>) -> Self {
        Self {
            path: path.into(),
            kind: RemoteEntryKind::Deleted,
        }
    }
}

/// Upload write mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WriteMode {
    /// Fail if something already exists at the path
    Add,
    /// Replace whatever exists at the path
    #[default]
    Overwrite,
}

/// Result of a remote delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeleteOutcome {
    /// The object existed and was deleted
    Deleted,
    /// Nothing existed at the path
    AlreadyAbsent,
}

/// Result of a local removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RemoveOutcome {
    /// The entry existed and was removed
    Removed,
    /// Nothing existed at the path
    AlreadyAbsent,
}

/// One directory visited by a filesystem walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Native path of the visited directory
    pub dir: PathBuf,
    /// Names of its immediate subdirectories
    pub subdirs: Vec<String>,
    /// Names of its immediate files
    pub files: Vec<String>,
}

/// Statistics for one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncStats {
    /// Files downloaded from the remote store
    pub files_downloaded: u64,
    /// Bytes downloaded
    pub bytes_downloaded: u64,
    /// Files uploaded to the remote store
    pub files_uploaded: u64,
    /// Bytes uploaded
    pub bytes_uploaded: u64,
    /// Local folders created
    pub local_folders_created: u64,
    /// Remote folders created
    pub remote_folders_created: u64,
    /// Local files removed because they vanished remotely
    pub local_files_removed: u64,
    /// Local folders removed because they vanished remotely
    pub local_folders_removed: u64,
    /// Remote files deleted because they vanished locally
    pub remote_files_deleted: u64,
    /// Remote folders deleted because they vanished locally
    pub remote_folders_deleted: u64,
    /// Deletions that found nothing to delete
    pub already_absent: u64,
    /// Local edits overwritten by a newer remote revision
    pub conflicts: u64,
    /// Non-fatal errors reported during the cycle
    pub warnings: u64,
    /// Total duration of the cycle
    pub duration: Duration,
}

impl SyncStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating operations performed
    pub fn total_operations(&self) -> u64 {
        self.files_downloaded
            + self.files_uploaded
            + self.local_folders_created
            + self.remote_folders_created
            + self.local_files_removed
            + self.local_folders_removed
            + self.remote_files_deleted
            + self.remote_folders_deleted
    }

    /// Whether the cycle changed nothing on either side
    pub fn is_noop(&self) -> bool {
        self.total_operations() == 0
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &Self) {
        self.files_downloaded += other.files_downloaded;
        self.bytes_downloaded += other.bytes_downloaded;
        self.files_uploaded += other.files_uploaded;
        self.bytes_uploaded += other.bytes_uploaded;
        self.local_folders_created += other.local_folders_created;
        self.remote_folders_created += other.remote_folders_created;
        self.local_files_removed += other.local_files_removed;
        self.local_folders_removed += other.local_folders_removed;
        self.remote_files_deleted += other.remote_files_deleted;
        self.remote_folders_deleted += other.remote_folders_deleted;
        self.already_absent += other.already_absent;
        self.conflicts += other.conflicts;
        self.warnings += other.warnings;
        self.duration += other.duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_meta_strictly_newer() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let meta = LocalFileMeta::new(base);

        assert!(!meta.is_modified_since(base));
        assert!(!meta.is_modified_since(base - Duration::from_secs(1)));
        assert!(meta.is_modified_since(base + Duration::from_millis(1)));
    }

    #[test]
    fn test_remote_meta_revision_change() {
        let r1 = RemoteFileMeta::with_rev("r1");
        let r2 = RemoteFileMeta::with_rev("r2");
        let r1_again = RemoteFileMeta {
            size: 42,
            ..RemoteFileMeta::with_rev("r1")
        };

        assert!(r2.differs_from(&r1));
        assert!(!r1_again.differs_from(&r1));
    }

    #[test]
    fn test_is_noop_ignores_counters_that_are_not_operations() {
        let stats = SyncStats {
            already_absent: 2,
            warnings: 1,
            ..SyncStats::default()
        };
        assert!(stats.is_noop());
    }
}
