//! Remote lister: one flat snapshot of the remote tree per phase

use crate::options::ReconcilerOptions;
use dropsync_types::{RemoteDirMeta, RemoteEntryKind, RemoteFileMeta, Result, SyncPath, Transport};
use std::collections::BTreeMap;
use tracing::debug;

/// Current remote files and folders, keyed by normalized path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    /// Files with their current metadata
    pub files: BTreeMap<SyncPath, RemoteFileMeta>,
    /// Folders, excluding the root
    pub folders: BTreeMap<SyncPath, RemoteDirMeta>,
}

impl RemoteListing {
    /// Create an empty listing
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder helper adding a file
    #[must_use]
    pub fn with_file(mut self, path: impl Into<SyncPath>, meta: RemoteFileMeta) -> Self {
        self.files.insert(path.into(), meta);
        self
    }

    /// Builder helper adding a folder
    #[must_use]
    pub fn with_folder(mut self, path: impl Into<SyncPath>) -> Self {
        self.folders.insert(path.into(), RemoteDirMeta::default());
        self
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.files.len() + self.folders.len()
    }

    /// Whether the listing has no entries
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }
}

/// List the whole remote tree once and partition it into files and folders
///
/// Tombstones, the root itself and excluded paths are dropped.
pub async fn list_remote<T>(transport: &T, options: &ReconcilerOptions) -> Result<RemoteListing>
where
    T: Transport + ?Sized,
{
    let entries = transport.list_folder(&SyncPath::root()).await?;
    let mut listing = RemoteListing::new();

    for entry in entries {
        if entry.path.is_root() || options.is_excluded(&entry.path) {
            continue;
        }
        match entry.kind {
            RemoteEntryKind::File(meta) => {
                listing.files.insert(entry.path, meta);
            }
            RemoteEntryKind::Folder(meta) => {
                listing.folders.insert(entry.path, meta);
            }
            RemoteEntryKind::Deleted => {}
        }
    }

    debug!(
        "Remote listing: {} files, {} folders",
        listing.files.len(),
        listing.folders.len()
    );
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropsync_remote::MemoryTransport;

    #[tokio::test]
    async fn test_partitions_and_excludes() {
        let transport = MemoryTransport::new();
        transport.put_folder("docs");
        transport.put_file("docs/a.txt", b"hello");
        transport.put_file(".dropbox_state", b"shadow");
        transport.put_file("docs/a.txt.dropsync-part", b"hel");
        transport.put_file("b.txt", b"b");

        let listing = list_remote(&transport, &ReconcilerOptions::default())
            .await
            .unwrap();

        assert_eq!(
            listing.files.keys().map(SyncPath::as_str).collect::<Vec<_>>(),
            vec!["b.txt", "docs/a.txt"]
        );
        assert_eq!(
            listing.folders.keys().map(SyncPath::as_str).collect::<Vec<_>>(),
            vec!["docs"]
        );
        assert_eq!(listing.files["docs/a.txt"].size, 5);
    }
}
