//! Local walker: a flat snapshot of the local tree under the sync root

use crate::options::ReconcilerOptions;
use dropsync_types::{Filesystem, Result, SyncPath};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Current local files and folders with their modification times
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalListing {
    /// Files and their on-disk modification times
    pub files: BTreeMap<SyncPath, SystemTime>,
    /// Folders, excluding the root, and their modification times
    pub folders: BTreeMap<SyncPath, SystemTime>,
}

impl LocalListing {
    /// Create an empty listing
    pub fn new() -> Self {
        Self::default()
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

/// Walk the tree under `root` and normalize every path
pub async fn walk_local<F>(fs: &F, root: &Path, options: &ReconcilerOptions) -> Result<LocalListing>
where
    F: Filesystem + ?Sized,
{
    let mut listing = LocalListing::new();

    for entry in fs.walk(root).await? {
        let Some(dir) = SyncPath::from_native_under(root, &entry.dir) else {
            continue;
        };
        if options.is_excluded(&dir) {
            continue;
        }

        for name in &entry.subdirs {
            let path = dir.join(name);
            if options.is_excluded(&path) {
                continue;
            }
            let modified = fs.modified_time(&entry.dir.join(name)).await?;
            listing.folders.insert(path, modified);
        }

        for name in &entry.files {
            let path = dir.join(name);
            if options.is_excluded(&path) {
                continue;
            }
            let modified = fs.modified_time(&entry.dir.join(name)).await?;
            listing.files.insert(path, modified);
        }
    }

    debug!(
        "Local walk: {} files, {} folders",
        listing.files.len(),
        listing.folders.len()
    );
    Ok(listing)
}
