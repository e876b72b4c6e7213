//! Three-way diff: snapshot state against the current listings
//!
//! Planning is pure. Each phase compares one current listing with the state
//! and returns the operations that bring the other side in line, in the
//! order they must be applied:
//!
//! 1. folder creations, shallowest first
//! 2. file transfers, in path order
//! 3. file deletions, in path order
//! 4. folder deletions, deepest first
//!
//! When a path changed kind (a file became a folder or the reverse), the
//! deletions at and under it move to the front, in the same relative order,
//! so the old entry is gone before the new one is created.

use crate::listing::RemoteListing;
use crate::state::SyncState;
use crate::walker::LocalListing;
use dropsync_types::{RemoteDirMeta, RemoteFileMeta, SyncPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One mutating step of a reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOperation {
    /// Fetch a remote file into the local tree
    Download {
        /// File path
        path: SyncPath,
        /// Remote metadata from the listing
        remote: RemoteFileMeta,
    },
    /// Push a local file to the remote store, overwriting
    Upload {
        /// File path
        path: SyncPath,
    },
    /// Create a folder in the local tree
    CreateLocalFolder {
        /// Folder path
        path: SyncPath,
        /// Remote metadata from the listing
        remote: RemoteDirMeta,
    },
    /// Create a folder in the remote store
    CreateRemoteFolder {
        /// Folder path
        path: SyncPath,
    },
    /// Remove a local file that vanished remotely
    RemoveLocalFile {
        /// File path
        path: SyncPath,
    },
    /// Remove a local folder that vanished remotely
    RemoveLocalFolder {
        /// Folder path
        path: SyncPath,
    },
    /// Delete a remote file that vanished locally
    DeleteRemoteFile {
        /// File path
        path: SyncPath,
    },
    /// Delete a remote folder that vanished locally
    DeleteRemoteFolder {
        /// Folder path
        path: SyncPath,
    },
}

impl SyncOperation {
    /// The path this operation acts on
    pub fn path(&self) -> &SyncPath {
        match self {
            Self::Download { path, .. }
            | Self::Upload { path }
            | Self::CreateLocalFolder { path, .. }
            | Self::CreateRemoteFolder { path }
            | Self::RemoveLocalFile { path }
            | Self::RemoveLocalFolder { path }
            | Self::DeleteRemoteFile { path }
            | Self::DeleteRemoteFolder { path } => path,
        }
    }

    /// Whether file content moves over the wire
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Upload { .. })
    }

    /// Whether the operation removes something
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            Self::RemoveLocalFile { .. }
                | Self::RemoveLocalFolder { .. }
                | Self::DeleteRemoteFile { .. }
                | Self::DeleteRemoteFolder { .. }
        )
    }

    fn rank(&self) -> u8 {
        match self {
            Self::CreateLocalFolder { .. } | Self::CreateRemoteFolder { .. } => 0,
            Self::Download { .. } | Self::Upload { .. } => 1,
            Self::RemoveLocalFile { .. } | Self::DeleteRemoteFile { .. } => 2,
            Self::RemoveLocalFolder { .. } | Self::DeleteRemoteFolder { .. } => 3,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download { path, .. } => write!(f, "Downloading: {path}"),
            Self::Upload { path } => write!(f, "Uploading: {path}"),
            Self::CreateLocalFolder { path, .. } => write!(f, "Creating local folder: {path}"),
            Self::CreateRemoteFolder { path } => write!(f, "Creating remote folder: {path}"),
            Self::RemoveLocalFile { path } => write!(f, "Removing local file: {path}"),
            Self::RemoveLocalFolder { path } => write!(f, "Removing local folder: {path}"),
            Self::DeleteRemoteFile { path } => write!(f, "Deleting remote file: {path}"),
            Self::DeleteRemoteFolder { path } => write!(f, "Deleting remote folder: {path}"),
        }
    }
}

/// Both phases of a cycle, planned without touching either side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePlan {
    /// No state existed, so this is a first-run full download
    pub bootstrap: bool,
    /// Operations of the remote-driven phase (or the bootstrap)
    pub remote: Vec<SyncOperation>,
    /// Operations of the local-driven phase
    pub local: Vec<SyncOperation>,
}

impl CyclePlan {
    /// All operations in application order
    pub fn operations(&self) -> impl Iterator<Item = &SyncOperation> {
        self.remote.iter().chain(self.local.iter())
    }

    /// Number of planned operations
    pub fn len(&self) -> usize {
        self.remote.len() + self.local.len()
    }

    /// Whether the cycle would change nothing
    pub fn is_empty(&self) -> bool {
        self.remote.is_empty() && self.local.is_empty()
    }
}

fn order(ops: Vec<SyncOperation>) -> Vec<SyncOperation> {
    let created: BTreeSet<SyncPath> = ops
        .iter()
        .filter(|op| !op.is_deletion())
        .map(|op| op.path().clone())
        .collect();
    let clears_the_way = |op: &SyncOperation| {
        op.is_deletion()
            && std::iter::successors(Some(op.path().clone()), SyncPath::parent)
                .any(|p| created.contains(&p))
    };

    let (mut first, mut rest): (Vec<_>, Vec<_>) = ops.into_iter().partition(clears_the_way);
    sort_by_rank(&mut first);
    sort_by_rank(&mut rest);
    first.append(&mut rest);
    first
}

fn sort_by_rank(ops: &mut [SyncOperation]) {
    ops.sort_by(|a, b| {
        a.rank().cmp(&b.rank()).then_with(|| match a.rank() {
            0 => a
                .path()
                .depth()
                .cmp(&b.path().depth())
                .then_with(|| a.path().cmp(b.path())),
            3 => b
                .path()
                .depth()
                .cmp(&a.path().depth())
                .then_with(|| a.path().cmp(b.path())),
            _ => a.path().cmp(b.path()),
        })
    });
}

/// Plan the remote-driven phase
///
/// `ignore` is a path this process uploaded earlier in the same cycle. It is
/// neither downloaded nor treated as deleted.
pub fn plan_remote_phase(
    state: &SyncState,
    remote: &RemoteListing,
    ignore: Option<&SyncPath>,
) -> Vec<SyncOperation> {
    let ignored = |path: &SyncPath| ignore.is_some_and(|i| i == path);
    let mut ops = Vec::new();

    for (path, meta) in &remote.files {
        if ignored(path) {
            continue;
        }
        let changed = state
            .remote_files()
            .get(path)
            .is_none_or(|known| meta.differs_from(known));
        if changed {
            ops.push(SyncOperation::Download {
                path: path.clone(),
                remote: meta.clone(),
            });
        }
    }

    for (path, meta) in &remote.folders {
        if ignored(path) || state.remote_dirs().contains_key(path) {
            continue;
        }
        ops.push(SyncOperation::CreateLocalFolder {
            path: path.clone(),
            remote: meta.clone(),
        });
    }

    for path in state.remote_files().keys() {
        if !remote.files.contains_key(path) && !ignored(path) {
            ops.push(SyncOperation::RemoveLocalFile { path: path.clone() });
        }
    }

    for path in state.remote_dirs().keys() {
        if !remote.folders.contains_key(path) && !ignored(path) {
            ops.push(SyncOperation::RemoveLocalFolder { path: path.clone() });
        }
    }

    order(ops)
}

/// Plan the local-driven phase
pub fn plan_local_phase(state: &SyncState, local: &LocalListing) -> Vec<SyncOperation> {
    let mut ops = Vec::new();

    for path in local.folders.keys() {
        if !state.local_dirs().contains_key(path) {
            ops.push(SyncOperation::CreateRemoteFolder { path: path.clone() });
        }
    }

    for (path, modified) in &local.files {
        let changed = state
            .local_files()
            .get(path)
            .is_none_or(|known| known.is_modified_since(*modified));
        if changed {
            ops.push(SyncOperation::Upload { path: path.clone() });
        }
    }

    for path in state.local_files().keys() {
        if !local.files.contains_key(path) {
            ops.push(SyncOperation::DeleteRemoteFile { path: path.clone() });
        }
    }

    for path in state.local_dirs().keys() {
        if !local.folders.contains_key(path) {
            ops.push(SyncOperation::DeleteRemoteFolder { path: path.clone() });
        }
    }

    order(ops)
}

/// Plan a first-run full download: every folder, then every file
pub fn plan_bootstrap(remote: &RemoteListing) -> Vec<SyncOperation> {
    let folders = remote
        .folders
        .iter()
        .map(|(path, meta)| SyncOperation::CreateLocalFolder {
            path: path.clone(),
            remote: meta.clone(),
        });
    let files = remote
        .files
        .iter()
        .map(|(path, meta)| SyncOperation::Download {
            path: path.clone(),
            remote: meta.clone(),
        });
    order(folders.chain(files).collect())
}

/// Plan a whole cycle as a dry run
///
/// Paths the remote phase would touch are left out of the local phase,
/// matching what applying the remote phase first would leave behind.
pub fn plan_cycle(state: &SyncState, remote: &RemoteListing, local: &LocalListing) -> CyclePlan {
    let remote_ops = plan_remote_phase(state, remote, None);
    let touched: BTreeSet<&SyncPath> = remote_ops.iter().map(SyncOperation::path).collect();
    let local_ops = plan_local_phase(state, local)
        .into_iter()
        .filter(|op| !touched.contains(op.path()))
        .collect();

    CyclePlan {
        bootstrap: false,
        remote: remote_ops,
        local: local_ops,
    }
}
