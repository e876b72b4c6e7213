//! Collaborator traits driven by the reconciler
//!
//! The reconciler never talks to the network or the disk directly. It goes
//! through a [`Transport`] for the remote store and a [`Filesystem`] for the
//! local tree, so both can be swapped for in-memory doubles in tests.

use crate::{
    DeleteOutcome, RemoteDirMeta, RemoteEntry, RemoteFileMeta, RemoveOutcome, Result, SyncPath,
    WalkEntry, WriteMode,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Remote object-storage operations
///
/// Paths are root-relative; the implementation maps them onto whatever
/// remote folder it is configured to mirror. Retrying transient failures is
/// the implementation's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Recursively list everything under `path`
    async fn list_folder(&self, path: &SyncPath) -> Result<Vec<RemoteEntry>>;

    /// Download `path` into the native file `local`, replacing it
    async fn download_to_file(&self, path: &SyncPath, local: &Path) -> Result<RemoteFileMeta>;

    /// Upload `contents` to `path`
    async fn upload_file(
        &self,
        contents: Vec<u8>,
        path: &SyncPath,
        mode: WriteMode,
    ) -> Result<RemoteFileMeta>;

    /// Create a folder at `path`
    async fn create_folder(&self, path: &SyncPath) -> Result<RemoteDirMeta>;

    /// Delete the file or folder at `path`
    ///
    /// A path that does not exist is [`DeleteOutcome::AlreadyAbsent`], not an
    /// error. Every other failure is an error.
    async fn delete(&self, path: &SyncPath) -> Result<DeleteOutcome>;
}

/// Local filesystem primitives
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Whether anything exists at `path`
    async fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory
    async fn is_dir(&self, path: &Path) -> bool;

    /// Create `path` and any missing ancestors
    async fn make_dirs(&self, path: &Path) -> Result<()>;

    /// Remove a file
    async fn remove_file(&self, path: &Path) -> Result<RemoveOutcome>;

    /// Remove an empty directory; fails with `DirectoryNotEmpty` otherwise
    async fn remove_dir(&self, path: &Path) -> Result<RemoveOutcome>;

    /// Modification time of `path`
    async fn modified_time(&self, path: &Path) -> Result<SystemTime>;

    /// Read the whole file
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Walk the tree under `root`, one entry per visited directory
    async fn walk(&self, root: &Path) -> Result<Vec<WalkEntry>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn list_folder(&self, path: &SyncPath) -> Result<Vec<RemoteEntry>> {
        (**self).list_folder(path).await
    }

    async fn download_to_file(&self, path: &SyncPath, local: &Path) -> Result<RemoteFileMeta> {
        (**self).download_to_file(path, local).await
    }

    async fn upload_file(
        &self,
        contents: Vec<u8>,
        path: &SyncPath,
        mode: WriteMode,
    ) -> Result<RemoteFileMeta> {
        (**self).upload_file(contents, path, mode).await
    }

    async fn create_folder(&self, path: &SyncPath) -> Result<RemoteDirMeta> {
        (**self).create_folder(path).await
    }

    async fn delete(&self, path: &SyncPath) -> Result<DeleteOutcome> {
        (**self).delete(path).await
    }
}
