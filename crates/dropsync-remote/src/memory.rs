//! In-memory remote store
//!
//! [`MemoryTransport`] behaves like the remote API closely enough to drive
//! the reconciler in tests: folders are implicit ancestors of files, every
//! content change gets a fresh revision, deletes are recursive, and missing
//! paths answer with the same 409 summaries the HTTP API uses. Calls are
//! recorded, and failures can be injected per operation.

use async_trait::async_trait;
use chrono::Utc;
use dropsync_types::{
    DeleteOutcome, Error, RemoteDirMeta, RemoteEntry, RemoteFileMeta, Result, SyncPath, Transport,
    WriteMode,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Transport operation kinds, for call logs and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    /// `list_folder`
    List,
    /// `download_to_file`
    Download,
    /// `upload_file`
    Upload,
    /// `create_folder`
    CreateFolder,
    /// `delete`
    Delete,
}

/// One recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    /// Operation kind
    pub op: TransportOp,
    /// Root-relative path the call named
    pub path: SyncPath,
}

#[derive(Debug, Clone)]
enum Node {
    File { contents: Vec<u8>, meta: RemoteFileMeta },
    Folder(RemoteDirMeta),
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<SyncPath, Node>,
    next_rev: u64,
    calls: Vec<TransportCall>,
    failures: Vec<(TransportOp, Error)>,
}

impl Inner {
    /// Create missing ancestor folders; with `replace`, files in the way
    /// become folders instead of failing
    fn ensure_ancestors(&mut self, path: &SyncPath, replace: bool) -> Result<()> {
        let mut ancestors = Vec::new();
        let mut current = path.parent();
        while let Some(parent) = current {
            if parent.is_root() {
                break;
            }
            current = parent.parent();
            ancestors.push(parent);
        }

        for ancestor in ancestors.into_iter().rev() {
            match self.nodes.get(&ancestor) {
                Some(Node::Folder(_)) => {}
                Some(Node::File { .. }) if !replace => {
                    return Err(conflict("path/conflict/file/"))
                }
                _ => {
                    let meta = folder_meta(&ancestor);
                    self.nodes.insert(ancestor, Node::Folder(meta));
                }
            }
        }
        Ok(())
    }

    fn store_file(&mut self, path: SyncPath, contents: Vec<u8>) -> RemoteFileMeta {
        self.next_rev += 1;
        let meta = RemoteFileMeta {
            rev: format!("{:09x}", self.next_rev),
            content_hash: Some(blake3::hash(&contents).to_hex().to_string()),
            size: contents.len() as u64,
            server_modified: Some(Utc::now()),
        };
        self.nodes.insert(
            path,
            Node::File {
                contents,
                meta: meta.clone(),
            },
        );
        meta
    }

    fn remove_subtree(&mut self, path: &SyncPath) -> bool {
        let doomed: Vec<SyncPath> = self
            .nodes
            .keys()
            .filter(|key| key.starts_with(path))
            .cloned()
            .collect();
        for key in &doomed {
            self.nodes.remove(key);
        }
        !doomed.is_empty()
    }

    fn take_failure(&mut self, op: TransportOp) -> Option<Error> {
        let index = self.failures.iter().position(|(kind, _)| *kind == op)?;
        Some(self.failures.remove(index).1)
    }
}

fn folder_meta(path: &SyncPath) -> RemoteDirMeta {
    RemoteDirMeta::with_id(format!("id:{path}"))
}

fn conflict(summary: &str) -> Error {
    Error::Remote {
        status: 409,
        summary: summary.to_string(),
    }
}

/// Shared in-memory remote store; clones see the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and return the injected failure for it, if any
    fn begin(&self, op: TransportOp, path: &SyncPath) -> Result<MutexGuard<'_, Inner>> {
        trace!(?op, %path, "memory transport call");
        let mut inner = self.lock();
        inner.calls.push(TransportCall {
            op,
            path: path.clone(),
        });
        match inner.take_failure(op) {
            Some(err) => Err(err),
            None => Ok(inner),
        }
    }

    /// Store a file, creating missing ancestor folders
    pub fn put_file(&self, path: impl Into<SyncPath>, contents: &[u8]) -> RemoteFileMeta {
        let path = path.into();
        let mut inner = self.lock();
        // Seeding replaces whatever is in the way
        inner.remove_subtree(&path);
        let _ = inner.ensure_ancestors(&path, true);
        inner.store_file(path, contents.to_vec())
    }

    /// Store a folder, creating missing ancestors
    pub fn put_folder(&self, path: impl Into<SyncPath>) -> RemoteDirMeta {
        let path = path.into();
        let mut inner = self.lock();
        let _ = inner.ensure_ancestors(&path, true);
        let meta = folder_meta(&path);
        inner.nodes.insert(path, Node::Folder(meta.clone()));
        meta
    }

    /// Remove a path and everything under it, bypassing the call log
    pub fn remove(&self, path: impl Into<SyncPath>) {
        self.lock().remove_subtree(&path.into());
    }

    /// Contents of a stored file
    pub fn file_contents(&self, path: impl Into<SyncPath>) -> Option<Vec<u8>> {
        match self.lock().nodes.get(&path.into()) {
            Some(Node::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }

    /// Metadata of a stored file
    pub fn file_meta(&self, path: impl Into<SyncPath>) -> Option<RemoteFileMeta> {
        match self.lock().nodes.get(&path.into()) {
            Some(Node::File { meta, .. }) => Some(meta.clone()),
            _ => None,
        }
    }

    /// Whether a folder exists at `path`
    pub fn has_folder(&self, path: impl Into<SyncPath>) -> bool {
        matches!(self.lock().nodes.get(&path.into()), Some(Node::Folder(_)))
    }

    /// All stored paths, files and folders, in order
    pub fn paths(&self) -> Vec<SyncPath> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Calls of one kind
    pub fn calls_of(&self, op: TransportOp) -> Vec<SyncPath> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .map(|call| call.path.clone())
            .collect()
    }

    /// Forget the call log
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Fail the next call of kind `op` with `error`
    pub fn fail_next(&self, op: TransportOp, error: Error) {
        self.lock().failures.push((op, error));
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn list_folder(&self, path: &SyncPath) -> Result<Vec<RemoteEntry>> {
        let inner = self.begin(TransportOp::List, path)?;
        if !path.is_root() && !matches!(inner.nodes.get(path), Some(Node::Folder(_))) {
            return Err(conflict("path/not_found/"));
        }

        Ok(inner
            .nodes
            .iter()
            .filter(|(key, _)| *key != path && key.starts_with(path))
            .map(|(key, node)| match node {
                Node::File { meta, .. } => RemoteEntry::file(key.clone(), meta.clone()),
                Node::Folder(meta) => RemoteEntry::folder(key.clone(), meta.clone()),
            })
            .collect())
    }

    async fn download_to_file(&self, path: &SyncPath, local: &Path) -> Result<RemoteFileMeta> {
        let (contents, meta) = {
            let inner = self.begin(TransportOp::Download, path)?;
            match inner.nodes.get(path) {
                Some(Node::File { contents, meta }) => (contents.clone(), meta.clone()),
                Some(Node::Folder(_)) => return Err(conflict("path/not_file/")),
                None => return Err(conflict("path/not_found/")),
            }
        };

        tokio::fs::write(local, &contents)
            .await
            .map_err(|e| Error::io_at("write", local, &e))?;
        Ok(meta)
    }

    async fn upload_file(
        &self,
        contents: Vec<u8>,
        path: &SyncPath,
        mode: WriteMode,
    ) -> Result<RemoteFileMeta> {
        let mut inner = self.begin(TransportOp::Upload, path)?;
        match inner.nodes.get(path) {
            Some(Node::Folder(_)) => return Err(conflict("path/conflict/folder/")),
            Some(Node::File { .. }) if mode == WriteMode::Add => {
                return Err(conflict("path/conflict/file/"))
            }
            _ => {}
        }
        inner.ensure_ancestors(path, false)?;
        Ok(inner.store_file(path.clone(), contents))
    }

    async fn create_folder(&self, path: &SyncPath) -> Result<RemoteDirMeta> {
        let mut inner = self.begin(TransportOp::CreateFolder, path)?;
        match inner.nodes.get(path) {
            Some(Node::Folder(meta)) => return Ok(meta.clone()),
            Some(Node::File { .. }) => return Err(conflict("path/conflict/file/")),
            None => {}
        }
        inner.ensure_ancestors(path, false)?;
        let meta = folder_meta(path);
        inner.nodes.insert(path.clone(), Node::Folder(meta.clone()));
        Ok(meta)
    }

    async fn delete(&self, path: &SyncPath) -> Result<DeleteOutcome> {
        let mut inner = self.begin(TransportOp::Delete, path)?;
        if inner.remove_subtree(path) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::AlreadyAbsent)
        }
    }
}
