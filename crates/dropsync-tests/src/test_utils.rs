//! Shared fixtures for dropsync integration tests
//!
//! [`SyncHarness`] owns a temporary sync directory, an in-memory remote
//! store, and a file-backed snapshot store living inside the sync directory,
//! the same layout the CLI uses.

use dropsync_config::DEFAULT_STATE_FILE;
use dropsync_remote::MemoryTransport;
use dropsync_sync::{
    CyclePlan, CycleReport, FileSnapshotStore, LocalFilesystem, Reconciler, ReconcilerOptions,
    SnapshotStore, SyncState,
};
use dropsync_types::{Result, SyncPath};
use filetime::FileTime;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Reconciler type driven by the harness
pub type TestReconciler = Reconciler<MemoryTransport, LocalFilesystem>;

/// A sync directory wired to an in-memory remote store
pub struct SyncHarness {
    dir: TempDir,
    remote: MemoryTransport,
    store: FileSnapshotStore,
    reconciler: TestReconciler,
}

impl SyncHarness {
    /// Empty sync directory, empty remote store, no saved state
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create sync directory");
        let remote = MemoryTransport::new();
        let store = FileSnapshotStore::new(dir.path().join(DEFAULT_STATE_FILE));
        let reconciler = Self::build_reconciler(dir.path(), &remote);
        Self {
            dir,
            remote,
            store,
            reconciler,
        }
    }

    fn build_reconciler(root: &Path, remote: &MemoryTransport) -> TestReconciler {
        Reconciler::new(
            remote.clone(),
            LocalFilesystem::new(),
            root,
            ReconcilerOptions::default(),
        )
    }

    /// The sync directory
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The in-memory remote store
    pub fn remote(&self) -> &MemoryTransport {
        &self.remote
    }

    /// The file-backed snapshot store
    pub fn store(&self) -> &FileSnapshotStore {
        &self.store
    }

    /// The reconciler
    pub fn reconciler(&self) -> &TestReconciler {
        &self.reconciler
    }

    /// The reconciler's in-memory state
    pub fn state(&self) -> &SyncState {
        self.reconciler.state()
    }

    /// Replace the reconciler with a fresh one, as a new process would
    pub fn restart(&mut self) {
        self.reconciler = Self::build_reconciler(self.dir.path(), &self.remote);
    }

    /// Run one full cycle
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.reconciler.run_cycle(&self.store).await
    }

    /// Plan the next cycle without applying it
    pub async fn plan(&self) -> Result<CyclePlan> {
        self.reconciler.plan(&self.store).await
    }

    /// The state as persisted on disk
    pub async fn saved_state(&self) -> Option<SyncState> {
        self.store.load().await.expect("Failed to load saved state")
    }

    /// Native path of a root-relative path
    pub fn local_path(&self, path: &str) -> PathBuf {
        SyncPath::new(path).to_native(self.dir.path())
    }

    /// Write a local file, creating parent folders
    pub fn write_local(&self, path: &str, contents: &[u8]) -> PathBuf {
        let native = self.local_path(path);
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent folders");
        }
        fs::write(&native, contents).expect("Failed to write local file");
        native
    }

    /// Write a local file and stamp it with a modification time
    pub fn write_local_at(&self, path: &str, contents: &[u8], unix_secs: i64) -> PathBuf {
        let native = self.write_local(path, contents);
        set_mtime(&native, unix_secs);
        native
    }

    /// Create a local folder
    pub fn mkdir_local(&self, path: &str) {
        fs::create_dir_all(self.local_path(path)).expect("Failed to create local folder");
    }

    /// Contents of a local file, if it exists
    pub fn read_local(&self, path: &str) -> Option<Vec<u8>> {
        fs::read(self.local_path(path)).ok()
    }

    /// Remove a local file or folder tree
    pub fn remove_local(&self, path: &str) {
        let native = self.local_path(path);
        if native.is_dir() {
            fs::remove_dir_all(&native).expect("Failed to remove local folder");
        } else {
            fs::remove_file(&native).expect("Failed to remove local file");
        }
    }

    /// Every local file and folder, root-relative, excluding the state file
    pub fn local_tree(&self) -> BTreeSet<String> {
        let mut tree = BTreeSet::new();
        collect(self.dir.path(), self.dir.path(), &mut tree);
        tree.remove(DEFAULT_STATE_FILE);
        tree
    }

    /// Every remote file and folder
    pub fn remote_tree(&self) -> BTreeSet<String> {
        self.remote
            .paths()
            .into_iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(root: &Path, dir: &Path, tree: &mut BTreeSet<String>) {
    let entries = fs::read_dir(dir).expect("Failed to read local folder");
    for entry in entries {
        let path = entry.expect("Failed to read folder entry").path();
        if let Some(relative) = SyncPath::from_native_under(root, &path) {
            tree.insert(relative.as_str().to_string());
        }
        if path.is_dir() {
            collect(root, &path, tree);
        }
    }
}

/// Set a file's modification time to a fixed instant
pub fn set_mtime(path: &Path, unix_secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0))
        .expect("Failed to set modification time");
}

/// A modification time comfortably after anything the clock produces in a test
pub const FUTURE: i64 = 4_000_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_tree_lists_files_and_folders() {
        let harness = SyncHarness::new();
        harness.write_local("docs/a.txt", b"a");
        harness.mkdir_local("empty");

        let tree: Vec<_> = harness.local_tree().into_iter().collect();
        assert_eq!(tree, vec!["docs", "docs/a.txt", "empty"]);
    }

    #[test]
    fn test_write_local_at_sets_mtime() {
        let harness = SyncHarness::new();
        let path = harness.write_local_at("a.txt", b"a", 1_000);
        let meta = fs::metadata(path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_000);
    }
}
