//! The reconciler: applies planned operations and keeps the state in step
//!
//! A cycle is strictly sequential. The remote-driven phase runs to
//! completion, including its state updates, before the local-driven phase
//! walks the tree. Running the remote phase first is what makes the remote
//! side win when a file changed on both sides: the re-download resets the
//! recorded modification time, so the local phase sees nothing to upload.
//!
//! State is only updated after an operation succeeded. An error aborts the
//! cycle before the state is saved, so the next cycle starts again from the
//! last saved snapshot.

use crate::listing::{list_remote, RemoteListing};
use crate::options::ReconcilerOptions;
use crate::plan::{
    plan_bootstrap, plan_cycle, plan_local_phase, plan_remote_phase, CyclePlan, SyncOperation,
};
use crate::progress::{ProgressReporter, SyncPhase};
use crate::state::{SnapshotStore, SyncState};
use crate::walker::{walk_local, LocalListing};
use dropsync_types::{
    DeleteOutcome, Error, Filesystem, LocalDirMeta, LocalFileMeta, RemoteDirMeta, RemoveOutcome,
    Result, SyncPath, SyncStats, Transport, WriteMode,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Unique cycle identifier
    pub cycle_id: Uuid,
    /// Whether this cycle was the first-run full download
    pub bootstrap: bool,
    /// Operations applied, in order
    pub operations: Vec<SyncOperation>,
    /// Counters
    pub stats: SyncStats,
    /// Non-fatal errors reported during the cycle
    pub warnings: Vec<String>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl CycleReport {
    /// Whether the cycle changed nothing on either side
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Drives reconciliation between a local tree and a remote store
pub struct Reconciler<T: Transport, F: Filesystem> {
    transport: T,
    fs: F,
    root: PathBuf,
    options: ReconcilerOptions,
    state: SyncState,
    ignore_path: Option<SyncPath>,
    progress: ProgressReporter,
    stats: SyncStats,
    warnings: Vec<String>,
    applied: Vec<SyncOperation>,
}

impl<T: Transport, F: Filesystem> Reconciler<T, F> {
    /// Create a reconciler for the tree under `root`, starting from an
    /// empty state
    pub fn new(transport: T, fs: F, root: impl Into<PathBuf>, options: ReconcilerOptions) -> Self {
        Self {
            transport,
            fs,
            root: root.into(),
            options,
            state: SyncState::new(),
            ignore_path: None,
            progress: ProgressReporter::detached(),
            stats: SyncStats::new(),
            warnings: Vec::new(),
            applied: Vec::new(),
        }
    }

    /// Replace the in-memory state
    #[must_use]
    pub fn with_state(mut self, state: SyncState) -> Self {
        self.state = state;
        self
    }

    /// Report progress through `reporter`
    #[must_use]
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.progress = reporter;
        self
    }

    /// The in-memory state
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Take the in-memory state
    pub fn into_state(self) -> SyncState {
        self.state
    }

    /// The sync root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path uploaded last by this reconciler, skipped by the remote phase
    pub fn ignore_path(&self) -> Option<&SyncPath> {
        self.ignore_path.as_ref()
    }

    /// Counters accumulated since the last cycle started
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Non-fatal errors reported since the last cycle started
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Operations applied since the last cycle started
    pub fn applied(&self) -> &[SyncOperation] {
        &self.applied
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The reconciler options
    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    pub(crate) async fn enter_phase(&self, phase: SyncPhase) {
        self.progress.set_phase(phase).await;
    }

    fn native(&self, path: &SyncPath) -> PathBuf {
        path.to_native(&self.root)
    }

    /// Run one full cycle against `store`
    ///
    /// Loads the saved state, bootstraps when there is none, otherwise runs
    /// the remote phase then the local phase, and saves. On error nothing is
    /// saved.
    pub async fn run_cycle<S>(&mut self, store: &S) -> Result<CycleReport>
    where
        S: SnapshotStore + ?Sized,
    {
        let cycle_id = Uuid::new_v4();
        let start = Instant::now();
        self.stats = SyncStats::new();
        self.warnings.clear();
        self.applied.clear();
        self.ignore_path = None;
        self.progress.begin_cycle(cycle_id).await;

        info!(%cycle_id, root = %self.root.display(), "Starting sync cycle");

        match self.run_phases(store).await {
            Ok(bootstrap) => {
                self.stats.duration = start.elapsed();
                self.progress.completed().await;
                info!(
                    %cycle_id,
                    operations = self.applied.len(),
                    warnings = self.warnings.len(),
                    "Sync cycle finished in {:.2?}",
                    self.stats.duration
                );
                Ok(CycleReport {
                    cycle_id,
                    bootstrap,
                    operations: self.applied.clone(),
                    stats: self.stats.clone(),
                    warnings: self.warnings.clone(),
                    duration: self.stats.duration,
                })
            }
            Err(e) => {
                error!(%cycle_id, "Sync cycle aborted: {e}");
                self.progress.failed(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run_phases<S>(&mut self, store: &S) -> Result<bool>
    where
        S: SnapshotStore + ?Sized,
    {
        self.progress.set_phase(SyncPhase::LoadingState).await;
        let bootstrap = match store.load().await? {
            Some(state) => {
                self.state = state;
                self.sync_from_remote().await?;
                self.sync_from_local().await?;
                false
            }
            None => {
                info!("No saved state found, downloading everything");
                self.state = SyncState::new();
                self.bootstrap().await?;
                true
            }
        };

        self.progress.set_phase(SyncPhase::SavingState).await;
        store.save(&self.state).await?;
        Ok(bootstrap)
    }

    /// Plan a cycle against `store` without changing anything
    pub async fn plan<S>(&self, store: &S) -> Result<CyclePlan>
    where
        S: SnapshotStore + ?Sized,
    {
        let remote = list_remote(&self.transport, &self.options).await?;
        match store.load().await? {
            Some(state) => {
                let local = walk_local(&self.fs, &self.root, &self.options).await?;
                Ok(plan_cycle(&state, &remote, &local))
            }
            None => Ok(CyclePlan {
                bootstrap: true,
                remote: plan_bootstrap(&remote),
                local: Vec::new(),
            }),
        }
    }

    /// Bring the local tree in line with the remote store
    pub async fn sync_from_remote(&mut self) -> Result<()> {
        self.enter_phase(SyncPhase::SyncingFromRemote).await;
        let listing: RemoteListing = list_remote(&self.transport, &self.options).await?;
        let ops = plan_remote_phase(&self.state, &listing, self.ignore_path.as_ref());
        debug!("Remote phase planned {} operations", ops.len());
        self.apply_all(ops).await
    }

    /// Push local changes to the remote store
    pub async fn sync_from_local(&mut self) -> Result<()> {
        self.enter_phase(SyncPhase::SyncingFromLocal).await;
        let listing: LocalListing = walk_local(&self.fs, &self.root, &self.options).await?;
        let ops = plan_local_phase(&self.state, &listing);
        debug!("Local phase planned {} operations", ops.len());
        self.apply_all(ops).await
    }

    pub(crate) async fn apply_all(&mut self, ops: Vec<SyncOperation>) -> Result<()> {
        self.progress.planned(ops.len() as u64).await;
        for op in ops {
            info!("{op}");
            self.progress.operation_started(&op).await;
            let bytes = self.apply(&op).await?;
            self.progress.operation_completed(&op, bytes).await;
            self.applied.push(op);
        }
        Ok(())
    }

    async fn apply(&mut self, op: &SyncOperation) -> Result<u64> {
        match op {
            SyncOperation::Download { path, .. } => self.download(path).await,
            SyncOperation::Upload { path } => self.upload(path).await,
            SyncOperation::CreateLocalFolder { path, remote } => {
                self.create_local_folder(path, remote.clone()).await?;
                Ok(0)
            }
            SyncOperation::CreateRemoteFolder { path } => {
                self.create_remote_folder(path).await?;
                Ok(0)
            }
            SyncOperation::RemoveLocalFile { path } => {
                self.remove_local_file(path).await?;
                Ok(0)
            }
            SyncOperation::RemoveLocalFolder { path } => {
                self.remove_local_folder(path).await?;
                Ok(0)
            }
            SyncOperation::DeleteRemoteFile { path } => {
                let outcome = self.transport.delete(path).await?;
                self.count_remote_delete(outcome, false);
                self.state.forget_file(path);
                Ok(0)
            }
            SyncOperation::DeleteRemoteFolder { path } => {
                let outcome = self.transport.delete(path).await?;
                self.count_remote_delete(outcome, true);
                self.state.forget_dir(path);
                Ok(0)
            }
        }
    }

    async fn download(&mut self, path: &SyncPath) -> Result<u64> {
        let local = self.native(path);

        if let Some(parent) = path.parent().filter(|p| !p.is_root()) {
            let parent_native = self.native(&parent);
            if !self.fs.exists(&parent_native).await {
                return Err(Error::MissingParent { path: parent });
            }
            if !self.fs.is_dir(&parent_native).await {
                return Err(Error::NotADirectory { path: parent });
            }
        }
        if self.fs.is_dir(&local).await {
            return Err(Error::NotAFile { path: path.clone() });
        }

        if let Some(known) = self.state.local_files().get(path).copied() {
            if self.fs.exists(&local).await {
                let current = self.fs.modified_time(&local).await?;
                if known.is_modified_since(current) {
                    warn!("Local edits to {path} are overwritten by a newer remote revision");
                    self.stats.conflicts += 1;
                    self.progress.conflict_encountered(path.clone()).await;
                }
            }
        }

        let meta = self.transport.download_to_file(path, &local).await?;
        let modified = self.fs.modified_time(&local).await?;
        let size = meta.size;
        self.state
            .record_file(path.clone(), LocalFileMeta::new(modified), meta);

        self.stats.files_downloaded += 1;
        self.stats.bytes_downloaded += size;
        Ok(size)
    }

    async fn upload(&mut self, path: &SyncPath) -> Result<u64> {
        let local = self.native(path);
        let modified = self.fs.modified_time(&local).await?;
        let contents = self.fs.read(&local).await?;
        let size = contents.len() as u64;

        let meta = self
            .transport
            .upload_file(contents, path, WriteMode::Overwrite)
            .await?;
        self.state
            .record_file(path.clone(), LocalFileMeta::new(modified), meta);
        self.ignore_path = Some(path.clone());

        self.stats.files_uploaded += 1;
        self.stats.bytes_uploaded += size;
        Ok(size)
    }

    async fn create_local_folder(&mut self, path: &SyncPath, remote: RemoteDirMeta) -> Result<()> {
        let local = self.native(path);
        if self.fs.exists(&local).await {
            if !self.fs.is_dir(&local).await {
                return Err(Error::NotADirectory { path: path.clone() });
            }
            debug!("Local folder {path} already exists");
        } else {
            self.fs.make_dirs(&local).await?;
        }

        let modified = self.fs.modified_time(&local).await?;
        self.state
            .record_dir(path.clone(), LocalDirMeta::new(modified), remote);
        self.stats.local_folders_created += 1;
        Ok(())
    }

    async fn create_remote_folder(&mut self, path: &SyncPath) -> Result<()> {
        let local = self.native(path);
        let remote = self.transport.create_folder(path).await?;
        let modified = self.fs.modified_time(&local).await?;
        self.state
            .record_dir(path.clone(), LocalDirMeta::new(modified), remote);
        self.stats.remote_folders_created += 1;
        Ok(())
    }

    async fn remove_local_file(&mut self, path: &SyncPath) -> Result<()> {
        let local = self.native(path);
        if self.fs.is_dir(&local).await {
            return Err(Error::NotAFile { path: path.clone() });
        }

        match self.fs.remove_file(&local).await? {
            RemoveOutcome::Removed => self.stats.local_files_removed += 1,
            RemoveOutcome::AlreadyAbsent => {
                debug!("Local file {path} was already gone");
                self.stats.already_absent += 1;
            }
        }
        self.state.forget_file(path);
        Ok(())
    }

    async fn remove_local_folder(&mut self, path: &SyncPath) -> Result<()> {
        let local = self.native(path);
        if self.fs.exists(&local).await && !self.fs.is_dir(&local).await {
            return Err(Error::NotADirectory { path: path.clone() });
        }

        match self.fs.remove_dir(&local).await {
            Ok(RemoveOutcome::Removed) => self.stats.local_folders_removed += 1,
            Ok(RemoveOutcome::AlreadyAbsent) => self.stats.already_absent += 1,
            Err(e) if e.is_reportable() => {
                debug!("{e}");
                let message = format!("Local folder {path} is not empty");
                warn!("{message}; keeping its remaining content");
                self.stats.warnings += 1;
                self.progress.error_encountered(message.clone()).await;
                self.warnings.push(message);
            }
            Err(e) => return Err(e),
        }
        self.state.forget_dir(path);
        Ok(())
    }

    fn count_remote_delete(&mut self, outcome: DeleteOutcome, folder: bool) {
        match (outcome, folder) {
            (DeleteOutcome::Deleted, false) => self.stats.remote_files_deleted += 1,
            (DeleteOutcome::Deleted, true) => self.stats.remote_folders_deleted += 1,
            (DeleteOutcome::AlreadyAbsent, _) => self.stats.already_absent += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFilesystem;
    use crate::state::MemorySnapshotStore;
    use dropsync_remote::{MemoryTransport, TransportOp};
    use dropsync_types::RemoteFileMeta;
    use filetime::FileTime;
    use std::time::SystemTime;
    use tempfile::TempDir;

    type TestReconciler = Reconciler<MemoryTransport, LocalFilesystem>;

    fn reconciler(dir: &TempDir, transport: &MemoryTransport) -> TestReconciler {
        Reconciler::new(
            transport.clone(),
            LocalFilesystem::new(),
            dir.path(),
            ReconcilerOptions::default(),
        )
    }

    fn set_mtime(path: &Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[tokio::test]
    async fn test_download_requires_parent_folder() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();
        transport.put_file("docs/a.txt", b"a");

        // The folder is tracked, so it is not recreated, but it is gone locally
        let mut state = SyncState::new();
        state.record_dir(
            SyncPath::new("docs"),
            LocalDirMeta::new(SystemTime::UNIX_EPOCH),
            RemoteDirMeta::default(),
        );
        let mut reconciler = reconciler(&dir, &transport).with_state(state);

        let err = reconciler.sync_from_remote().await.unwrap_err();
        assert!(matches!(err, Error::MissingParent { ref path } if path.as_str() == "docs"));
        assert!(err.is_fatal());
        assert!(!reconciler.state().remote_files().contains_key("docs/a.txt"));
    }

    #[tokio::test]
    async fn test_create_local_folder_over_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("docs"), b"not a folder").unwrap();
        let transport = MemoryTransport::new();
        transport.put_folder("docs");

        let mut reconciler = reconciler(&dir, &transport);
        let err = reconciler.sync_from_remote().await.unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn test_existing_local_folder_is_adopted() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();
        let store = MemorySnapshotStore::new();

        let mut reconciler = reconciler(&dir, &transport);
        reconciler.run_cycle(&store).await.unwrap();

        // An untracked local folder with content meets a new remote folder of the same name
        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        std::fs::write(docs.join("keep.txt"), b"keep").unwrap();
        transport.put_folder("docs");

        let report = reconciler.run_cycle(&store).await.unwrap();
        assert_eq!(report.operations[0].to_string(), "Creating local folder: docs");
        assert_eq!(std::fs::read(docs.join("keep.txt")).unwrap(), b"keep");
        assert!(reconciler.state().local_dirs().contains_key("docs"));
        assert!(reconciler.state().remote_dirs().contains_key("docs"));
        assert_eq!(transport.file_contents("docs/keep.txt").unwrap(), b"keep");
        assert!(transport.calls_of(TransportOp::CreateFolder).is_empty());

        let report = reconciler.run_cycle(&store).await.unwrap();
        assert!(report.is_noop(), "unexpected operations: {:?}", report.operations);
    }

    #[tokio::test]
    async fn test_upload_sets_ignore_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("new.txt"), b"fresh").unwrap();
        let transport = MemoryTransport::new();

        let mut reconciler = reconciler(&dir, &transport);
        reconciler.sync_from_local().await.unwrap();

        assert_eq!(reconciler.ignore_path(), Some(&SyncPath::new("new.txt")));
        assert_eq!(transport.file_contents("new.txt").unwrap(), b"fresh");
        assert_eq!(reconciler.stats().files_uploaded, 1);
        assert_eq!(reconciler.stats().bytes_uploaded, 5);

        // The remote store changes the just-uploaded path behind our back;
        // the remote phase leaves it alone
        transport.put_file("new.txt", b"other");
        transport.clear_calls();
        reconciler.sync_from_remote().await.unwrap();
        assert!(!transport
            .calls()
            .iter()
            .any(|call| call.op == TransportOp::Download));
        assert_eq!(std::fs::read(dir.path().join("new.txt")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_conflict_is_counted_and_remote_wins() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();
        transport.put_file("a.txt", b"v1");
        let store = MemorySnapshotStore::new();

        let mut reconciler = reconciler(&dir, &transport);
        reconciler.run_cycle(&store).await.unwrap();

        let local = dir.path().join("a.txt");
        std::fs::write(&local, b"local edit").unwrap();
        set_mtime(&local, 4_000_000_000);
        transport.put_file("a.txt", b"remote edit");

        let report = reconciler.run_cycle(&store).await.unwrap();
        assert_eq!(report.stats.conflicts, 1);
        assert_eq!(report.stats.files_downloaded, 1);
        assert_eq!(report.stats.files_uploaded, 0);
        assert_eq!(std::fs::read(&local).unwrap(), b"remote edit");
    }

    #[tokio::test]
    async fn test_non_empty_folder_is_reported_and_content_kept() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();
        transport.put_folder("docs");
        let store = MemorySnapshotStore::new();

        let mut reconciler = reconciler(&dir, &transport);
        reconciler.run_cycle(&store).await.unwrap();

        // Untracked local content appears while the folder is deleted remotely
        std::fs::write(dir.path().join("docs").join("draft.txt"), b"draft").unwrap();
        transport.remove("docs");

        let report = reconciler.run_cycle(&store).await.unwrap();
        assert_eq!(report.warnings, vec!["Local folder docs is not empty".to_string()]);
        assert_eq!(report.stats.warnings, 1);
        assert!(dir.path().join("docs").join("draft.txt").exists());

        // The local phase pushed the surviving content back up
        assert!(transport.has_folder("docs"));
        assert_eq!(transport.file_contents("docs/draft.txt").unwrap(), b"draft");
        store.current().unwrap().validate().unwrap();
    }

    #[tokio::test]
    async fn test_remove_local_file_already_gone_is_absorbed() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();

        let mut state = SyncState::new();
        state.record_file(
            SyncPath::new("gone.txt"),
            LocalFileMeta::new(SystemTime::UNIX_EPOCH),
            RemoteFileMeta::with_rev("r1"),
        );
        let mut reconciler = reconciler(&dir, &transport).with_state(state);

        reconciler.sync_from_remote().await.unwrap();
        assert_eq!(reconciler.stats().already_absent, 1);
        assert!(reconciler.state().is_empty());
    }

    #[tokio::test]
    async fn test_failed_operation_leaves_state_and_store_untouched() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();
        transport.put_file("a.txt", b"a");
        let store = MemorySnapshotStore::new();

        let mut reconciler = reconciler(&dir, &transport);
        reconciler.run_cycle(&store).await.unwrap();
        let saved = store.current().unwrap();

        transport.put_file("b.txt", b"b");
        transport.fail_next(TransportOp::Download, Error::network("connection reset"));

        let err = reconciler.run_cycle(&store).await.unwrap_err();
        assert!(err.should_retry());
        assert!(!reconciler.state().remote_files().contains_key("b.txt"));
        assert_eq!(store.current().unwrap(), saved);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_plan_does_not_touch_anything() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new();
        transport.put_file("a.txt", b"a");
        let store = MemorySnapshotStore::new();

        let reconciler = reconciler(&dir, &transport);
        let plan = reconciler.plan(&store).await.unwrap();

        assert!(plan.bootstrap);
        assert_eq!(plan.len(), 1);
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(store.current(), None);
    }
}
