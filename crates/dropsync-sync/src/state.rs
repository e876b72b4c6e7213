//! Snapshot state and its persistence
//!
//! [`SyncState`] is the record of what both sides looked like at the last
//! sync point. It is loaded at the start of a cycle, mutated in memory by
//! every successful operation, and written back once at the end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropsync_types::{
    Error, LocalDirMeta, LocalFileMeta, RemoteDirMeta, RemoteFileMeta, Result, SyncPath,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Version of the persisted state layout
pub const STATE_FORMAT_VERSION: u32 = 1;

/// The four snapshot maps
///
/// File maps move in lock-step: every path is in both `local_files` and
/// `remote_files` or in neither. The same holds for the folder maps. A path
/// is never tracked as a file and a folder at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    local_files: BTreeMap<SyncPath, LocalFileMeta>,
    remote_files: BTreeMap<SyncPath, RemoteFileMeta>,
    local_dirs: BTreeMap<SyncPath, LocalDirMeta>,
    remote_dirs: BTreeMap<SyncPath, RemoteDirMeta>,
}

impl SyncState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.local_files.is_empty()
            && self.remote_files.is_empty()
            && self.local_dirs.is_empty()
            && self.remote_dirs.is_empty()
    }

    /// Last-synced local file times
    pub fn local_files(&self) -> &BTreeMap<SyncPath, LocalFileMeta> {
        &self.local_files
    }

    /// Last-synced remote file metadata
    pub fn remote_files(&self) -> &BTreeMap<SyncPath, RemoteFileMeta> {
        &self.remote_files
    }

    /// Known local folders
    pub fn local_dirs(&self) -> &BTreeMap<SyncPath, LocalDirMeta> {
        &self.local_dirs
    }

    /// Known remote folders
    pub fn remote_dirs(&self) -> &BTreeMap<SyncPath, RemoteDirMeta> {
        &self.remote_dirs
    }

    /// Number of tracked files
    pub fn file_count(&self) -> usize {
        self.remote_files.len()
    }

    /// Number of tracked folders
    pub fn dir_count(&self) -> usize {
        self.remote_dirs.len()
    }

    /// Record a file that is now identical on both sides
    pub fn record_file(&mut self, path: SyncPath, local: LocalFileMeta, remote: RemoteFileMeta) {
        self.local_dirs.remove(&path);
        self.remote_dirs.remove(&path);
        self.local_files.insert(path.clone(), local);
        self.remote_files.insert(path, remote);
    }

    /// Stop tracking a file on both sides
    pub fn forget_file(&mut self, path: &SyncPath) {
        self.local_files.remove(path);
        self.remote_files.remove(path);
    }

    /// Record a folder that now exists on both sides
    pub fn record_dir(&mut self, path: SyncPath, local: LocalDirMeta, remote: RemoteDirMeta) {
        self.local_files.remove(&path);
        self.remote_files.remove(&path);
        self.local_dirs.insert(path.clone(), local);
        self.remote_dirs.insert(path, remote);
    }

    /// Stop tracking a folder on both sides
    pub fn forget_dir(&mut self, path: &SyncPath) {
        self.local_dirs.remove(path);
        self.remote_dirs.remove(path);
    }

    /// Check the map invariants
    pub fn validate(&self) -> Result<()> {
        if !self.local_files.keys().eq(self.remote_files.keys()) {
            return Err(Error::state("local and remote file maps are out of step"));
        }
        if !self.local_dirs.keys().eq(self.remote_dirs.keys()) {
            return Err(Error::state("local and remote folder maps are out of step"));
        }
        if let Some(path) = self
            .local_files
            .keys()
            .find(|path| self.local_dirs.contains_key(*path))
        {
            return Err(Error::state(format!(
                "'{path}' is tracked as both a file and a folder"
            )));
        }
        Ok(())
    }
}

/// On-disk wrapper around [`SyncState`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEnvelope {
    /// Layout version, see [`STATE_FORMAT_VERSION`]
    pub format_version: u32,
    /// When the state was written
    pub saved_at: DateTime<Utc>,
    /// The snapshot maps
    pub state: SyncState,
}

impl StateEnvelope {
    /// Wrap a state for writing now
    pub fn new(state: SyncState) -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            saved_at: Utc::now(),
            state,
        }
    }

    /// Encode to the persisted byte form
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::state(format!("Failed to encode state: {e}")))
    }

    /// Decode from the persisted byte form, checking version and invariants
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (envelope, _): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| Error::state(format!("Failed to decode state: {e}")))?;

        if envelope.format_version != STATE_FORMAT_VERSION {
            return Err(Error::state(format!(
                "Unsupported state format version {} (expected {})",
                envelope.format_version, STATE_FORMAT_VERSION
            )));
        }
        envelope.state.validate()?;
        Ok(envelope)
    }
}

/// Durable storage for the snapshot state
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved state; `None` when nothing was ever saved
    async fn load(&self) -> Result<Option<SyncState>>;

    /// Replace the saved state. A failed save leaves the previous one intact.
    async fn save(&self, state: &SyncState) -> Result<()>;
}

/// Snapshot store backed by a single file
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file written before the atomic rename
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the envelope, including when it was saved
    pub async fn load_envelope(&self) -> Result<Option<StateEnvelope>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => StateEnvelope::decode(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_at("read state file", &self.path, &e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        let envelope = self.load_envelope().await?;
        if let Some(envelope) = &envelope {
            debug!(
                "Loaded state saved at {} ({} files, {} folders)",
                envelope.saved_at,
                envelope.state.file_count(),
                envelope.state.dir_count()
            );
        }
        Ok(envelope.map(|envelope| envelope.state))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        let bytes = StateEnvelope::new(state.clone()).encode()?;
        let temp = self.temp_path();

        let write = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(())
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::io_at("write state file", &temp, &e));
        }

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| Error::io_at("replace state file", &self.path, &e))?;

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

/// In-memory snapshot store
///
/// ```rust
/// use dropsync_sync::{MemorySnapshotStore, SnapshotStore, SyncState};
///
/// # tokio_test::block_on(async {
/// let store = MemorySnapshotStore::new();
/// assert!(store.load().await.unwrap().is_none());
///
/// store.save(&SyncState::new()).await.unwrap();
/// assert_eq!(store.save_count(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    state: Mutex<Option<SyncState>>,
    saves: Mutex<u64>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `state`
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// The currently stored state
    pub fn current(&self) -> Option<SyncState> {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// How many times `save` succeeded
    pub fn save_count(&self) -> u64 {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|_| Error::state("snapshot store lock poisoned"))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        let mut slot = self
            .state
            .lock()
            .map_err(|_| Error::state("snapshot store lock poisoned"))?;
        *slot = Some(state.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
