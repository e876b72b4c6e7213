//! Three-way reconciliation engine for dropsync
//!
//! This crate keeps a local directory and a remote folder consistent by
//! comparing three views of the file set: the snapshot saved at the last
//! sync point, the current remote listing, and the current local tree.
//!
//! - **Snapshot Store**: the four state maps and their atomic persistence
//! - **Remote Lister / Local Walker**: flat, normalized listings of each side
//! - **Planner**: a pure three-way diff producing ordered operations
//! - **Reconciler**: applies the remote-driven phase, then the local-driven
//!   phase, updating state only after each operation succeeds
//! - **Bootstrap**: first-run full download when no state exists
//! - **Progress Tracking**: phase and operation events for front ends
//!
//! # Examples
//!
//! ```rust,no_run
//! use dropsync_sync::{FileSnapshotStore, LocalFilesystem, Reconciler, ReconcilerOptions};
//! # use dropsync_types::Transport;
//!
//! # async fn example<T: Transport>(transport: T) -> dropsync_types::Result<()> {
//! let store = FileSnapshotStore::new(".dropbox_state");
//! let mut reconciler = Reconciler::new(
//!     transport,
//!     LocalFilesystem::new(),
//!     ".",
//!     ReconcilerOptions::default(),
//! );
//! let report = reconciler.run_cycle(&store).await?;
//! println!("{} operations applied", report.operations.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod fs;
pub mod listing;
pub mod options;
pub mod plan;
pub mod progress;
pub mod reconciler;
pub mod state;
pub mod walker;

pub use fs::LocalFilesystem;
pub use listing::{list_remote, RemoteListing};
pub use options::{Exclusions, ReconcilerOptions};
pub use plan::{
    plan_bootstrap, plan_cycle, plan_local_phase, plan_remote_phase, CyclePlan, SyncOperation,
};
pub use progress::{ProgressEvent, ProgressReporter, SyncPhase, SyncProgress};
pub use reconciler::{CycleReport, Reconciler};
pub use state::{
    FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StateEnvelope, SyncState,
    STATE_FORMAT_VERSION,
};
pub use walker::{walk_local, LocalListing};
