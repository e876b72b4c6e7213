//! Progress tracking for reconciliation cycles

use crate::plan::SyncOperation;
use dropsync_types::SyncPath;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Progress information for one cycle
#[derive(Debug, Clone)]
pub struct SyncProgress {
    /// Current cycle ID
    pub cycle_id: Uuid,
    /// Current phase of the cycle
    pub phase: SyncPhase,
    /// Path of the operation in flight
    pub current_path: Option<SyncPath>,
    /// Operations applied so far
    pub operations_done: u64,
    /// Operations planned for the current phase and earlier ones
    pub operations_planned: u64,
    /// Bytes moved in either direction
    pub bytes_transferred: u64,
    /// Start time of the cycle
    pub start_time: Instant,
    /// Number of conflicts encountered
    pub conflicts_count: u64,
    /// Number of reported errors
    pub errors_count: u64,
}

/// Reconciliation phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Cycle created, nothing done yet
    Initializing,
    /// Reading the saved state
    LoadingState,
    /// First-run full download
    Bootstrapping,
    /// Remote-driven phase
    SyncingFromRemote,
    /// Local-driven phase
    SyncingFromLocal,
    /// Writing the new state
    SavingState,
    /// Completed
    Completed,
    /// Failed
    Failed,
}

impl SyncProgress {
    /// Create progress for a new cycle
    pub fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            phase: SyncPhase::Initializing,
            current_path: None,
            operations_done: 0,
            operations_planned: 0,
            bytes_transferred: 0,
            start_time: Instant::now(),
            conflicts_count: 0,
            errors_count: 0,
        }
    }

    /// Update the current phase
    pub fn set_phase(&mut self, phase: SyncPhase) {
        self.phase = phase;
        debug!("Sync phase changed to: {:?}", phase);
    }

    /// Fraction of planned operations applied, as a percentage
    pub fn percent_complete(&self) -> f64 {
        if self.operations_planned > 0 {
            (self.operations_done as f64 / self.operations_planned as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Get elapsed time
    pub fn elapsed_time(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if the cycle has finished
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, SyncPhase::Completed | SyncPhase::Failed)
    }
}

/// Progress event types
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Progress update
    Update(SyncProgress),
    /// Phase changed
    PhaseChanged(SyncPhase),
    /// A phase planned this many operations
    Planned(u64),
    /// An operation is about to run
    OperationStarted(SyncOperation),
    /// An operation finished; bytes moved
    OperationCompleted(SyncOperation, u64),
    /// A local edit is about to be overwritten by a newer remote revision
    ConflictEncountered(SyncPath),
    /// A non-fatal error was reported
    ErrorEncountered(String),
    /// Cycle completed
    Completed(SyncProgress),
    /// Cycle failed
    Failed(String),
}

/// Progress reporter for reconciliation cycles
#[derive(Debug)]
pub struct ProgressReporter {
    progress: Arc<RwLock<SyncProgress>>,
    event_tx: mpsc::UnboundedSender<ProgressEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new(cycle_id: Uuid) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let progress = Arc::new(RwLock::new(SyncProgress::new(cycle_id)));

        Self {
            progress,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// A reporter nobody listens to; events are dropped on send
    pub fn detached() -> Self {
        let mut reporter = Self::new(Uuid::nil());
        reporter.event_rx = None;
        reporter
    }

    /// Get the current progress
    pub async fn get_progress(&self) -> SyncProgress {
        self.progress.read().await.clone()
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressEvent>> {
        self.event_rx.take()
    }

    async fn publish(&self, event: ProgressEvent) {
        let _ = self.event_tx.send(event);
        let progress = self.get_progress().await;
        let _ = self.event_tx.send(ProgressEvent::Update(progress));
    }

    /// Reset counters for a new cycle
    pub async fn begin_cycle(&self, cycle_id: Uuid) {
        *self.progress.write().await = SyncProgress::new(cycle_id);
    }

    /// Update the current phase
    pub async fn set_phase(&self, phase: SyncPhase) {
        self.progress.write().await.set_phase(phase);
        self.publish(ProgressEvent::PhaseChanged(phase)).await;
    }

    /// Add the operation count of a freshly planned phase
    pub async fn planned(&self, count: u64) {
        self.progress.write().await.operations_planned += count;
        self.publish(ProgressEvent::Planned(count)).await;
    }

    /// Report an operation about to run
    pub async fn operation_started(&self, operation: &SyncOperation) {
        self.progress.write().await.current_path = Some(operation.path().clone());
        self.publish(ProgressEvent::OperationStarted(operation.clone()))
            .await;
    }

    /// Report an operation that finished
    pub async fn operation_completed(&self, operation: &SyncOperation, bytes: u64) {
        {
            let mut progress = self.progress.write().await;
            progress.operations_done += 1;
            progress.bytes_transferred += bytes;
            progress.current_path = None;
        }
        self.publish(ProgressEvent::OperationCompleted(operation.clone(), bytes))
            .await;
    }

    /// Report conflict encountered
    pub async fn conflict_encountered(&self, path: SyncPath) {
        self.progress.write().await.conflicts_count += 1;
        self.publish(ProgressEvent::ConflictEncountered(path)).await;
    }

    /// Report error encountered
    pub async fn error_encountered(&self, error: String) {
        self.progress.write().await.errors_count += 1;
        self.publish(ProgressEvent::ErrorEncountered(error)).await;
    }

    /// Report cycle completed
    pub async fn completed(&self) {
        self.progress.write().await.set_phase(SyncPhase::Completed);

        let progress = self.get_progress().await;
        let _ = self.event_tx.send(ProgressEvent::Completed(progress.clone()));
        let _ = self.event_tx.send(ProgressEvent::Update(progress));

        info!("Sync cycle completed");
    }

    /// Report cycle failed
    pub async fn failed(&self, error: String) {
        self.progress.write().await.set_phase(SyncPhase::Failed);
        self.publish(ProgressEvent::Failed(error)).await;
    }
}

impl Clone for ProgressReporter {
    fn clone(&self) -> Self {
        Self {
            progress: Arc::clone(&self.progress),
            event_tx: self.event_tx.clone(),
            event_rx: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_progress_creation() {
        let cycle_id = Uuid::new_v4();
        let progress = SyncProgress::new(cycle_id);

        assert_eq!(progress.cycle_id, cycle_id);
        assert_eq!(progress.phase, SyncPhase::Initializing);
        assert_eq!(progress.operations_done, 0);
        assert_eq!(progress.percent_complete(), 0.0);
    }

    #[tokio::test]
    async fn test_progress_reporter() {
        let mut reporter = ProgressReporter::new(Uuid::new_v4());
        let mut event_rx = reporter.take_event_receiver().unwrap();

        reporter.set_phase(SyncPhase::SyncingFromRemote).await;
        let event = event_rx.recv().await.unwrap();
        assert!(matches!(
            event,
            ProgressEvent::PhaseChanged(SyncPhase::SyncingFromRemote)
        ));
        let event = event_rx.recv().await.unwrap();
        assert!(matches!(event, ProgressEvent::Update(_)));

        reporter.planned(2).await;
        let op = SyncOperation::Upload {
            path: SyncPath::new("a.txt"),
        };
        reporter.operation_started(&op).await;
        reporter.operation_completed(&op, 10).await;

        let progress = reporter.get_progress().await;
        assert_eq!(progress.operations_done, 1);
        assert_eq!(progress.bytes_transferred, 10);
        assert_eq!(progress.percent_complete(), 50.0);
        assert_eq!(progress.current_path, None);
    }

    #[tokio::test]
    async fn test_detached_reporter_still_tracks() {
        let reporter = ProgressReporter::detached();
        reporter.error_encountered("boom".to_string()).await;
        assert_eq!(reporter.get_progress().await.errors_count, 1);
    }
}
