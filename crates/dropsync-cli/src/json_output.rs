//! JSON output structures for the dropsync CLI

use dropsync_sync::{CycleReport, CyclePlan, SyncOperation};
use dropsync_types::SyncStats;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete JSON output for a sync cycle
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Whether the cycle was a first-run bootstrap
    pub bootstrap: bool,
    /// Operations applied, in order
    pub operations: Vec<SyncOperation>,
    /// Cycle statistics
    pub stats: SyncStatsJson,
    /// Non-fatal problems reported during the cycle
    pub warnings: Vec<String>,
    /// Overall result
    pub result: OperationResult,
}

/// JSON output for a dry run
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Whether the run would bootstrap
    pub bootstrap: bool,
    /// Remote-driven operations
    pub remote_phase: Vec<SyncOperation>,
    /// Local-driven operations
    pub local_phase: Vec<SyncOperation>,
}

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// dropsync version
    pub version: String,
    /// Operation type
    pub operation: String,
    /// Timestamp when the output was produced
    pub timestamp: String,
    /// Cycle identifier, when a cycle ran
    pub cycle_id: Option<String>,
    /// Local sync directory
    pub sync_dir: String,
}

impl OperationMetadata {
    fn new(operation: &str, sync_dir: &Path, cycle_id: Option<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            operation: operation.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            cycle_id,
            sync_dir: sync_dir.display().to_string(),
        }
    }
}

/// Cycle statistics in JSON format
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncStatsJson {
    /// Files downloaded
    pub files_downloaded: u64,
    /// Bytes downloaded
    pub bytes_downloaded: u64,
    /// Files uploaded
    pub files_uploaded: u64,
    /// Bytes uploaded
    pub bytes_uploaded: u64,
    /// Folders created on either side
    pub folders_created: u64,
    /// Files and folders removed locally
    pub local_removals: u64,
    /// Files and folders deleted remotely
    pub remote_deletions: u64,
    /// Deletions that found nothing to delete
    pub already_absent: u64,
    /// Local edits overwritten by the remote side
    pub conflicts: u64,
    /// Duration in seconds
    pub duration_seconds: f64,
}

impl SyncStatsJson {
    /// Create SyncStatsJson from SyncStats
    pub fn from_stats(stats: &SyncStats) -> Self {
        Self {
            files_downloaded: stats.files_downloaded,
            bytes_downloaded: stats.bytes_downloaded,
            files_uploaded: stats.files_uploaded,
            bytes_uploaded: stats.bytes_uploaded,
            folders_created: stats.local_folders_created + stats.remote_folders_created,
            local_removals: stats.local_files_removed + stats.local_folders_removed,
            remote_deletions: stats.remote_files_deleted + stats.remote_folders_deleted,
            already_absent: stats.already_absent,
            conflicts: stats.conflicts,
            duration_seconds: stats.duration.as_secs_f64(),
        }
    }
}

/// Overall operation result
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the cycle completed
    pub success: bool,
    /// Result message
    pub message: String,
}

impl CycleResultJson {
    /// Create a CycleResultJson from a finished cycle
    pub fn new(report: &CycleReport, sync_dir: &Path) -> Self {
        let message = if report.is_noop() {
            "Already in sync".to_string()
        } else if report.warnings.is_empty() {
            format!("Applied {} operations", report.operations.len())
        } else {
            format!(
                "Applied {} operations with {} warnings",
                report.operations.len(),
                report.warnings.len()
            )
        };

        Self {
            metadata: OperationMetadata::new(
                "sync",
                sync_dir,
                Some(report.cycle_id.to_string()),
            ),
            bootstrap: report.bootstrap,
            operations: report.operations.clone(),
            stats: SyncStatsJson::from_stats(&report.stats),
            warnings: report.warnings.clone(),
            result: OperationResult {
                success: true,
                message,
            },
        }
    }
}

impl PlanJson {
    /// Create a PlanJson from a dry-run plan
    pub fn new(plan: &CyclePlan, sync_dir: &Path) -> Self {
        Self {
            metadata: OperationMetadata::new("plan", sync_dir, None),
            bootstrap: plan.bootstrap,
            remote_phase: plan.remote.clone(),
            local_phase: plan.local.clone(),
        }
    }
}
