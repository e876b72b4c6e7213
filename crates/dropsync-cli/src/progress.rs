//! Progress bar driven by reconciler events

use console::style;
use dropsync_sync::{ProgressEvent, SyncPhase};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Renders [`ProgressEvent`]s on a terminal progress bar
pub struct CycleProgressTracker {
    progress_bar: Option<ProgressBar>,
}

impl CycleProgressTracker {
    /// Create a tracker; quiet mode draws nothing
    pub fn new(quiet: bool) -> Self {
        let progress_bar = if quiet {
            None
        } else {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        };

        Self { progress_bar }
    }

    /// Apply one event to the bar
    pub fn handle(&self, event: &ProgressEvent) {
        let Some(pb) = &self.progress_bar else {
            return;
        };

        match event {
            ProgressEvent::PhaseChanged(phase) => {
                // A new cycle in periodic mode reuses the finished bar
                if *phase == SyncPhase::LoadingState {
                    pb.reset();
                    pb.set_length(0);
                    pb.enable_steady_tick(Duration::from_millis(100));
                }
                pb.set_message(phase_label(*phase).to_string());
            }
            ProgressEvent::Planned(count) => pb.inc_length(*count),
            ProgressEvent::OperationStarted(op) => pb.set_message(op.to_string()),
            ProgressEvent::OperationCompleted(..) => pb.inc(1),
            ProgressEvent::ConflictEncountered(path) => pb.suspend(|| {
                println!(
                    "{} {}",
                    style("⚠").yellow().bold(),
                    style(format!("Local edit of {path} replaced by the remote version")).yellow()
                );
            }),
            ProgressEvent::ErrorEncountered(message) => pb.suspend(|| {
                println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
            }),
            ProgressEvent::Completed(_) => pb.finish_and_clear(),
            ProgressEvent::Failed(_) => pb.abandon(),
            ProgressEvent::Update(_) => {}
        }
    }

    /// Consume events until the reconciler drops its sender
    pub fn spawn(self, mut events: UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(&event);
            }
            self.finish_and_clear();
        })
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(pb) = &self.progress_bar {
            pb.finish_and_clear();
        }
    }
}

fn phase_label(phase: SyncPhase) -> &'static str {
    match phase {
        SyncPhase::Initializing => "Starting",
        SyncPhase::LoadingState => "Loading state",
        SyncPhase::Bootstrapping => "Downloading everything",
        SyncPhase::SyncingFromRemote => "Syncing from remote",
        SyncPhase::SyncingFromLocal => "Syncing from local",
        SyncPhase::SavingState => "Saving state",
        SyncPhase::Completed => "Sync complete",
        SyncPhase::Failed => "Sync failed",
    }
}
