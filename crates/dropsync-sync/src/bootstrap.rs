//! First-run full download
//!
//! With no saved state there is nothing to compare against, so nothing can
//! be considered deleted or locally modified. The remote tree is copied down
//! once and every entry is recorded.

use crate::listing::list_remote;
use crate::plan::plan_bootstrap;
use crate::progress::SyncPhase;
use crate::reconciler::Reconciler;
use dropsync_types::{Filesystem, Result, Transport};
use tracing::info;

impl<T: Transport, F: Filesystem> Reconciler<T, F> {
    /// Download the whole remote tree and seed the state from it
    ///
    /// Only creates local folders and downloads files; never deletes and
    /// never uploads.
    pub async fn bootstrap(&mut self) -> Result<()> {
        self.enter_phase(SyncPhase::Bootstrapping).await;
        let listing = list_remote(self.transport(), self.options()).await?;
        info!(
            "Bootstrapping from {} remote files and {} folders",
            listing.files.len(),
            listing.folders.len()
        );
        self.apply_all(plan_bootstrap(&listing)).await
    }
}
