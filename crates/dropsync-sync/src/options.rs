//! Reconciler options and path exclusions

use dropsync_config::{
    SyncSettings, DEFAULT_STATE_FILE, DEFAULT_TOKEN_FILE, PARTIAL_DOWNLOAD_SUFFIX,
};
use dropsync_types::SyncPath;
use std::collections::BTreeSet;

/// Paths that never take part in synchronization, on either side
///
/// Excluding a folder excludes everything under it. A suffix excludes every
/// entry whose name ends with it, at any depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    paths: BTreeSet<SyncPath>,
    suffixes: BTreeSet<String>,
}

impl Exclusions {
    /// Create an empty exclusion set
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude `path` and everything under it
    pub fn add(&mut self, path: impl Into<SyncPath>) {
        let path = path.into();
        if !path.is_root() {
            self.paths.insert(path);
        }
    }

    /// Builder form of [`Exclusions::add`]
    #[must_use]
    pub fn with(mut self, path: impl Into<SyncPath>) -> Self {
        self.add(path);
        self
    }

    /// Exclude every entry whose name ends with `suffix`
    pub fn add_suffix(&mut self, suffix: impl Into<String>) {
        let suffix = suffix.into();
        if !suffix.is_empty() {
            self.suffixes.insert(suffix);
        }
    }

    /// Builder form of [`Exclusions::add_suffix`]
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.add_suffix(suffix);
        self
    }

    /// Whether `path` is excluded
    pub fn is_excluded(&self, path: &SyncPath) -> bool {
        if self.paths.iter().any(|excluded| path.starts_with(excluded)) {
            return true;
        }
        // Any segment matching excludes the subtree beneath it
        path.segments()
            .any(|segment| self.suffixes.iter().any(|s| segment.ends_with(s.as_str())))
    }

    /// Iterate over the excluded roots
    pub fn iter(&self) -> impl Iterator<Item = &SyncPath> {
        self.paths.iter()
    }
}

/// Options for the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerOptions {
    /// Paths skipped by both the remote lister and the local walker
    pub exclusions: Exclusions,
}

impl ReconcilerOptions {
    /// Options excluding the given state and token files, and partial downloads
    pub fn new(state_file: &str, token_file: &str) -> Self {
        let exclusions = Exclusions::new()
            .with(state_file)
            .with(format!("{state_file}.tmp"))
            .with(token_file)
            .with_suffix(PARTIAL_DOWNLOAD_SUFFIX);
        Self { exclusions }
    }

    /// Options derived from the `sync` configuration section
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let mut options = Self::new(&settings.state_file, &settings.token_file);
        for entry in &settings.ignore {
            options.exclusions.add(entry.as_str());
        }
        options
    }

    /// Exclude one more path
    #[must_use]
    pub fn exclude(mut self, path: impl Into<SyncPath>) -> Self {
        self.exclusions.add(path);
        self
    }

    /// Whether `path` is excluded
    pub fn is_excluded(&self, path: &SyncPath) -> bool {
        self.exclusions.is_excluded(path)
    }
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE, DEFAULT_TOKEN_FILE)
    }
}
