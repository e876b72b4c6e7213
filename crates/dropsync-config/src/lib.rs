//! Configuration management system for dropsync
//!
//! This crate loads the settings a sync run needs from layered sources and
//! reads the bearer token used by the remote transport.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: file names, ignore entries and retry policy are checked
//! - **Environment overrides**: `DROPSYNC__SECTION__KEY` variables win over files
//! - **Defaults**: every option has a default, so no file is required
//!
//! # Examples
//!
//! ```rust,no_run
//! use dropsync_config::{read_token, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("dropsync.yaml")
//!     .add_env_prefix("DROPSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! let token = read_token(&config.token_path()).expect("token file");
//! println!("State file: {}", config.state_path().display());
//! # let _ = token;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use dropsync_types::{RetryConfig, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;
pub mod credentials;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use credentials::{read_token, AccessToken};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Default name of the token file inside the sync directory
pub const DEFAULT_TOKEN_FILE: &str = ".dropbox_token";

/// Default name of the state file inside the sync directory
pub const DEFAULT_STATE_FILE: &str = ".dropbox_state";

/// Suffix of the sibling file a download is written to before it replaces
/// the target
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".dropsync-part";

/// Main configuration structure for dropsync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// What to sync and where state lives
    #[serde(default)]
    pub sync: SyncSettings,
    /// Remote store connection settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Native path of the token file
    pub fn token_path(&self) -> PathBuf {
        self.sync.sync_dir.join(&self.sync.token_file)
    }

    /// Native path of the state file
    pub fn state_path(&self) -> PathBuf {
        self.sync.sync_dir.join(&self.sync.state_file)
    }

    /// Delay between cycles in periodic mode
    pub fn interval(&self) -> Option<Duration> {
        self.sync.interval_secs.map(Duration::from_secs)
    }
}

/// Local side of the synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Directory kept in sync with the remote folder
    pub sync_dir: PathBuf,
    /// Token file name, relative to `sync_dir`
    pub token_file: String,
    /// State file name, relative to `sync_dir`
    pub state_file: String,
    /// Extra root-relative paths excluded on both sides
    pub ignore: Vec<String>,
    /// Seconds between cycles; a single cycle runs when unset
    pub interval_secs: Option<u64>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_dir: PathBuf::from("."),
            token_file: DEFAULT_TOKEN_FILE.to_string(),
            state_file: DEFAULT_STATE_FILE.to_string(),
            ignore: Vec::new(),
            interval_secs: None,
        }
    }
}

/// Remote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL for metadata endpoints
    pub api_url: String,
    /// Base URL for content endpoints
    pub content_url: String,
    /// Remote folder mirrored by the sync directory; empty is the app root
    pub root: String,
    /// Request timeouts
    pub timeouts: TimeoutConfig,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.dropboxapi.com".to_string(),
            content_url: "https://content.dropboxapi.com".to_string(),
            root: String::new(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Optional log file; logs go to stderr when unset
    pub log_file: Option<PathBuf>,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            json_format: false,
            colored_output: true,
        }
    }
}
