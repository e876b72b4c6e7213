//! Configuration builder for layered configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use dropsync_types::SyncPath;
use std::path::{Path, PathBuf};

/// Configuration builder for loading configuration from multiple sources
///
/// Sources are applied in the order they were added, on top of the built-in
/// defaults. Files that do not exist are skipped.
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        let defaults = Config::default();
        let defaults_value = serde_yaml::to_value(&defaults)
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {e}")))?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        tracing::debug!("Loading configuration from {}", path.display());
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator(&self.env_separator)
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Defaults => {}
            }
        }

        let config = self.inner.build()?;
        let result: Config = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Try to build the configuration, returning defaults on error
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }

    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    pub fn validate(config: &Config) -> ConfigResult<()> {
        Self::validate_file_name("sync.token_file", &config.sync.token_file)?;
        Self::validate_file_name("sync.state_file", &config.sync.state_file)?;

        if config.sync.token_file == config.sync.state_file {
            return Err(ConfigError::validation(
                "Token file and state file must have different names",
            ));
        }

        for entry in &config.sync.ignore {
            if SyncPath::new(entry).is_root() {
                return Err(ConfigError::invalid_value(
                    "sync.ignore",
                    format!("'{entry}' would exclude the whole sync root"),
                ));
            }
        }

        if config.sync.interval_secs == Some(0) {
            return Err(ConfigError::invalid_value(
                "sync.interval_secs",
                "interval must be at least one second",
            ));
        }

        let retry = &config.remote.retry;
        if retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::validation(
                "Backoff multiplier must be at least 1.0",
            ));
        }
        if retry.initial_delay > retry.max_delay {
            return Err(ConfigError::validation(
                "Initial retry delay cannot be greater than max delay",
            ));
        }

        for (key, url) in [
            ("remote.api_url", &config.remote.api_url),
            ("remote.content_url", &config.remote.content_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::invalid_value(key, "must be an http(s) URL"));
            }
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }

    fn validate_file_name(key: &str, name: &str) -> ConfigResult<()> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigError::invalid_value(
                key,
                format!("'{name}' must be a plain file name"),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
