//! dropsync - keep a local directory in sync with a Dropbox folder
//!
//! Each run performs one reconciliation cycle: files changed remotely are
//! downloaded, files changed locally are uploaded, and deletions on either
//! side are propagated. With `--interval` the cycle repeats until
//! interrupted.

mod display;
mod json_output;
mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use display::StatusSummary;
use dropsync_config::{read_token, Config, ConfigLoader, LoggingConfig};
use dropsync_remote::DropboxClient;
use dropsync_sync::{
    CycleReport, FileSnapshotStore, LocalFilesystem, ProgressReporter, Reconciler,
    ReconcilerOptions,
};
use json_output::{CycleResultJson, PlanJson};
use progress::CycleProgressTracker;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

/// dropsync - three-way sync between a local directory and Dropbox
#[derive(Parser)]
#[command(
    name = "dropsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep a local directory in sync with a Dropbox folder",
    long_about = "dropsync reconciles a local directory with a Dropbox folder.\n\
                  It remembers what both sides looked like after the last run,\n\
                  so it can tell new files from deleted ones on either side.\n\
                  When both sides changed the same file, the remote version wins."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory to keep in sync (defaults to the current directory)
    #[arg(long, global = true)]
    sync_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
enum Commands {
    /// Run a sync cycle (the default)
    Sync {
        /// Repeat every N seconds until interrupted
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Show what the next cycle would do without changing anything
    Plan,
    /// Summarize the saved state
    Status,
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Write the default configuration to this file
        #[arg(long, value_name = "FILE")]
        init: Option<PathBuf>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Sync { interval: None }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(sync_dir) = &cli.sync_dir {
        config.sync.sync_dir = sync_dir.clone();
    }

    let _log_guard = init_logging(&cli, &config.logging)?;

    info!("dropsync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command.clone().unwrap_or_default() {
        Commands::Sync { interval } => {
            let interval = interval.map(Duration::from_secs).or_else(|| config.interval());
            sync_command(&config, interval, cli.json, cli.quiet).await?;
        }
        Commands::Plan => plan_command(&config, cli.json).await?,
        Commands::Status => status_command(&config, cli.json).await?,
        Commands::Config { default, init } => config_command(&config, default, init)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };
    Ok(config)
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (result, guard) = match &logging.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file must name a file: {}", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let builder = builder.with_writer(writer).with_ansi(false);
            let result = if logging.json_format {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            (result, Some(guard))
        }
        None => {
            let builder = builder
                .with_writer(std::io::stderr)
                .with_ansi(logging.colored_output);
            let result = if logging.json_format {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            (result, None)
        }
    };

    result.map_err(|e| anyhow::anyhow!(e))?;
    Ok(guard)
}

fn connect(config: &Config) -> Result<DropboxClient> {
    let token_path = config.token_path();
    let token = read_token(&token_path).with_context(|| {
        format!(
            "Please create {} with the application token in it",
            token_path.display()
        )
    })?;
    Ok(DropboxClient::new(token, &config.remote)?)
}

fn reconciler(
    config: &Config,
    transport: DropboxClient,
) -> Reconciler<DropboxClient, LocalFilesystem> {
    Reconciler::new(
        transport,
        LocalFilesystem::new(),
        config.sync.sync_dir.clone(),
        ReconcilerOptions::from_settings(&config.sync),
    )
}

async fn sync_command(
    config: &Config,
    interval: Option<Duration>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let transport = connect(config)?;
    let store = FileSnapshotStore::new(config.state_path());

    let show_progress = !quiet && !json;
    if show_progress {
        display::display_banner(&config.sync.sync_dir.display().to_string());
    }

    let (reporter, progress_task) = if show_progress {
        let mut reporter = ProgressReporter::new(Uuid::nil());
        let task = reporter
            .take_event_receiver()
            .map(|events| CycleProgressTracker::new(false).spawn(events));
        (reporter, task)
    } else {
        (ProgressReporter::detached(), None)
    };

    let mut reconciler = reconciler(config, transport).with_progress(reporter);

    loop {
        match reconciler.run_cycle(&store).await {
            Ok(report) => print_report(&report, config, json, quiet)?,
            Err(e) if interval.is_some() && e.should_retry() => {
                warn!("Sync cycle failed, retrying at the next interval: {e}");
                if !json {
                    display::display_error(&format!("Sync failed: {e}"));
                }
            }
            Err(e) => return Err(e).context("Sync failed"),
        }

        let Some(interval) = interval else {
            break;
        };
        info!("Next cycle in {}s", interval.as_secs());
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    drop(reconciler);
    if let Some(task) = progress_task {
        let _ = task.await;
    }
    Ok(())
}

fn print_report(report: &CycleReport, config: &Config, json: bool, quiet: bool) -> Result<()> {
    if json {
        let output = CycleResultJson::new(report, &config.sync.sync_dir);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        display::display_cycle_report(report);
    }
    Ok(())
}

async fn plan_command(config: &Config, json: bool) -> Result<()> {
    let transport = connect(config)?;
    let store = FileSnapshotStore::new(config.state_path());
    let plan = reconciler(config, transport)
        .plan(&store)
        .await
        .context("Planning failed")?;

    if json {
        let output = PlanJson::new(&plan, &config.sync.sync_dir);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        display::display_plan(&plan);
    }
    Ok(())
}

async fn status_command(config: &Config, json: bool) -> Result<()> {
    let store = FileSnapshotStore::new(config.state_path());
    let envelope = store
        .load_envelope()
        .await
        .context("Failed to read the state file")?;

    let status = match &envelope {
        Some(envelope) => StatusSummary {
            state_file: store.path().display().to_string(),
            saved_at: Some(envelope.saved_at.to_rfc3339()),
            files: envelope.state.file_count(),
            folders: envelope.state.dir_count(),
            tracked_bytes: envelope.state.remote_files().values().map(|m| m.size).sum(),
        },
        None => StatusSummary {
            state_file: store.path().display().to_string(),
            saved_at: None,
            files: 0,
            folders: 0,
            tracked_bytes: 0,
        },
    };

    if json {
        let output = serde_json::json!({
            "state_file": status.state_file,
            "saved_at": status.saved_at,
            "files": status.files,
            "folders": status.folders,
            "tracked_bytes": status.tracked_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        display::display_status(&status);
    }
    Ok(())
}

fn config_command(config: &Config, default: bool, init: Option<PathBuf>) -> Result<()> {
    if let Some(path) = init {
        ConfigLoader::generate_default_config(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        display::display_success(&format!("Wrote default configuration to {}", path.display()));
        return Ok(());
    }

    let (title, shown) = if default {
        ("Default configuration:", Config::default())
    } else {
        ("Current configuration:", config.clone())
    };
    println!("{} {}", style("⚙").blue().bold(), title);
    print!("{}", serde_yaml::to_string(&shown)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments_runs_one_sync() {
        let cli = Cli::try_parse_from(["dropsync"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Commands::Sync { interval: None });
        assert!(!cli.json);
    }

    #[rstest]
    #[case(&["dropsync", "sync", "--interval", "30"], Commands::Sync { interval: Some(30) })]
    #[case(&["dropsync", "plan"], Commands::Plan)]
    #[case(&["dropsync", "status", "--json"], Commands::Status)]
    #[case(&["dropsync", "config", "--default"], Commands::Config { default: true, init: None })]
    fn test_subcommands(#[case] args: &[&str], #[case] expected: Commands) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.command, Some(expected));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["dropsync", "--sync-dir", "/data", "-q", "plan"]).unwrap();
        assert_eq!(cli.sync_dir, Some(PathBuf::from("/data")));
        assert!(cli.quiet);
    }

    #[tokio::test]
    async fn test_missing_token_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.sync.sync_dir = dir.path().to_path_buf();

        let err = sync_command(&config, None, true, true).await.unwrap_err();
        assert!(err.to_string().contains(".dropbox_token"));
    }

    #[tokio::test]
    async fn test_status_without_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.sync.sync_dir = dir.path().to_path_buf();

        status_command(&config, true).await.unwrap();
    }
}
