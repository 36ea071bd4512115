//! Synapse sync CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load `synapse-sync.toml` (or `--config`), apply
//!    environment secrets and command-line overrides, and validate.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or pretty layer
//!    and, when configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: connect [`notion::NotionClient`] and
//!    [`github::GithubClient`] and inject them into [`worker::Worker`].
//! 4. **Run**: one reconciliation pass, cancelled by Ctrl-C. The
//!    [`reconciler::RunSummary`] is printed to stdout as JSON.

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use github::{GithubClient, GithubConfig};
use notion::{NotionClient, NotionConfig};
use reconciler::{RunLog, RunStatus, SyncError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use worker::{Journal, JsonlRunLog, Worker};

use crate::config::{ConfigError, LogFormat, SyncConfig, WorkerSection};

#[derive(Parser)]
#[command(name = "synapse-sync")]
#[command(about = "Mirror active Notion projects onto GitHub repositories, tracking projects, and issues")]
#[command(version)]
struct Cli {
    /// Configuration file [default: synapse-sync.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides `logging.format`)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass
    Run {
        /// Plan every project without creating or updating anything
        #[arg(long)]
        dry_run: bool,

        /// Number of projects reconciled at the same time
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Verify the Notion and GitHub credentials, then exit
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match SyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            if matches!(cli.command, Commands::Run { .. }) {
                // The configured run log is unknown; fall back to the default path.
                let path = WorkerSection::default().run_log;
                if let Err(log_err) = record_config_failure(&path, &e) {
                    eprintln!("error: failed to open run log {}: {log_err}", path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };
    config.apply_env(|name| std::env::var(name).ok());
    if let Commands::Run {
        dry_run,
        concurrency,
    } = &cli.command
    {
        config.worker.dry_run |= *dry_run;
        if let Some(n) = concurrency {
            config.worker.max_concurrent_projects = *n;
        }
    }

    let format = cli.log_format.unwrap_or(config.logging.format);
    let telemetry = match telemetry::init(format, config.logging.otlp_endpoint.as_deref()) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("error: failed to initialise logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run { .. } => run(config).await,
        Commands::Check => check(config).await,
    };
    let code = match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "synapse-sync failed");
            ExitCode::FAILURE
        }
    };

    telemetry.shutdown();
    code
}

async fn run(config: SyncConfig) -> anyhow::Result<ExitCode> {
    let path = &config.worker.run_log;
    let run_log: Arc<dyn RunLog> = Arc::new(
        JsonlRunLog::open(path)
            .with_context(|| format!("failed to open run log {}", path.display()))?,
    );
    let journal = Journal::new(run_log.clone());

    let (source, target) = match initialise(&config).await {
        Ok(clients) => clients,
        Err(e) => {
            journal.failed("Initialize", e.to_string());
            return Err(e.into());
        }
    };
    journal.success(
        "Initialize",
        format!("connected to Notion and GitHub as {}", target.viewer().login),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let worker = Worker::new(
        Arc::new(source),
        Arc::new(target),
        run_log,
        config.worker(),
    );
    let summary = worker.run(cancel).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(match summary.status {
        RunStatus::Aborted { .. } => ExitCode::FAILURE,
        RunStatus::Completed | RunStatus::CompletedWithFailures => ExitCode::SUCCESS,
    })
}

/// Appends a `FAILED` Initialize record for a configuration that did not load.
fn record_config_failure(path: &Path, error: &ConfigError) -> std::io::Result<()> {
    let run_log = JsonlRunLog::open(path)?;
    Journal::new(Arc::new(run_log)).failed("Initialize", error.to_string());
    Ok(())
}

async fn check(config: SyncConfig) -> anyhow::Result<ExitCode> {
    let (_, target) = initialise(&config).await?;
    info!(login = %target.viewer().login, "credentials verified");
    println!("ok: Notion reachable, GitHub authenticated as {}", target.viewer().login);
    Ok(ExitCode::SUCCESS)
}

/// Validates the configuration and connects both adapters.
async fn initialise(config: &SyncConfig) -> Result<(NotionClient, GithubClient), SyncError> {
    config.validate().map_err(|e| SyncError::Configuration {
        message: e.to_string(),
    })?;
    let notion = connect_notion(config.notion()).await?;
    let github = connect_github(config.github()).await?;
    Ok((notion, github))
}

async fn connect_notion(config: NotionConfig) -> Result<NotionClient, SyncError> {
    NotionClient::connect(config)
        .await
        .map_err(|e| SyncError::Initialization {
            system: "notion".to_owned(),
            message: e.to_string(),
        })
}

async fn connect_github(config: GithubConfig) -> Result<GithubClient, SyncError> {
    GithubClient::connect(config)
        .await
        .map_err(|e| SyncError::Initialization {
            system: "github".to_owned(),
            message: e.to_string(),
        })
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received; finishing in-flight projects");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
    }
}
