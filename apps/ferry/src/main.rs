//! ferry - resumable mirror for a crate registry
//!
//! Walks a registry index and either fetches every missing archive or
//! verifies mirrored archives against the index checksums. Progress is
//! checkpointed, so an interrupted run resumes where it stopped.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{Cli, Commands, RunArgs};
use crate::display::{ModeStatus, OutputRenderer};
use crate::error::CliError;
use clap::Parser;
use ferry_checkpoint::{checkpoint_path, lock_path, CheckpointStore, RunLock};
use ferry_config::constants::DEFAULT_DOWNLOAD_URL;
use ferry_config::Config;
use ferry_events::{EventReceiver, EventSender};
use ferry_index::{shard_path, validate_name, IndexConfig, IndexReader};
use ferry_net::{DownloadUrl, NetClient, NetConfig};
use ferry_pipeline::{FetchRunner, Operation, Orchestrator, PipelineConfig, RunReport};
use ferry_types::SyncMode;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Every unit of work succeeded
const EXIT_OK: i32 = 0;
/// The command could not run
const EXIT_ERROR: i32 = 1;
/// The run finished but some crate versions failed
const EXIT_FAILURES: i32 = 2;
/// Interrupted by the user
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    match run(cli, cancel).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(EXIT_ERROR);
        }
    }
}

/// Main application logic, returning the process exit code
async fn run(cli: Cli, cancel: CancellationToken) -> Result<i32, CliError> {
    let renderer = OutputRenderer::new(cli.global.json);

    // Pure lookups need no configuration
    if let Commands::ShardPath { names } = &cli.command {
        let paths = names
            .iter()
            .map(|name| Ok((name.clone(), shard_path(name)?)))
            .collect::<Result<Vec<_>, CliError>>()?;
        renderer.render_shard_paths(&paths);
        return Ok(EXIT_OK);
    }

    // Configuration precedence: defaults < file < environment < flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.command);

    match cli.command {
        Commands::ShardPath { .. } => Ok(EXIT_OK),
        Commands::Status { .. } => {
            let state_dir = config.state_dir();
            let mut statuses = Vec::new();
            for mode in [SyncMode::Fetch, SyncMode::Verify] {
                let keys = CheckpointStore::read_keys(&checkpoint_path(&state_dir, mode)).await?;
                statuses.push(ModeStatus {
                    mode,
                    completed: keys.len(),
                    locked: lock_path(&state_dir, mode).exists(),
                });
            }
            renderer.render_status(&statuses);
            Ok(EXIT_OK)
        }
        Commands::Fetch(args) => {
            let report = run_pipeline(&config, SyncMode::Fetch, args.run, cancel).await?;
            renderer.render_report(&report)?;
            Ok(exit_code(&report))
        }
        Commands::Verify(args) => {
            let report = run_pipeline(&config, SyncMode::Verify, args.run, cancel).await?;
            renderer.render_report(&report)?;
            Ok(exit_code(&report))
        }
    }
}

/// Set up and drive one fetch or verify run
async fn run_pipeline(
    config: &Config,
    mode: SyncMode,
    args: RunArgs,
    cancel: CancellationToken,
) -> Result<RunReport, CliError> {
    config.validate()?;
    for name in &args.crates {
        validate_name(name).map_err(|e| CliError::InvalidArguments(e.to_string()))?;
    }
    let index = IndexReader::open(config.index_path()?)?;
    let archives = config.archives_path()?;
    let state_dir = config.state_dir();

    info!(
        mode = %mode,
        index = %index.root().display(),
        archives = %archives.display(),
        state_dir = %state_dir.display(),
        "Starting ferry v{}",
        env!("CARGO_PKG_VERSION")
    );

    let lock = RunLock::acquire(&state_dir, mode).await?;
    if let Some(pid) = lock.stale_holder() {
        warn!(
            path = %lock.path().display(),
            pid,
            "Took over a lock left by a run that is no longer running"
        );
    }
    let checkpoint = CheckpointStore::open(checkpoint_path(&state_dir, mode)).await?;
    if checkpoint.discarded_partial() {
        warn!(
            path = %checkpoint.path().display(),
            "Discarded an interrupted checkpoint write"
        );
    }

    let (event_sender, event_receiver) = ferry_events::channel();

    let operation = match mode {
        SyncMode::Fetch => {
            let url = download_url(config, &index)?;
            info!(template = url.template(), "Download source");
            let client = NetClient::new(NetConfig::from_config(&config.network))?;
            let runner = FetchRunner::new(client, url, &archives).with_events(event_sender.clone());
            Operation::Fetch(Arc::new(runner))
        }
        SyncMode::Verify => Operation::Verify {
            archives,
            skip_missing: config.verify.skip_missing,
        },
    };

    let pipeline_config = PipelineConfig {
        crates: args.crates,
        failure_report: args.failures,
        ..PipelineConfig::from_config(config)
    };

    let orchestrator = Orchestrator::new(index, checkpoint, operation, pipeline_config)
        .with_events(event_sender)
        .with_cancellation(cancel);

    execute_with_events(orchestrator, event_receiver).await
}

/// Drive the orchestrator while draining its events into the log
async fn execute_with_events(
    orchestrator: Orchestrator,
    mut event_receiver: EventReceiver,
) -> Result<RunReport, CliError> {
    let mut run = Box::pin(orchestrator.run());

    loop {
        select! {
            result = &mut run => {
                while let Ok(event) = event_receiver.try_recv() {
                    logging::log_event_with_tracing(&event);
                }
                return result.map_err(CliError::from);
            }

            event = event_receiver.recv() => {
                match event {
                    Some(event) => logging::log_event_with_tracing(&event),
                    None => return run.await.map_err(CliError::from),
                }
            }
        }
    }
}

/// Template precedence: config/env/flag, then the index `config.json`, then crates.io
fn download_url(config: &Config, index: &IndexReader) -> Result<DownloadUrl, CliError> {
    if let Some(template) = &config.network.download_url {
        return Ok(DownloadUrl::new(template)?);
    }
    if let Some(index_config) = IndexConfig::load(index.root())? {
        return Ok(DownloadUrl::new(&index_config.dl)?);
    }
    Ok(DownloadUrl::new(DEFAULT_DOWNLOAD_URL)?)
}

fn exit_code(report: &RunReport) -> i32 {
    if report.cancelled {
        EXIT_INTERRUPTED
    } else if report.failed > 0 {
        EXIT_FAILURES
    } else {
        EXIT_OK
    }
}

/// Apply command flags on top of file and environment settings
fn apply_cli_config(config: &mut Config, command: &Commands) {
    let run = match command {
        Commands::Fetch(args) => {
            if let Some(url) = &args.download_url {
                config.network.download_url = Some(url.clone());
            }
            &args.run
        }
        Commands::Verify(args) => {
            if args.skip_missing {
                config.verify.skip_missing = true;
            }
            &args.run
        }
        Commands::Status { state_dir } => {
            if let Some(dir) = state_dir {
                config.paths.state_dir = Some(dir.clone());
            }
            return;
        }
        Commands::ShardPath { .. } => return,
    };

    let set_path = |slot: &mut Option<PathBuf>, value: &Option<PathBuf>| {
        if let Some(path) = value {
            *slot = Some(path.clone());
        }
    };
    set_path(&mut config.paths.index, &run.index);
    set_path(&mut config.paths.archives, &run.archives);
    set_path(&mut config.paths.state_dir, &run.state_dir);

    if let Some(workers) = run.workers {
        config.general.workers = workers;
    }
    if let Some(queue) = run.queue {
        config.general.queue_capacity = queue;
    }
}

/// Initialize tracing/logging
///
/// Logs go to stderr so `--json` results on stdout stay machine-readable.
fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,ferry=debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(debug_enabled)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report(cancelled: bool, failed: u64) -> RunReport {
        RunReport {
            mode: SyncMode::Fetch,
            seen: 0,
            yanked: 0,
            already_done: 0,
            duplicates: 0,
            missing: 0,
            parse_errors: 0,
            enqueued: failed,
            succeeded: 0,
            failed,
            peak_queue: 0,
            aborted_workers: 0,
            cancelled,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&report(false, 0)), EXIT_OK);
        assert_eq!(exit_code(&report(false, 3)), EXIT_FAILURES);
        assert_eq!(exit_code(&report(true, 3)), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::parse_from([
            "ferry",
            "verify",
            "--index",
            "/srv/index",
            "--archives",
            "/srv/crates",
            "--queue",
            "7",
            "--skip-missing",
        ]);
        let mut config = Config::default();
        config.paths.index = Some(PathBuf::from("/elsewhere"));
        apply_cli_config(&mut config, &cli.command);

        assert_eq!(config.paths.index, Some(PathBuf::from("/srv/index")));
        assert_eq!(config.paths.archives, Some(PathBuf::from("/srv/crates")));
        assert_eq!(config.general.queue_capacity, 7);
        assert_eq!(config.general.workers, ferry_config::constants::DEFAULT_WORKERS);
        assert!(config.verify.skip_missing);
    }
}
