//! wavforge: safe batch normalization of WAV corpora.

mod inputs;
mod metrics;
mod report;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavforge_core::{
    load_config, load_config_from_env, resolve_config_path, validate_config, Config,
    FfmpegTranscoder, SafetyLedger, TranscodeOrchestrator, Transcoder,
};

use inputs::expand_inputs;
use report::{
    alarm_banner, batch_exit_status, probe_exit_status, write_batch_report, write_probe_summary,
    write_recovery_report, EXIT_FAILURES, EXIT_OK,
};

#[derive(Parser)]
#[command(name = "wavforge")]
#[command(about = "Convert WAV corpora to one canonical PCM encoding, safely", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: $WAVFORGE_CONFIG, then ./wavforge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show format, duration and classification of each file
    Probe {
        /// Files, or directories whose *.wav files are probed
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Convert every non-canonical file in place
    Convert(ConvertArgs),

    /// Put back originals from backups left by an interrupted run
    Restore {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg runs and the backup directory is writable
    Check,
}

#[derive(Args)]
struct ConvertArgs {
    /// Files, or directories whose *.wav files are converted
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Probe and classify only; change nothing
    #[arg(long)]
    dry_run: bool,

    /// Number of files converted at once
    #[arg(short, long)]
    workers: Option<usize>,

    /// Convert one file first and stop if it fails
    #[arg(long)]
    trial_first: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::from(EXIT_FAILURES)
        }
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "debug,wavforge_core=debug"
    } else {
        "info,wavforge_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = load(cli.config.as_deref())?;
    if let Commands::Convert(args) = &cli.command {
        if let Some(workers) = args.workers {
            config.batch.max_workers = workers;
        }
        if args.trial_first {
            config.batch.trial_first = true;
        }
    }
    validate_config(&config).context("Configuration validation failed")?;

    match cli.command {
        Commands::Probe { paths, json } => probe(&config, &paths, json).await,
        Commands::Convert(args) => convert(&config, &args).await,
        Commands::Restore { json } => restore(&config, json).await,
        Commands::Check => check(&config).await,
    }
}

fn load(explicit: Option<&Path>) -> Result<Config> {
    match resolve_config_path(explicit) {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            info!("No configuration file, using defaults and environment");
            load_config_from_env().context("Failed to load config from environment")
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn orchestrator(config: &Config) -> TranscodeOrchestrator<FfmpegTranscoder> {
    TranscodeOrchestrator::new(
        config.batch.clone(),
        FfmpegTranscoder::new(config.transcoder.clone()),
        SafetyLedger::new(config.ledger.clone()),
    )
}

/// Read-only pass shared by `probe` and `convert --dry-run`.
async fn probe(config: &Config, paths: &[PathBuf], json: bool) -> Result<u8> {
    let files = expand_inputs(paths)?;
    let summary = orchestrator(config)
        .probe_all(&files, &config.target)
        .await;

    if json {
        print_json(&summary)?;
    } else {
        write_probe_summary(&mut std::io::stdout().lock(), &summary)
            .context("Failed to write output")?;
    }
    Ok(probe_exit_status(&summary))
}

async fn convert(config: &Config, args: &ConvertArgs) -> Result<u8> {
    if args.dry_run {
        info!("Dry run, nothing will be modified");
        return probe(config, &args.paths, args.json).await;
    }
    let files = expand_inputs(&args.paths)?;

    let orchestrator = orchestrator(config);
    orchestrator
        .transcoder()
        .validate()
        .await
        .context("ffmpeg is not usable")?;
    orchestrator
        .ledger()
        .ensure_backup_dir()
        .await
        .context("Backup directory is not usable")?;

    let cancel = orchestrator.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files already in progress");
            cancel.cancel();
        }
    });

    let report = orchestrator.convert_batch(&files, &config.target).await;
    interrupt.abort();

    if args.json {
        print_json(&report)?;
    } else {
        write_batch_report(&mut std::io::stdout().lock(), &report)
            .context("Failed to write output")?;
    }
    if args.metrics {
        print!("{}", metrics::encode_metrics()?);
    }
    if let Some(banner) = alarm_banner(&report, orchestrator.ledger().backup_dir()) {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{banner}").context("Failed to write alarm")?;
    }

    Ok(batch_exit_status(&report))
}

async fn restore(config: &Config, json: bool) -> Result<u8> {
    let ledger = SafetyLedger::new(config.ledger.clone());
    info!(backup_dir = %ledger.backup_dir().display(), "Recovering leftover backups");
    let report = ledger.recover().await.context("Recovery failed")?;

    if json {
        print_json(&report)?;
    } else {
        write_recovery_report(&mut std::io::stdout().lock(), &report)
            .context("Failed to write output")?;
    }
    Ok(if report.is_success() {
        EXIT_OK
    } else {
        EXIT_FAILURES
    })
}

async fn check(config: &Config) -> Result<u8> {
    let transcoder = FfmpegTranscoder::new(config.transcoder.clone());
    transcoder
        .validate()
        .await
        .with_context(|| format!("ffmpeg at {:?} is not usable", config.transcoder.ffmpeg_path))?;
    println!("ffmpeg: ok ({})", config.transcoder.ffmpeg_path.display());

    let ledger = SafetyLedger::new(config.ledger.clone());
    ledger
        .ensure_backup_dir()
        .await
        .context("Backup directory is not usable")?;
    println!("backup dir: ok ({})", ledger.backup_dir().display());
    println!("target: {}", config.target.descriptor());

    let leftovers = std::fs::read_dir(ledger.backup_dir())
        .with_context(|| format!("Failed to list {}", ledger.backup_dir().display()))?
        .count();
    if leftovers > 0 {
        println!("backup dir holds {leftovers} file(s) from an earlier run; run `wavforge restore`");
        return Ok(EXIT_FAILURES);
    }
    Ok(EXIT_OK)
}
