use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use capfleet::artifacts::ArtifactStore;
use capfleet::browser::webdriver::WebDriverClient;
use capfleet::config::FleetConfig;
use capfleet::fleet::FleetSupervisor;
use capfleet::plan::WorkPlan;

#[derive(Parser)]
#[command(
    name = "capfleet",
    about = "capfleet — resumable mobile traffic-capture fleet driver",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Fleet configuration file (TOML)
    #[arg(long, env = "CAPFLEET_CONFIG", default_value = "fleet.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CAPFLEET_LOG", default_value = "info", global = true)]
    log: String,

    /// Log output format: "pretty" (default) or "json"
    #[arg(long, env = "CAPFLEET_LOG_FORMAT", default_value = "pretty", global = true)]
    log_format: String,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "CAPFLEET_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run every worker to completion (default)
    Run,
    /// Report per-worker completion and resume cursors without touching any device
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(&args.log, args.log_file.as_deref(), &args.log_format);

    let config = FleetConfig::load(&args.config)?;

    match args.command {
        None | Some(Command::Run) => run(config).await,
        Some(Command::Status) => status(config),
    }
}

async fn run(config: FleetConfig) -> Result<()> {
    let driver = Arc::new(WebDriverClient::new()?);
    let supervisor = FleetSupervisor::new(config, driver);
    supervisor.run_all().await
}

/// Print each worker's progress as derived from the output directory alone.
fn status(config: FleetConfig) -> Result<()> {
    let plan = WorkPlan::load(config.samples, &config.targets_file)?;
    let store = ArtifactStore::new(config.output_dir.clone(), &plan);
    for (index, device) in config.devices.iter().enumerate() {
        let worker = (index + 1) as u32;
        if store.is_complete(worker) {
            println!("worker {worker} ({}): complete", device.name);
        } else {
            let cursor = store.resume_cursor(worker);
            println!(
                "worker {worker} ({}): resumes at sample {}/{}, item {}/{}",
                device.name,
                cursor.sample,
                plan.samples,
                cursor.item,
                plan.items()
            );
        }
    }
    Ok(())
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("capfleet.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            init_stdout_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        info!(log_file = %path.display(), "logging to file");
        Some(guard)
    } else {
        init_stdout_only(log_level, use_json);
        None
    }
}

fn init_stdout_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
