mod config;
mod digest;
mod engine;
mod models;
mod parser;
mod provision;
mod report;
mod runner;
mod security;
mod upload;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{AppConfig, ConfigError, UploadConfig},
    engine::{EngineClient, OmpTransport},
    provision::{assign_scans, cpu_core_count, load_targets, provision_targets, ScanProfile},
    runner::{PollError, ScanRunner},
    upload::S3Uploader,
};

/// Exit status when required environment configuration is missing.
const EXIT_MISSING_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "vulnscan", version, about = "Provision, run and summarise OpenVAS scans")]
struct Cli {
    /// Increase verbosity level (use -v or -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the targets described in a JSON configuration file
    Targets {
        /// Target configuration file
        config: PathBuf,
    },

    /// Create a scan task for every registered target
    Tasks {
        /// Scan profile, may be repeated
        #[arg(short = 'k', long = "scan-key", value_enum, default_value = "simple")]
        scan_keys: Vec<ScanProfile>,
    },

    /// Run all tasks one after another and publish their reports
    Run,

    /// Summarise a JSON scan report by severity
    Digest {
        /// Path to a JSON scan report
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the digest (stdout when left out)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // scan runs are long and unattended, always keep a trace of them
    let verbose = match cli.command {
        Command::Run => cli.verbose.max(1),
        _ => cli.verbose,
    };
    init_tracing(verbose, cli.log_json);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ConfigError::MissingEnv(name)) = e.downcast_ref::<ConfigError>() {
                error!(variable = name, "missing required configuration");
                return ExitCode::from(EXIT_MISSING_CONFIG);
            }
            if let Some(PollError::Exhausted { failures }) = e.downcast_ref::<PollError<engine::EngineError>>() {
                error!(failures, "scan polling exhausted");
            }
            error!(error = %format!("{e:#}"), "vulnscan failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Targets { config } => {
            let cfg = AppConfig::load()?;
            let targets = load_targets(&config)?;
            let created = provision_targets(&engine_client(&cfg), &targets).await?;
            info!(created, "targets provisioned");
        }
        Command::Tasks { scan_keys } => {
            let cfg = AppConfig::load()?;
            let created = assign_scans(&engine_client(&cfg), &scan_keys, cpu_core_count(), cfg.max_checks)
                .await
                .context("failed to create scan tasks")?;
            info!(created, "tasks created");
        }
        Command::Run => {
            let upload_cfg = UploadConfig::from_env()?;
            let cfg = AppConfig::load()?;
            let uploader = S3Uploader::new(&upload_cfg).await;
            let runner = ScanRunner::new(engine_client(&cfg), Some(Box::new(uploader)), &cfg);
            let outcomes = runner.run().await?;
            for o in &outcomes {
                info!(
                    task_id = %o.task_id,
                    report_id = %o.report_id,
                    raw = %o.raw_path.display(),
                    json = %o.json_path.display(),
                    findings = o.findings,
                    uploaded = o.uploaded.as_deref().unwrap_or("-"),
                    "task summary"
                );
            }
            info!(run_id = runner.run_id(), tasks = outcomes.len(), "scan run finished");
        }
        Command::Digest { input, output } => digest::run(&input, output.as_deref())?,
    }
    Ok(())
}

fn engine_client(cfg: &AppConfig) -> EngineClient {
    EngineClient::new(Box::new(OmpTransport::new(cfg.omp_binary.clone(), cfg.command_timeout())))
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
