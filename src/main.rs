//! ci-matrix: fail-fast build and test matrix runner
//!
//! Runs unit tests, per-device checks, demo builds, a formatting check and
//! a documentation build, exiting non-zero at the first failing step.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ci_matrix::domain::Workspace;
use ci_matrix::pipeline::render_plan;
use ci_matrix::services::{DemoService, ProcessRunner, StepExecutor, Toolchain};
use ci_matrix::{AppError, CiConfig, Pipeline};

#[derive(Parser)]
#[command(name = "ci-matrix")]
#[command(version)]
#[command(about = "Fail-fast build and test matrix for multi-device embedded workspaces")]
struct Cli {
    /// Workspace root (discovered from the current directory by default)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Extra configuration file, applied after the project config
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write one log file per step into this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Stream build-tool output while steps run
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every phase, stopping at the first failure
    Run,
    /// Print the steps a run would execute, without executing them
    Plan {
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Initialize logging with RUST_LOG environment variable support
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Load configuration and discover demos; every configuration error surfaces here
fn build_pipeline(cli: &Cli) -> Result<Pipeline<ProcessRunner, io::Stdout>> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => Workspace::discover(None)
            .map(Ok)
            .unwrap_or_else(std::env::current_dir)
            .context("resolving the workspace root")?,
    };
    tracing::info!("Using workspace root {}", root.display());

    let config = CiConfig::load(Some(&root), cli.config.as_deref()).map_err(AppError::from)?;
    config.validate().map_err(AppError::from)?;

    let devices = config.device_matrix().map_err(AppError::from)?;
    let classifier = config.classifier().map_err(AppError::from)?;
    let workspace = Workspace::new(root, config);

    let demos = DemoService::new(
        workspace.root_path.clone(),
        workspace.config.demos.directory.clone(),
    )
    .discover_demos(&classifier)
    .map_err(AppError::from)?;
    if workspace.has_demos_directory() {
        tracing::info!(
            "{} devices, {} demos in {}",
            devices.devices().len(),
            demos.len(),
            workspace.demos_directory.display()
        );
    } else {
        tracing::info!(
            "{} devices, no demos directory at {}",
            devices.devices().len(),
            workspace.demos_directory.display()
        );
    }

    let toolchain = Toolchain::new(&workspace, workspace.config.strictness.resolve_from_env());
    tracing::debug!("Strictness flags: {:?}", toolchain.rustflags());

    let runner = match &cli.log_dir {
        Some(dir) => ProcessRunner::with_log_dir(dir.clone()),
        None => ProcessRunner::new(),
    };
    let executor = StepExecutor::new(runner, toolchain, io::stdout());

    Ok(Pipeline::new(
        devices,
        demos,
        workspace.config.demos.restricted_prefix.clone(),
        executor,
    ))
}

fn run(cli: Cli) -> Result<()> {
    let mut pipeline = build_pipeline(&cli)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Plan { json } => {
            let entries = pipeline.plan();
            let mut stdout = io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut stdout, &entries)
                    .context("serializing the plan")?;
                writeln!(stdout)?;
            } else {
                writeln!(stdout, "{}", render_plan(&entries))?;
            }
        }
        Commands::Run => {
            let report = pipeline.run()?;
            println!(
                "All {} steps passed ({} skipped)",
                report.total_steps(),
                report.skipped.len()
            );
        }
    }

    Ok(())
}

fn report_failure(err: &anyhow::Error) {
    let mut stderr = io::stderr().lock();
    let written = match err.downcast_ref::<AppError>() {
        Some(app) => app.render(&mut stderr),
        None => writeln!(stderr, "error: {:#}", err),
    };
    if let Err(e) = written {
        tracing::error!("Cannot write failure report: {}", e);
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>()
        .map(AppError::exit_code)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::from(exit_code(&err))
        }
    }
}
