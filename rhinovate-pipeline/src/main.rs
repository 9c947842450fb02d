//! Rhinovate command line
//!
//! Processes raw scans from the project's incoming folder into healed,
//! morphed glTF meshes.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rhinovate_core::Error;
use rhinovate_pipeline::{
    resolve_project_root, Pipeline, PipelineConfig, PipelineResult, PipelineSettings, WorkQueue,
    CONFIG_FILE_NAME,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Rhinovate - scan sanitization, reconstruction and morphing
#[derive(Parser, Debug)]
#[command(name = "rhinovate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root holding config.json and the work folders
    /// [default: $RHINOVATE_PROJECT_ROOT, then the current directory]
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Config file [default: <root>/config.json]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads; 0 uses one per core
    #[arg(short, long, global = true, default_value_t = 0)]
    jobs: usize,

    /// Process files one after another
    #[arg(long, global = true, conflicts_with = "jobs")]
    sequential: bool,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every scan waiting in the incoming folder once
    Run,
    /// Keep polling the incoming folder for new scans
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        interval: u64,
        /// Stop after this many polls
        #[arg(long)]
        max_cycles: Option<usize>,
    },
    /// Process the given scan files in place
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

fn load_settings(args: &Args, root: &std::path::Path) -> Result<PipelineSettings> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
    if args.config.is_none() && !path.exists() {
        info!(file = %path.display(), "No config file, using defaults");
        return Ok(PipelineSettings::default());
    }
    Ok(PipelineSettings::load(&path)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let root = resolve_project_root(args.root.as_deref())
        .context("Failed to resolve project root")?;
    let settings = load_settings(&args, &root)?;
    let jobs = if args.sequential { 1 } else { args.jobs };
    let config = PipelineConfig::new(settings, &root).with_jobs(jobs);
    info!(root = %root.display(), jobs, "Starting pipeline");

    let pipeline = Pipeline::new(config);
    let queue = WorkQueue::new(&pipeline.config().layout.incoming);
    let result: PipelineResult = match &args.command {
        Command::Run => {
            let result = pipeline.run_queue(&queue)?;
            if result.total() == 0 {
                return Err(Error::EmptyInput(format!(
                    "no scans found in {} (expected .ply or .obj files)",
                    queue.incoming().display()
                ))
                .into());
            }
            result
        }
        Command::Watch {
            interval,
            max_cycles,
        } => pipeline.watch(&queue, Duration::from_secs(*interval), *max_cycles)?,
        Command::Process { files } => pipeline.run(files)?,
    };

    print!("{}", result);
    if !result.is_success() {
        bail!("{} of {} scans failed", result.failures.len(), result.total());
    }
    Ok(())
}
