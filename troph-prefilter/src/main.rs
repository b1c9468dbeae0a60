//! troph-prefilter - Trophallaxis candidate prefilter
//!
//! Sweeps a date range of tracking data for pairs of bees whose pose makes a
//! food exchange plausible, and writes one archive per camera-day window.
//! Also lists and loads those archives for analysis.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use troph_common::archive::{list_available, load_many, ArchiveSource, LoadOptions};
use troph_common::config::{CliOverrides, PrefilterConfig, TomlConfig};
use troph_common::db::TrackingDb;
use troph_common::ProbabilityModel;
use troph_prefilter::{FrameProcessor, SweepRequest, SweepScheduler};

#[derive(Debug, Parser)]
#[command(name = "troph-prefilter", version, about = "Trophallaxis candidate prefilter")]
struct Cli {
    /// Config file (default: <config dir>/troph/prefilter.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tracking database path
    #[arg(long, global = true)]
    tracking_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prefilter every camera-day window in a date range
    Sweep {
        /// First day (YYYY-MM-DD, UTC)
        #[arg(long)]
        from: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD, UTC)
        #[arg(long)]
        to: NaiveDate,
        /// Archive output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Concurrent frame workers
        #[arg(long)]
        workers: Option<usize>,
    },
    /// List archives in a directory
    List {
        /// Archive directory (default: configured output directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Load archives and join them with frame metadata
    Load {
        /// Archive files (.zip or .msgpack) or directories of archives
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Print every merged row as a JSON line
        #[arg(long)]
        json: bool,
        /// Fail if frame metadata is missing for archived frames
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml = TomlConfig::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml.logging.level)),
        )
        .init();

    info!(
        "Starting troph-prefilter v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut overrides = CliOverrides {
        tracking_db: cli.tracking_db.clone(),
        ..Default::default()
    };
    if let Command::Sweep {
        output_dir, workers, ..
    } = &cli.command
    {
        overrides.output_dir = output_dir.clone();
        overrides.workers = *workers;
    }
    let config = PrefilterConfig::resolve(toml, overrides)?;

    match cli.command {
        Command::Sweep { from, to, .. } => sweep(&config, from, to).await,
        Command::List { dir } => list(dir.unwrap_or_else(|| config.output_dir.clone())),
        Command::Load {
            paths,
            json,
            strict,
        } => load(&config, paths, json, strict).await,
    }
}

async fn sweep(config: &PrefilterConfig, from: NaiveDate, to: NaiveDate) -> Result<()> {
    let db = Arc::new(
        TrackingDb::connect(&config.tracking_db)
            .await
            .with_context(|| format!("Failed to open {}", config.tracking_db.display()))?,
    );
    let model = ProbabilityModel::new(config.calibration.clone())?;
    let processor = FrameProcessor::new(db.clone(), model);
    let scheduler = SweepScheduler::new(db, processor, config.workers, config.subsample_stride);

    let request = SweepRequest {
        from,
        to,
        cameras: config.cameras.clone(),
        output_dir: config.output_dir.clone(),
    };
    let summary = scheduler.run(&request).await?;

    println!(
        "written={} skipped={} empty={} frames={} frames_without_candidates={} candidates={}",
        summary.windows_written,
        summary.windows_skipped,
        summary.windows_empty,
        summary.frames_submitted,
        summary.frames_without_candidates,
        summary.candidates_written
    );
    Ok(())
}

fn list(dir: PathBuf) -> Result<()> {
    let index = list_available(&dir)?;
    println!("cam_id\tbegin\tend\tfilename");
    for entry in &index {
        println!(
            "{}\t{}\t{}\t{}",
            entry.cam_id,
            entry.begin.format("%Y-%m-%d %H:%M:%S"),
            entry.end.format("%Y-%m-%d %H:%M:%S"),
            entry.filename.display()
        );
    }
    info!("{} archives in {}", index.len(), dir.display());
    Ok(())
}

async fn load(
    config: &PrefilterConfig,
    paths: Vec<PathBuf>,
    json: bool,
    strict: bool,
) -> Result<()> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in list_available(&path)? {
                sources.push(ArchiveSource::from_path(&entry.filename)?);
            }
        } else {
            sources.push(ArchiveSource::from_path(&path)?);
        }
    }

    let db = TrackingDb::open_existing(&config.tracking_db)
        .await
        .with_context(|| format!("Failed to open {}", config.tracking_db.display()))?;
    let options = LoadOptions {
        warnings_as_errors: strict,
    };
    let source_count = sources.len();
    let rows = load_many(sources, &db, config.load_workers, options).await?;

    if json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    let frames: BTreeSet<u64> = rows.iter().map(|r| r.frame_id).collect();
    let first = rows.iter().map(|r| r.datetime).min();
    let last = rows.iter().map(|r| r.datetime).max();
    println!("sources={} rows={} frames={}", source_count, rows.len(), frames.len());
    if let (Some(first), Some(last)) = (first, last) {
        println!("first={} last={}", first.to_rfc3339(), last.to_rfc3339());
    }
    Ok(())
}
