use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use exporter::{ExportConfig, ExportManager, ExportRequest, JobStatus, PlaybackMode};
use log::{error, info};
use std::path::PathBuf;

/// Recording export tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a time range of recorded footage to a single MP4
    Export {
        /// Camera identifier
        camera: String,
        /// Start of the export window, unix seconds
        start: i64,
        /// End of the export window, unix seconds
        end: i64,
        /// Produce a 25x timelapse instead of a normal-speed copy
        #[arg(long)]
        timelapse: bool,
    },
    /// List known export jobs and their outcomes
    Jobs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger - use RUST_LOG env var or default to info level
    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    let cfg = ExportConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    info!("Export directory: {}", cfg.export_dir.display());
    info!("VOD base URL: {}", cfg.vod_base_url);

    let manager = ExportManager::new(cfg);
    manager
        .ensure_directories()
        .context("Failed to create working directories")?;
    manager
        .recover_on_startup()
        .context("Failed to clean up stale in-progress exports")?;

    match args.command {
        Command::Export {
            camera,
            start,
            end,
            timelapse,
        } => {
            let request = ExportRequest {
                camera,
                start_time: start,
                end_time: end,
                playback_mode: if timelapse {
                    PlaybackMode::Timelapse25x
                } else {
                    PlaybackMode::Realtime
                },
            };

            let job = manager
                .run_to_completion(request)
                .await
                .context("Export request rejected")?;

            match job.status {
                JobStatus::Complete => {
                    let output = job
                        .output_path
                        .context("Complete job is missing its output path")?;
                    info!("Export complete: {}", output.display());
                    println!("{}", output.display());
                }
                _ => {
                    error!(
                        "Export failed: {}",
                        job.reason.as_deref().unwrap_or("unknown failure")
                    );
                    std::process::exit(1);
                }
            }
        }
        Command::Jobs => {
            let jobs = manager.jobs().context("Failed to load job records")?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
    }

    Ok(())
}
