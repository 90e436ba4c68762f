use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lapse_frame_store::{DiskFrameStore, FrameStore, StagingFormat};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod encoder;
mod record;

use config::LapseConfig;
use encoder::Mp4Encoders;

#[derive(Parser)]
#[command(name = "lapse")]
#[command(about = "Capture timelapse videos from a camera", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    record: RecordArgs,

    /// TOML file with default settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview the camera and record timelapses (the default)
    Record(RecordArgs),

    /// List available cameras
    Devices,

    /// Turn frames left in a staging directory into a video
    Assemble {
        staging_dir: Option<PathBuf>,

        #[arg(short, long)]
        fps: Option<f64>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// Camera index to open
    #[arg(long)]
    pub camera: Option<u32>,

    /// Seconds between captured frames
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Frame rate of the output video
    #[arg(short, long)]
    pub fps: Option<f64>,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// jpeg or png
    #[arg(long)]
    pub staging_format: Option<StagingFormat>,

    /// Use a generated test pattern instead of a camera
    #[arg(long)]
    pub synthetic: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    let mut config = LapseConfig::load_or_default(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Record(cli.record)) {
        Commands::Record(args) => {
            config.apply(&args);
            record::run(config).await?;
        }
        Commands::Devices => list_devices()?,
        Commands::Assemble {
            staging_dir,
            fps,
            output,
        } => {
            let path = assemble(
                staging_dir.unwrap_or(config.staging_dir),
                fps.unwrap_or(config.fps),
                output.unwrap_or(config.output),
            )
            .await?;

            println!("Timelapse video saved as {}", path.display());
        }
    }

    Ok(())
}

#[cfg(feature = "native")]
fn list_devices() -> Result<()> {
    let cameras = lapse_camera::list_cameras().context("Failed to list cameras")?;

    if cameras.is_empty() {
        println!("No cameras found");
    }

    for camera in cameras {
        println!("{camera}");
    }

    Ok(())
}

#[cfg(not(feature = "native"))]
fn list_devices() -> Result<()> {
    println!("Built without native camera support");
    Ok(())
}

async fn assemble(staging_dir: PathBuf, fps: f64, output: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || {
        let mut store = DiskFrameStore::open(&staging_dir, StagingFormat::default())
            .with_context(|| {
                format!(
                    "Failed to open staging directory: {}",
                    staging_dir.display()
                )
            })?;

        info!(
            frames = store.len(),
            dir = %staging_dir.display(),
            "Assembling staged frames"
        );

        lapse_recording::assemble(&mut store, fps, &output, &Mp4Encoders)
            .context("Failed to assemble video")
    })
    .await?
}
