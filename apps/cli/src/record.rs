use anyhow::{Context, Result};
use lapse_camera::{FrameSource, SyntheticCamera};
use lapse_frame_store::{DiskFrameStore, FrameStore};
use lapse_recording::{
    PREVIEW_CADENCE, SessionHandle, SessionOptions, Status, Toggled, spawn_session,
};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{info, warn};

use crate::{config::LapseConfig, encoder::Mp4Encoders};

const HELP: &str = "\
Commands:
  r, <Enter>   start / stop recording
  c <index>    switch camera
  i <secs>     set capture interval
  f <fps>      set output frame rate
  s            show status
  q            quit (frames of an unfinished recording stay staged)";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Toggle,
    Camera(u32),
    Interval(String),
    Fps(String),
    Status,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(Command::Toggle);
    };
    let arg = parts.next();

    let command = match (name, arg) {
        ("r", None) => Command::Toggle,
        ("s", None) => Command::Status,
        ("q", None) => Command::Quit,
        ("h" | "?", None) => Command::Help,
        ("c", Some(index)) => Command::Camera(
            index
                .parse()
                .map_err(|_| format!("'{index}' is not a camera index"))?,
        ),
        ("i", Some(secs)) => Command::Interval(secs.to_string()),
        ("f", Some(fps)) => Command::Fps(fps.to_string()),
        ("c" | "i" | "f", None) => return Err(format!("'{name}' needs a value")),
        _ => return Err(format!("Unknown command '{}'", line.trim())),
    };

    if parts.next().is_some() {
        return Err(format!("Too many arguments in '{}'", line.trim()));
    }

    Ok(command)
}

fn open_source(config: &LapseConfig) -> Box<dyn FrameSource> {
    if config.synthetic {
        info!("Using synthetic camera");
        return Box::new(SyntheticCamera::default());
    }

    #[cfg(feature = "native")]
    let source: Box<dyn FrameSource> = Box::new(lapse_camera::NativeCamera::new());

    #[cfg(not(feature = "native"))]
    let source: Box<dyn FrameSource> = {
        warn!("Built without native camera support, using synthetic camera");
        Box::new(SyntheticCamera::default())
    };

    source
}

pub async fn run(config: LapseConfig) -> Result<()> {
    let capture = config.capture()?;

    let store = DiskFrameStore::open(&config.staging_dir, config.staging_format)
        .with_context(|| {
            format!(
                "Failed to open staging directory: {}",
                config.staging_dir.display()
            )
        })?;

    if !store.is_empty() {
        warn!(
            frames = store.len(),
            dir = %config.staging_dir.display(),
            "Frames from an earlier session are staged and will be replaced when recording starts. \
             Run `lapse assemble` first to keep them."
        );
    }

    let session = spawn_session(
        open_source(&config),
        Box::new(store),
        Arc::new(Mp4Encoders),
        SessionOptions {
            output: config.output.clone(),
            config: capture,
            camera: Some(config.camera),
            display: config.display(),
            preview_cadence: PREVIEW_CADENCE,
        },
    );

    let printer = tokio::spawn(print_status(session.status()));

    println!("{HELP}");

    let mut interval = config.interval_secs.to_string();
    let mut fps = config.fps.to_string();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Toggle => toggle(&session).await,
            Command::Camera(index) => match session.set_camera(index).await {
                Ok(()) => println!("Camera {index} opened."),
                Err(e) => println!("Cannot open camera {index}: {e}"),
            },
            Command::Interval(value) => {
                if configure(&session, &value, &fps).await {
                    interval = value;
                }
            }
            Command::Fps(value) => {
                if configure(&session, &interval, &value).await {
                    fps = value;
                }
            }
            Command::Status => print_snapshot(&session),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    session.shutdown().await?;
    printer.abort();

    Ok(())
}

async fn toggle(session: &SessionHandle) {
    match session.toggle_recording().await {
        Ok(Toggled::Started) => println!("Recording started."),
        Ok(Toggled::Stopped { output }) => {
            println!("Timelapse video saved as {}", output.display())
        }
        Err(e) => println!("{e}"),
    }
}

async fn configure(session: &SessionHandle, interval: &str, fps: &str) -> bool {
    match session.configure_str(interval, fps).await {
        Ok(()) => {
            println!("Next recording: one frame every {interval}s, played back at {fps} fps.");
            true
        }
        Err(e) => {
            println!("{e}");
            false
        }
    }
}

fn print_snapshot(session: &SessionHandle) {
    println!("{}", session.current_status());

    match session.preview().borrow().as_ref() {
        Some(preview) => println!(
            "preview {} (camera frame {})",
            preview.dimensions(),
            preview.source_dimensions
        ),
        None => println!("no preview frame yet"),
    }
}

async fn print_status(mut status: watch::Receiver<Status>) {
    let mut last = status.borrow_and_update().clone();

    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();

        if current.recording || current.last_error != last.last_error {
            println!("{current}");
        }

        last = current;
    }
}
