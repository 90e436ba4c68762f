use lapse_camera::CameraError;
use lapse_frame_store::FrameStoreError;
use lapse_media_info::RawFrame;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    Activity, CaptureConfig, Consumer, DisplaySink, RecordingError, SharedSource, SharedStore,
    Status,
};

pub const ELAPSED_REPORT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
    pub frames: u64,
    pub elapsed: Duration,
    pub config: CaptureConfig,
}

#[derive(thiserror::Error, Debug)]
enum TickError {
    #[error("{0}")]
    Camera(#[from] CameraError),
    #[error("{0}")]
    Store(#[from] FrameStoreError),
}

/// Everything the capture and reporter tasks share.
#[derive(Clone)]
pub struct CaptureContext {
    pub source: SharedSource,
    pub store: SharedStore,
    pub sink: DisplaySink,
    pub status: Arc<watch::Sender<Status>>,
    pub activity: Arc<Activity>,
}

/// A running capture. Frames are sampled on every interval boundary until
/// [`CaptureSession::stop`] is called.
pub struct CaptureSession {
    config: CaptureConfig,
    started_at: Instant,
    frames: Arc<AtomicU64>,
    cancel: CancellationToken,
    capture_task: JoinHandle<()>,
    reporter_task: JoinHandle<()>,
}

impl CaptureSession {
    /// Clears the store and starts sampling. The first frame is taken right
    /// away, then one on every interval boundary after that.
    pub fn start(config: CaptureConfig, ctx: CaptureContext) -> Result<Self, RecordingError> {
        config.validate()?;

        ctx.store.lock().clear().map_err(RecordingError::Staging)?;

        let started_at = Instant::now();
        let frames = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        ctx.status.send_modify(|s| {
            s.recording = true;
            s.frames = 0;
            s.elapsed = Some(Duration::ZERO);
            s.projected = Some(Duration::ZERO);
        });

        info!(
            interval = ?config.interval,
            rate = config.rate,
            "Started capture"
        );

        let capture_task = tokio::spawn(run_capture(
            config,
            started_at,
            frames.clone(),
            cancel.clone(),
            ctx.clone(),
        ));
        let reporter_task = tokio::spawn(run_elapsed_reporter(
            started_at,
            cancel.clone(),
            ctx.status.clone(),
        ));

        Ok(Self {
            config,
            started_at,
            frames,
            cancel,
            capture_task,
            reporter_task,
        })
    }

    /// Signals both tasks and waits for them. An in-flight tick is allowed to
    /// finish so the last frame is either fully staged or not at all.
    pub async fn stop(self) -> CaptureSummary {
        self.cancel.cancel();

        if let Err(e) = self.capture_task.await {
            error!("Capture task failed: {e}");
        }
        if let Err(e) = self.reporter_task.await {
            error!("Elapsed reporter failed: {e}");
        }

        let summary = CaptureSummary {
            frames: self.frames.load(Ordering::Acquire),
            elapsed: self.started_at.elapsed(),
            config: self.config,
        };

        info!(
            frames = summary.frames,
            elapsed = ?summary.elapsed,
            "Stopped capture"
        );

        summary
    }
}

async fn run_capture(
    config: CaptureConfig,
    started_at: Instant,
    frames: Arc<AtomicU64>,
    cancel: CancellationToken,
    ctx: CaptureContext,
) {
    let _guard = Activity::enter(&ctx.activity, Consumer::Capture);

    let mut ticker = interval_at(started_at, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let tick = tokio::task::spawn_blocking({
            let source = ctx.source.clone();
            let store = ctx.store.clone();
            move || -> Result<(u32, RawFrame), TickError> {
                let frame = source.lock().read()?;
                let index = store.lock().append(&frame)?;
                Ok((index, frame))
            }
        })
        .await;

        match tick {
            Ok(Ok((index, frame))) => {
                let count = frames.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(index, "Captured frame");

                ctx.status.send_modify(|s| {
                    s.frames = count;
                    s.projected = Some(config.projected_duration(count));
                });
                ctx.sink.publish(&frame);
            }
            Ok(Err(TickError::Camera(e))) => {
                warn!("Failed to grab frame: {e}");
            }
            Ok(Err(TickError::Store(e))) => {
                warn!("Failed to stage frame: {e}");
                ctx.status
                    .send_modify(|s| s.last_error = Some(format!("Failed to stage frame: {e}")));
            }
            Err(e) => error!("Capture tick panicked: {e}"),
        }
    }
}

async fn run_elapsed_reporter(
    started_at: Instant,
    cancel: CancellationToken,
    status: Arc<watch::Sender<Status>>,
) {
    let mut ticker = interval_at(started_at + ELAPSED_REPORT_PERIOD, ELAPSED_REPORT_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let elapsed = started_at.elapsed();
        status.send_modify(|s| s.elapsed = Some(elapsed));
    }
}
