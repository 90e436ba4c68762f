use image::{ImageBuffer, Rgb, imageops};
use lapse_media_info::{Dimensions, RawFrame};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{PreviewFrame, SharedSource};

pub const PREVIEW_CADENCE: Duration = Duration::from_millis(30);
pub const FALLBACK_DISPLAY: Dimensions = Dimensions::new(640, 480);

/// Largest size that fits `display` with the frame's aspect ratio. An empty
/// display area falls back to 640x480.
pub fn preview_dimensions(frame: Dimensions, display: Dimensions) -> Dimensions {
    let display = if display.is_empty() {
        FALLBACK_DISPLAY
    } else {
        display
    };

    frame.fit_within(display)
}

pub fn scale_to_display(frame: &RawFrame, display: Dimensions) -> Option<RawFrame> {
    let target = preview_dimensions(frame.dimensions(), display);
    if target == frame.dimensions() {
        return Some(frame.clone());
    }

    let source =
        ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(frame.width(), frame.height(), frame.data())?;
    let scaled = imageops::resize(
        &source,
        target.width,
        target.height,
        imageops::FilterType::Triangle,
    );

    RawFrame::new(target, scaled.into_raw(), frame.captured_at()).ok()
}

/// Where frames go to be shown. Cloned into whichever loop currently owns
/// the camera.
#[derive(Clone)]
pub struct DisplaySink {
    frames: Arc<watch::Sender<Option<PreviewFrame>>>,
    size: watch::Receiver<Dimensions>,
}

impl DisplaySink {
    pub fn new(
        frames: Arc<watch::Sender<Option<PreviewFrame>>>,
        size: watch::Receiver<Dimensions>,
    ) -> Self {
        Self { frames, size }
    }

    pub fn publish(&self, frame: &RawFrame) {
        let display = *self.size.borrow();

        let Some(scaled) = scale_to_display(frame, display) else {
            warn!("Failed to scale {} frame for display", frame.dimensions());
            return;
        };

        self.frames.send_replace(Some(PreviewFrame {
            frame: scaled,
            source_dimensions: frame.dimensions(),
        }));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumer {
    Preview,
    Capture,
}

impl Consumer {
    fn id(self) -> u8 {
        match self {
            Self::Preview => 1,
            Self::Capture => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivitySnapshot {
    pub active: Option<Consumer>,
    /// Number of times a consumer started while the other was still running.
    pub overlaps: u64,
}

/// Tracks which consumer is reading from the camera.
#[derive(Debug, Default)]
pub struct Activity {
    active: AtomicU8,
    overlaps: AtomicU64,
}

impl Activity {
    pub fn enter(activity: &Arc<Self>, consumer: Consumer) -> ActivityGuard {
        if let Err(other) =
            activity
                .active
                .compare_exchange(0, consumer.id(), Ordering::AcqRel, Ordering::Acquire)
        {
            activity.overlaps.fetch_add(1, Ordering::Relaxed);
            error!(?consumer, other, "Camera consumer started while another was active");
            activity.active.store(consumer.id(), Ordering::Release);
        }

        ActivityGuard {
            activity: activity.clone(),
            consumer,
        }
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        let active = match self.active.load(Ordering::Acquire) {
            1 => Some(Consumer::Preview),
            2 => Some(Consumer::Capture),
            _ => None,
        };

        ActivitySnapshot {
            active,
            overlaps: self.overlaps.load(Ordering::Relaxed),
        }
    }
}

pub struct ActivityGuard {
    activity: Arc<Activity>,
    consumer: Consumer,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        let _ = self.activity.active.compare_exchange(
            self.consumer.id(),
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Pulls frames for the live view while no recording is running.
pub struct PreviewLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PreviewLoop {
    pub fn spawn(
        source: SharedSource,
        sink: DisplaySink,
        activity: Arc<Activity>,
        cadence: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let _guard = Activity::enter(&activity, Consumer::Preview);
                debug!("Preview started");

                let mut ticker = interval(cadence);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    let read = tokio::task::spawn_blocking({
                        let source = source.clone();
                        move || source.lock().read()
                    })
                    .await;

                    match read {
                        Ok(Ok(frame)) => sink.publish(&frame),
                        Ok(Err(e)) => trace!("Preview frame unavailable: {e}"),
                        Err(e) => warn!("Preview read panicked: {e}"),
                    }
                }

                debug!("Preview stopped");
            }
        });

        Self { cancel, task }
    }

    /// Stops the loop and waits until it no longer touches the camera.
    pub async fn stop(self) {
        self.cancel.cancel();

        if let Err(e) = self.task.await {
            error!("Preview task failed: {e}");
        }
    }
}
