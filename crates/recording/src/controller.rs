use lapse_camera::{CameraError, FrameSource};
use lapse_frame_store::FrameStore;
use lapse_media_info::Dimensions;
use parking_lot::Mutex;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::{
    Activity, ActivitySnapshot, CaptureConfig, CaptureContext, CaptureSession, DisplaySink,
    EncoderFactory, PREVIEW_CADENCE, PreviewFrame, PreviewLoop, RecordingError, Status, assemble,
};

pub type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;
pub type SharedStore = Arc<Mutex<Box<dyn FrameStore>>>;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub output: PathBuf,
    pub config: CaptureConfig,
    /// Camera to open when the session starts.
    pub camera: Option<u32>,
    pub display: Dimensions,
    pub preview_cadence: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("timelapse.mp4"),
            config: CaptureConfig::default(),
            camera: Some(0),
            display: Dimensions::new(0, 0),
            preview_cadence: PREVIEW_CADENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Toggled {
    Started,
    Stopped { output: PathBuf },
}

enum SessionState {
    Idle { preview: PreviewLoop },
    Recording { capture: CaptureSession },
    ShutDown,
}

pub enum SessionControlMessage {
    SetCamera(u32, oneshot::Sender<Result<(), RecordingError>>),
    Configure(CaptureConfig, oneshot::Sender<Result<(), RecordingError>>),
    Toggle(oneshot::Sender<Result<Toggled, RecordingError>>),
    Shutdown(oneshot::Sender<Result<(), RecordingError>>),
}

/// Cheap to clone. Once every handle is dropped the session shuts down.
#[derive(Clone)]
pub struct SessionHandle {
    ctrl_tx: flume::Sender<SessionControlMessage>,
    status: watch::Receiver<Status>,
    preview: watch::Receiver<Option<PreviewFrame>>,
    display: Arc<watch::Sender<Dimensions>>,
    activity: Arc<Activity>,
}

macro_rules! send_message {
    ($ctrl_tx:expr, $variant:path $(, $arg:expr)*) => {{
        let (tx, rx) = oneshot::channel();
        $ctrl_tx
            .send_async($variant($($arg,)* tx))
            .await
            .map_err(|_| RecordingError::ActorStopped)?;
        rx.await.map_err(|_| RecordingError::ActorStopped)?
    }};
}

impl SessionHandle {
    /// Releases the current camera and opens `index`. Allowed while recording.
    pub async fn set_camera(&self, index: u32) -> Result<(), RecordingError> {
        send_message!(self.ctrl_tx, SessionControlMessage::SetCamera, index)
    }

    /// Sets the interval and rate used by the next recording.
    pub async fn configure(&self, config: CaptureConfig) -> Result<(), RecordingError> {
        send_message!(self.ctrl_tx, SessionControlMessage::Configure, config)
    }

    pub async fn configure_str(&self, interval: &str, rate: &str) -> Result<(), RecordingError> {
        self.configure(CaptureConfig::parse(interval, rate)?).await
    }

    /// Starts recording when idle. When recording, stops and assembles the
    /// captured frames into the output video.
    pub async fn toggle_recording(&self) -> Result<Toggled, RecordingError> {
        send_message!(self.ctrl_tx, SessionControlMessage::Toggle)
    }

    /// Stops everything without producing a video. Staged frames are kept.
    pub async fn shutdown(&self) -> Result<(), RecordingError> {
        send_message!(self.ctrl_tx, SessionControlMessage::Shutdown)
    }

    pub fn set_display_size(&self, width: u32, height: u32) {
        self.display.send_replace(Dimensions::new(width, height));
    }

    pub fn status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    pub fn current_status(&self) -> Status {
        self.status.borrow().clone()
    }

    pub fn preview(&self) -> watch::Receiver<Option<PreviewFrame>> {
        self.preview.clone()
    }

    pub fn activity(&self) -> ActivitySnapshot {
        self.activity.snapshot()
    }
}

struct SessionActor {
    source: SharedSource,
    store: SharedStore,
    encoders: Arc<dyn EncoderFactory>,
    output: PathBuf,
    config: CaptureConfig,
    preview_cadence: Duration,
    sink: DisplaySink,
    status: Arc<watch::Sender<Status>>,
    activity: Arc<Activity>,
}

/// Spawns the session controller with the preview running. Must be called
/// from within a tokio runtime.
pub fn spawn_session(
    source: Box<dyn FrameSource>,
    store: Box<dyn FrameStore>,
    encoders: Arc<dyn EncoderFactory>,
    options: SessionOptions,
) -> SessionHandle {
    let (ctrl_tx, ctrl_rx) = flume::bounded(1);

    let status = Arc::new(watch::Sender::new(Status::default()));
    let preview = Arc::new(watch::Sender::new(None));
    let display = Arc::new(watch::Sender::new(options.display));
    let activity = Arc::new(Activity::default());

    let handle = SessionHandle {
        ctrl_tx,
        status: status.subscribe(),
        preview: preview.subscribe(),
        display: display.clone(),
        activity: activity.clone(),
    };

    let actor = SessionActor {
        source: Arc::new(Mutex::new(source)),
        store: Arc::new(Mutex::new(store)),
        encoders,
        output: options.output,
        config: options.config,
        preview_cadence: options.preview_cadence,
        sink: DisplaySink::new(preview, display.subscribe()),
        status,
        activity,
    };

    tokio::spawn(actor.run(ctrl_rx, options.camera));

    handle
}

impl SessionActor {
    async fn run(mut self, ctrl_rx: flume::Receiver<SessionControlMessage>, camera: Option<u32>) {
        if let Some(index) = camera {
            self.set_camera(index).await.ok();
        }

        let mut state = SessionState::Idle {
            preview: self.start_preview(),
        };

        loop {
            let Ok(msg) = ctrl_rx.recv_async().await else {
                debug!("All session handles dropped");
                self.shutdown(state).await;
                return;
            };

            state = match msg {
                SessionControlMessage::SetCamera(index, tx) => {
                    tx.send(self.set_camera(index).await).ok();
                    state
                }
                SessionControlMessage::Configure(config, tx) => {
                    let res = self.configure(config);
                    tx.send(res).ok();
                    state
                }
                SessionControlMessage::Toggle(tx) => {
                    let (state, res) = self.toggle(state).await;
                    tx.send(res).ok();
                    state
                }
                SessionControlMessage::Shutdown(tx) => {
                    let state = self.shutdown(state).await;
                    tx.send(Ok(())).ok();
                    state
                }
            };

            if matches!(state, SessionState::ShutDown) {
                return;
            }
        }
    }

    fn start_preview(&self) -> PreviewLoop {
        PreviewLoop::spawn(
            self.source.clone(),
            self.sink.clone(),
            self.activity.clone(),
            self.preview_cadence,
        )
    }

    fn record_error(&self, error: &RecordingError) {
        self.status
            .send_modify(|s| s.last_error = Some(error.to_string()));
    }

    async fn set_camera(&self, index: u32) -> Result<(), RecordingError> {
        let source = self.source.clone();
        let res = tokio::task::spawn_blocking(move || {
            let mut source = source.lock();
            source.close();
            source.open(index)
        })
        .await
        .map_err(|e| CameraError::Open {
            index,
            reason: e.to_string(),
        })
        .map_err(RecordingError::from)
        .and_then(|res| res.map_err(RecordingError::from));

        match &res {
            Ok(()) => {
                info!(index, "Camera opened");
                self.status.send_modify(|s| s.device = Some(index));
            }
            Err(e) => {
                warn!(index, "Cannot open camera: {e}");
                self.status.send_modify(|s| s.device = None);
                self.record_error(e);
            }
        }

        res
    }

    fn configure(&mut self, config: CaptureConfig) -> Result<(), RecordingError> {
        if let Err(e) = config.validate() {
            self.record_error(&e);
            return Err(e);
        }

        debug!(interval = ?config.interval, rate = config.rate, "Capture configured");
        self.config = config;

        Ok(())
    }

    async fn toggle(
        &self,
        state: SessionState,
    ) -> (SessionState, Result<Toggled, RecordingError>) {
        match state {
            SessionState::Idle { preview } => {
                if let Err(e) = self.config.validate() {
                    self.record_error(&e);
                    return (SessionState::Idle { preview }, Err(e));
                }

                preview.stop().await;

                match CaptureSession::start(self.config, self.capture_context()) {
                    Ok(capture) => {
                        self.status.send_modify(|s| s.last_error = None);
                        (SessionState::Recording { capture }, Ok(Toggled::Started))
                    }
                    Err(e) => {
                        error!("Failed to start recording: {e}");
                        self.record_error(&e);
                        (
                            SessionState::Idle {
                                preview: self.start_preview(),
                            },
                            Err(e),
                        )
                    }
                }
            }
            SessionState::Recording { capture } => {
                let summary = capture.stop().await;
                let res = self.assemble(summary.config.rate).await;

                let preview = self.start_preview();

                self.status.send_modify(|s| {
                    s.recording = false;
                    s.elapsed = None;
                    s.projected = None;
                    s.frames = 0;
                    match &res {
                        Ok(output) => {
                            s.last_output = Some(output.clone());
                            s.last_error = None;
                        }
                        Err(e) => s.last_error = Some(e.to_string()),
                    }
                });

                if let Err(e) = &res {
                    error!("Failed to assemble video: {e}");
                }

                (
                    SessionState::Idle { preview },
                    res.map(|output| Toggled::Stopped { output }),
                )
            }
            SessionState::ShutDown => (SessionState::ShutDown, Err(RecordingError::ActorStopped)),
        }
    }

    async fn assemble(&self, rate: f64) -> Result<PathBuf, RecordingError> {
        let store = self.store.clone();
        let encoders = self.encoders.clone();
        let output = self.output.clone();

        tokio::task::spawn_blocking(move || {
            let mut store = store.lock();
            assemble(&mut **store, rate, &output, &*encoders)
        })
        .await
        .map_err(RecordingError::encode)?
    }

    fn capture_context(&self) -> CaptureContext {
        CaptureContext {
            source: self.source.clone(),
            store: self.store.clone(),
            sink: self.sink.clone(),
            status: self.status.clone(),
            activity: self.activity.clone(),
        }
    }

    async fn shutdown(&self, state: SessionState) -> SessionState {
        match state {
            SessionState::Idle { preview } => preview.stop().await,
            SessionState::Recording { capture } => {
                let summary = capture.stop().await;
                info!(
                    frames = summary.frames,
                    "Recording stopped by shutdown, frames remain staged"
                );
            }
            SessionState::ShutDown => return SessionState::ShutDown,
        }

        let source = self.source.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || source.lock().close()).await {
            error!("Failed to release camera: {e}");
        }

        self.status.send_modify(|s| {
            s.recording = false;
            s.elapsed = None;
            s.projected = None;
            s.device = None;
        });

        info!("Session shut down");

        SessionState::ShutDown
    }
}
