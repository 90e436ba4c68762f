use flume::{Receiver, Sender};
use lapse_media_info::{Dimensions, RawFrame};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
};
use std::{
    thread::{self, JoinHandle},
    time::SystemTime,
};
use tracing::{debug, error, info, trace, warn};

use crate::{CameraError, CameraInfo, FrameSource};

enum CameraControl {
    Open(u32, Sender<Result<(), CameraError>>),
    Read(Sender<Result<RawFrame, CameraError>>),
    Close(Sender<()>),
    Shutdown,
}

pub fn list_cameras() -> Result<Vec<CameraInfo>, CameraError> {
    let cameras =
        nokhwa::query(ApiBackend::Auto).map_err(|e| CameraError::Unavailable(e.to_string()))?;

    Ok(cameras
        .into_iter()
        .filter_map(|info| match info.index() {
            CameraIndex::Index(index) => Some(CameraInfo::new(*index, info.human_name())),
            CameraIndex::String(_) => None,
        })
        .collect())
}

/// A physical camera.
///
/// The nokhwa camera is not `Send`, so it lives on a dedicated thread and is
/// driven through a control channel. Each request blocks until the camera
/// thread replies.
pub struct NativeCamera {
    control: Sender<CameraControl>,
    device: Option<u32>,
    thread: Option<JoinHandle<()>>,
}

impl NativeCamera {
    pub fn new() -> Self {
        let (control, control_rx) = flume::unbounded();

        let thread = thread::Builder::new()
            .name("lapse-camera".to_string())
            .spawn(move || run_camera_thread(control_rx))
            .inspect_err(|e| error!("Failed to spawn camera thread: {e}"))
            .ok();

        Self {
            control,
            device: None,
            thread,
        }
    }

    fn request<T>(
        &self,
        message: impl FnOnce(Sender<T>) -> CameraControl,
    ) -> Result<T, CameraError> {
        let (tx, rx) = flume::bounded(1);
        self.control
            .send(message(tx))
            .map_err(|_| CameraError::Disconnected)?;
        rx.recv().map_err(|_| CameraError::Disconnected)
    }
}

impl Default for NativeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for NativeCamera {
    fn open(&mut self, index: u32) -> Result<(), CameraError> {
        self.device = None;
        self.request(|tx| CameraControl::Open(index, tx))??;
        self.device = Some(index);
        Ok(())
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        self.request(CameraControl::Read)?
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            self.request(CameraControl::Close).ok();
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn device(&self) -> Option<u32> {
        self.device
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        let _ = self.control.send(CameraControl::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Camera thread panicked");
        }
    }
}

fn run_camera_thread(control: Receiver<CameraControl>) {
    let mut camera: Option<(u32, Camera)> = None;

    while let Ok(message) = control.recv() {
        match message {
            CameraControl::Open(index, reply) => {
                release(&mut camera);
                let result = open_camera(index).map(|opened| {
                    camera = Some((index, opened));
                });
                reply.send(result).ok();
            }
            CameraControl::Read(reply) => {
                let result = match camera.as_mut() {
                    Some((_, camera)) => read_frame(camera),
                    None => Err(CameraError::NotOpen),
                };
                reply.send(result).ok();
            }
            CameraControl::Close(reply) => {
                release(&mut camera);
                reply.send(()).ok();
            }
            CameraControl::Shutdown => {
                trace!("Camera shutdown requested");
                break;
            }
        }
    }

    release(&mut camera);
    info!("Camera thread stopping");
}

fn open_camera(index: u32) -> Result<Camera, CameraError> {
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

    let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
        CameraError::Open {
            index,
            reason: e.to_string(),
        }
    })?;

    camera.open_stream().map_err(|e| CameraError::Open {
        index,
        reason: e.to_string(),
    })?;

    debug!(index, format = ?camera.camera_format(), "Opened camera");

    Ok(camera)
}

fn read_frame(camera: &mut Camera) -> Result<RawFrame, CameraError> {
    let buffer = camera
        .frame()
        .map_err(|e| CameraError::Unavailable(e.to_string()))?;
    let captured_at = SystemTime::now();

    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::Unavailable(e.to_string()))?;
    let dimensions = Dimensions::new(decoded.width(), decoded.height());

    Ok(RawFrame::new(dimensions, decoded.into_raw(), captured_at)?)
}

fn release(camera: &mut Option<(u32, Camera)>) {
    if let Some((index, mut camera)) = camera.take() {
        if let Err(e) = camera.stop_stream() {
            warn!(index, "Failed to stop camera stream: {e}");
        }
        debug!(index, "Released camera");
    }
}
