#![allow(dead_code)]

use lapse_camera::{CameraError, FrameSource};
use lapse_media_info::{Dimensions, RawFrame, VideoInfo};
use lapse_recording::{EncodeError, EncoderFactory, VideoEncoder};
use parking_lot::Mutex;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Once},
};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn solid_frame(dimensions: Dimensions, value: u8) -> RawFrame {
    RawFrame::from_rgb24(
        dimensions.width,
        dimensions.height,
        vec![value; dimensions.rgb24_len()],
    )
    .unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    Open(u32),
    Close(u32),
    OpenFailed(u32),
}

#[derive(Debug)]
pub struct FakeCameraState {
    pub device: Option<u32>,
    pub dimensions: Dimensions,
    pub unavailable: bool,
    pub missing_devices: Vec<u32>,
    pub events: Vec<CameraEvent>,
    /// Times `open` was called while another device was still held.
    pub double_opens: u32,
    pub reads: u64,
}

/// A camera the test can reach into while the session owns it.
#[derive(Clone)]
pub struct FakeCamera {
    state: Arc<Mutex<FakeCameraState>>,
}

impl FakeCamera {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeCameraState {
                device: None,
                dimensions,
                unavailable: false,
                missing_devices: Vec::new(),
                events: Vec::new(),
                double_opens: 0,
                reads: 0,
            })),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn set_dimensions(&self, dimensions: Dimensions) {
        self.state.lock().dimensions = dimensions;
    }

    pub fn remove_device(&self, index: u32) {
        self.state.lock().missing_devices.push(index);
    }

    pub fn events(&self) -> Vec<CameraEvent> {
        self.state.lock().events.clone()
    }

    pub fn device(&self) -> Option<u32> {
        self.state.lock().device
    }

    pub fn double_opens(&self) -> u32 {
        self.state.lock().double_opens
    }

    pub fn boxed(&self) -> Box<dyn FrameSource> {
        Box::new(self.clone())
    }
}

impl FrameSource for FakeCamera {
    fn open(&mut self, index: u32) -> Result<(), CameraError> {
        let mut state = self.state.lock();

        if state.device.is_some() {
            state.double_opens += 1;
        }

        if state.missing_devices.contains(&index) {
            state.events.push(CameraEvent::OpenFailed(index));
            return Err(CameraError::DeviceNotFound(index));
        }

        state.events.push(CameraEvent::Open(index));
        state.device = Some(index);

        Ok(())
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        let mut state = self.state.lock();

        if state.device.is_none() {
            return Err(CameraError::NotOpen);
        }
        if state.unavailable {
            return Err(CameraError::Unavailable("scripted".to_string()));
        }

        state.reads += 1;
        Ok(solid_frame(state.dimensions, state.reads as u8))
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if let Some(device) = state.device.take() {
            state.events.push(CameraEvent::Close(device));
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().device.is_some()
    }

    fn device(&self) -> Option<u32> {
        self.state.lock().device
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub info: Option<VideoInfo>,
    pub frames: Vec<Dimensions>,
    pub finished: bool,
}

impl EncodedVideo {
    pub fn duration_secs(&self) -> f64 {
        let rate = self.info.map(|i| i.frame_rate).unwrap_or(1.0);
        self.frames.len() as f64 / rate
    }
}

/// Records what would have been encoded. `create` writes an empty file so
/// cleanup of partial output can be observed.
#[derive(Clone, Default)]
pub struct RecordingEncoders {
    pub videos: Arc<Mutex<Vec<EncodedVideo>>>,
    pub fail_at_frame: Option<usize>,
    pub fail_create: bool,
}

impl RecordingEncoders {
    pub fn failing_to_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn failing_at(frame: usize) -> Self {
        Self {
            fail_at_frame: Some(frame),
            ..Default::default()
        }
    }

    pub fn videos(&self) -> Vec<EncodedVideo> {
        self.videos.lock().clone()
    }
}

struct RecordingEncoder {
    videos: Arc<Mutex<Vec<EncodedVideo>>>,
    index: usize,
    fail_at_frame: Option<usize>,
}

impl EncoderFactory for RecordingEncoders {
    fn create(&self, path: &Path, info: VideoInfo) -> Result<Box<dyn VideoEncoder>, EncodeError> {
        if self.fail_create {
            return Err("output directory is read-only".into());
        }

        std::fs::write(path, b"")?;

        let mut videos = self.videos.lock();
        videos.push(EncodedVideo {
            path: path.to_path_buf(),
            info: Some(info),
            ..Default::default()
        });

        Ok(Box::new(RecordingEncoder {
            videos: self.videos.clone(),
            index: videos.len() - 1,
            fail_at_frame: self.fail_at_frame,
        }))
    }
}

impl VideoEncoder for RecordingEncoder {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), EncodeError> {
        let mut videos = self.videos.lock();
        let video = &mut videos[self.index];

        if self.fail_at_frame == Some(video.frames.len()) {
            return Err("disk full".into());
        }

        video.frames.push(frame.dimensions());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), EncodeError> {
        self.videos.lock()[self.index].finished = true;
        Ok(())
    }
}

pub fn staged_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("frame_"))
        .collect();
    names.sort();
    names
}
