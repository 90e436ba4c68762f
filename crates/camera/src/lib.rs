use lapse_media_info::{FrameError, RawFrame};
use std::fmt::{Debug, Display};

#[cfg(feature = "native")]
mod native;
#[cfg(feature = "native")]
pub use native::*;

mod synthetic;
pub use synthetic::*;

#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    index: u32,
    display_name: String,
}

impl CameraInfo {
    pub fn new(index: u32, display_name: impl Into<String>) -> Self {
        Self {
            index,
            display_name: display_name.into(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl Display for CameraInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.index, self.display_name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("No camera is open")]
    NotOpen,
    #[error("Camera {0} not found")]
    DeviceNotFound(u32),
    #[error("Failed to open camera {index}: {reason}")]
    Open { index: u32, reason: String },
    #[error("Frame unavailable: {0}")]
    Unavailable(String),
    #[error("Camera thread has stopped")]
    Disconnected,
    #[error("Frame/{0}")]
    Frame(#[from] FrameError),
}

/// A camera that produces frames on demand.
///
/// At most one device handle is held at a time: `open` releases the current
/// handle before acquiring the new one. A failed `read` is never fatal, the
/// caller is expected to skip the tick and try again later.
pub trait FrameSource: Send {
    fn open(&mut self, index: u32) -> Result<(), CameraError>;

    fn read(&mut self) -> Result<RawFrame, CameraError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Index of the currently open device.
    fn device(&self) -> Option<u32>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn open(&mut self, index: u32) -> Result<(), CameraError> {
        (**self).open(index)
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        (**self).read()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn device(&self) -> Option<u32> {
        (**self).device()
    }
}

impl Debug for dyn FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("device", &self.device())
            .finish()
    }
}
