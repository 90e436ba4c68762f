use lapse_camera::CameraError;
use lapse_frame_store::FrameStoreError;
use lapse_media_info::Dimensions;

pub type EncodeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum RecordingError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(#[from] CameraError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No frames were captured")]
    EmptyCapture,
    #[error("Frame {index} is {found}, expected {expected}")]
    DimensionMismatch {
        index: u32,
        expected: Dimensions,
        found: Dimensions,
    },
    #[error("Failed to encode video: {0}")]
    EncodeFailure(#[source] EncodeError),
    #[error("Failed to prepare frame staging: {0}")]
    Staging(#[source] FrameStoreError),
    #[error("Session controller has stopped")]
    ActorStopped,
}

impl RecordingError {
    pub(crate) fn encode(e: impl Into<EncodeError>) -> Self {
        Self::EncodeFailure(e.into())
    }
}
