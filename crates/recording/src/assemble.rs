use lapse_frame_store::FrameStore;
use lapse_media_info::{Dimensions, RawFrame, VideoInfo};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{EncodeError, RecordingError};

/// A video file being written one frame at a time.
pub trait VideoEncoder: Send {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), EncodeError>;

    fn finish(self: Box<Self>) -> Result<(), EncodeError>;
}

pub trait EncoderFactory: Send + Sync {
    /// Creates the output file at `path`. Every frame passed to the returned
    /// encoder has `info.dimensions`.
    fn create(&self, path: &Path, info: VideoInfo) -> Result<Box<dyn VideoEncoder>, EncodeError>;
}

/// Encodes every staged frame, in index order, into `output` at `rate`
/// frames per second.
///
/// All frames must share the dimensions of frame 0; this is checked before
/// the output is created. On success the store is cleared. If writing fails
/// after the encoder was created, the partial output is removed. An existing
/// file at `output` is left alone when the encoder cannot be created. The
/// store is never touched on failure, so the frames can be assembled again.
///
/// The video takes the size of frame 0. Encoders that need even dimensions
/// may round it, see [`VideoInfo`].
pub fn assemble(
    store: &mut dyn FrameStore,
    rate: f64,
    output: &Path,
    encoders: &dyn EncoderFactory,
) -> Result<PathBuf, RecordingError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(RecordingError::InvalidConfig(format!(
            "frame rate must be a positive number, got {rate}"
        )));
    }

    if store.is_empty() {
        return Err(RecordingError::EmptyCapture);
    }

    let frame_count = store.len();
    let expected = store.dimensions(0).map_err(RecordingError::encode)?;

    for index in 1..frame_count {
        let found = store.dimensions(index).map_err(RecordingError::encode)?;
        if found != expected {
            return Err(RecordingError::DimensionMismatch {
                index,
                expected,
                found,
            });
        }
    }

    info!(
        frames = frame_count,
        size = %expected,
        rate,
        output = %output.display(),
        "Assembling video"
    );

    let encoder = encoders
        .create(output, VideoInfo::new(expected, rate))
        .map_err(RecordingError::EncodeFailure)?;

    if let Err(e) = write_frames(store, encoder, expected) {
        remove_partial_output(output);
        return Err(e);
    }

    if let Err(e) = store.clear() {
        warn!("Video was written but staged frames could not be removed: {e}");
    }

    info!(output = %output.display(), "Timelapse video saved");

    Ok(output.to_path_buf())
}

fn write_frames(
    store: &dyn FrameStore,
    mut encoder: Box<dyn VideoEncoder>,
    expected: Dimensions,
) -> Result<(), RecordingError> {
    for index in 0..store.len() {
        let frame = store.read(index).map_err(RecordingError::encode)?;
        if frame.dimensions() != expected {
            return Err(RecordingError::DimensionMismatch {
                index,
                expected,
                found: frame.dimensions(),
            });
        }

        encoder
            .write_frame(&frame)
            .map_err(RecordingError::EncodeFailure)?;
    }

    encoder.finish().map_err(RecordingError::EncodeFailure)
}

fn remove_partial_output(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => debug!(output = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), "Failed to remove partial output: {e}"),
    }
}
