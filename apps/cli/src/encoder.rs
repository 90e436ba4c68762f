use lapse_enc_ffmpeg::MP4File;
use lapse_media_info::{RawFrame, VideoInfo};
use lapse_recording::{EncodeError, EncoderFactory, VideoEncoder};
use std::path::Path;

/// Writes assembled timelapses as MP4 through ffmpeg.
pub struct Mp4Encoders;

impl EncoderFactory for Mp4Encoders {
    fn create(&self, path: &Path, info: VideoInfo) -> Result<Box<dyn VideoEncoder>, EncodeError> {
        Ok(Box::new(Mp4Encoder(MP4File::init(path, info)?)))
    }
}

struct Mp4Encoder(MP4File);

impl VideoEncoder for Mp4Encoder {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), EncodeError> {
        Ok(self.0.queue_video_frame(frame)?)
    }

    fn finish(mut self: Box<Self>) -> Result<(), EncodeError> {
        Ok(self.0.finish()?)
    }
}
