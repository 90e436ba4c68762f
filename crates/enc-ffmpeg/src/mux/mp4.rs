use ffmpeg::format;
use lapse_media_info::{RawFrame, VideoInfo};
use std::path::PathBuf;
use tracing::*;

use crate::h264::{H264Encoder, H264EncoderError, QueueFrameError};

/// A constant-frame-rate MP4 file with a single video stream.
pub struct MP4File {
    path: PathBuf,
    output: format::context::Output,
    video: H264Encoder,
    is_finished: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum Mp4Error {
    #[error("Failed to create output file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0:?}")]
    Ffmpeg(ffmpeg::Error),
    #[error("Video/{0}")]
    VideoInit(#[from] H264EncoderError),
    #[error("Video/{0}")]
    Queue(#[from] QueueFrameError),
    #[error("Already finished")]
    AlreadyFinished,
    #[error("Flush/{0}")]
    Flush(ffmpeg::Error),
    #[error("Trailer/{0}")]
    WriteTrailerFailed(ffmpeg::Error),
}

impl MP4File {
    pub fn init(path: impl Into<PathBuf>, video_info: VideoInfo) -> Result<Self, Mp4Error> {
        ffmpeg::init().map_err(Mp4Error::Ffmpeg)?;

        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut output = format::output_as(&path, "mp4").map_err(Mp4Error::Ffmpeg)?;

        trace!("Preparing encoder for mp4 file");

        let video = H264Encoder::builder(video_info).build(&mut output)?;

        // make sure this happens after adding all streams!
        output.write_header().map_err(Mp4Error::Ffmpeg)?;

        info!(path = %path.display(), "Opened mp4 file");

        Ok(Self {
            path,
            output,
            video,
            is_finished: false,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.video.frames_queued()
    }

    pub fn queue_video_frame(&mut self, frame: &RawFrame) -> Result<(), Mp4Error> {
        if self.is_finished {
            return Err(Mp4Error::AlreadyFinished);
        }

        self.video.queue_frame(frame, &mut self.output)?;

        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), Mp4Error> {
        if self.is_finished {
            return Err(Mp4Error::AlreadyFinished);
        }

        self.is_finished = true;

        debug!("MP4File: Flushing video encoder");

        let video_finish = self.video.finish(&mut self.output).inspect_err(|e| {
            error!("Failed to finish video encoder: {e}");
        });

        debug!("MP4File: Writing trailer");
        self.output
            .write_trailer()
            .map_err(Mp4Error::WriteTrailerFailed)?;

        video_finish.map_err(Mp4Error::Flush)?;

        info!(
            path = %self.path.display(),
            frames = self.frames_written(),
            "Finished mp4 file"
        );

        Ok(())
    }
}

impl Drop for MP4File {
    fn drop(&mut self) {
        if !self.is_finished {
            let _ = self.finish();
        }
    }
}

// The ffmpeg contexts are only ever touched by whoever owns the file.
unsafe impl Send for MP4File {}
