use ffmpeg::{
    Dictionary, Rational,
    codec::{self, codec::Codec, context, encoder},
    format::{self, Pixel},
    frame,
    software::scaling,
    threading::Config,
};
use lapse_media_info::{Dimensions, RawFrame, VideoInfo};
use tracing::{debug, info};

use crate::base::EncoderBase;

pub struct H264EncoderBuilder {
    input_config: VideoInfo,
}

#[derive(thiserror::Error, Debug)]
pub enum H264EncoderError {
    #[error("{0:?}")]
    FFmpeg(#[from] ffmpeg::Error),
    #[error("Codec not found")]
    CodecNotFound,
    #[error("Frame rate {0} cannot be encoded")]
    InvalidFrameRate(f64),
    #[error("Frame size {0} cannot be encoded")]
    InvalidDimensions(Dimensions),
}

#[derive(thiserror::Error, Debug)]
pub enum QueueFrameError {
    #[error("Frame is {found}, encoder expects {expected}")]
    DimensionMismatch {
        expected: Dimensions,
        found: Dimensions,
    },
    #[error("Converter/{0}")]
    Converter(ffmpeg::Error),
    #[error("Encode/{0}")]
    Encode(ffmpeg::Error),
}

impl H264EncoderBuilder {
    pub const QUALITY_BPP: f32 = 0.3;

    pub fn new(input_config: VideoInfo) -> Self {
        Self { input_config }
    }

    /// Frames keep their input size unless a side is odd, in which case it
    /// is scaled down to the nearest even value.
    pub fn build(
        self,
        output: &mut format::context::Output,
    ) -> Result<H264Encoder, H264EncoderError> {
        let input = self.input_config.dimensions;
        if input.is_empty() {
            return Err(H264EncoderError::InvalidDimensions(input));
        }

        let frame_rate = frame_rate_rational(self.input_config.frame_rate)?;
        let time_base = frame_rate.invert();
        let encoded = input.ensure_even();

        let (codec, encoder_options) = get_codec_and_options(frame_rate)
            .ok_or(H264EncoderError::CodecNotFound)?;

        let mut encoder_ctx = context::Context::new_with_codec(codec);

        encoder_ctx.set_threading(Config::count(4));
        let mut encoder = encoder_ctx.encoder().video()?;

        encoder.set_width(encoded.width);
        encoder.set_height(encoded.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(frame_rate));

        let bitrate = get_bitrate(
            encoded.width,
            encoded.height,
            self.input_config.frame_rate as f32,
            Self::QUALITY_BPP,
        );

        encoder.set_bit_rate(bitrate);
        encoder.set_max_bit_rate(bitrate);

        if output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER)
        {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open_with(encoder_options)?;

        let mut output_stream = output.add_stream(codec)?;
        let stream_index = output_stream.index();
        output_stream.set_time_base(time_base);
        output_stream.set_rate(frame_rate);
        output_stream.set_parameters(&encoder);

        let converter = scaling::Context::get(
            Pixel::RGB24,
            input.width,
            input.height,
            Pixel::YUV420P,
            encoded.width,
            encoded.height,
            scaling::Flags::BILINEAR,
        )?;

        if encoded != input {
            debug!("Scaling {input} frames to {encoded} for encoding");
        }

        info!(
            codec = codec.name(),
            size = %encoded,
            frame_rate = %frame_rate,
            bitrate,
            "Prepared video encoder"
        );

        Ok(H264Encoder {
            base: EncoderBase::new(stream_index),
            encoder,
            input,
            converter,
            next_pts: 0,
        })
    }
}

/// Encodes RGB24 frames at a constant frame rate. Each queued frame lasts
/// exactly one frame interval.
pub struct H264Encoder {
    base: EncoderBase,
    encoder: encoder::Video,
    input: Dimensions,
    converter: scaling::Context,
    next_pts: i64,
}

impl H264Encoder {
    pub fn builder(input_config: VideoInfo) -> H264EncoderBuilder {
        H264EncoderBuilder::new(input_config)
    }

    pub fn frames_queued(&self) -> u64 {
        self.next_pts as u64
    }

    pub fn queue_frame(
        &mut self,
        frame: &RawFrame,
        output: &mut format::context::Output,
    ) -> Result<(), QueueFrameError> {
        if frame.dimensions() != self.input {
            return Err(QueueFrameError::DimensionMismatch {
                expected: self.input,
                found: frame.dimensions(),
            });
        }

        let rgb = wrap_rgb24(frame);

        let mut converted = frame::Video::empty();
        self.converter
            .run(&rgb, &mut converted)
            .map_err(QueueFrameError::Converter)?;
        converted.set_pts(Some(self.next_pts));

        self.base
            .send_frame(&converted, output, &mut self.encoder)
            .map_err(QueueFrameError::Encode)?;

        self.next_pts += 1;

        Ok(())
    }

    pub fn finish(&mut self, output: &mut format::context::Output) -> Result<(), ffmpeg::Error> {
        self.base.process_eof(output, &mut self.encoder)
    }
}

fn wrap_rgb24(frame: &RawFrame) -> frame::Video {
    let mut video = frame::Video::new(Pixel::RGB24, frame.width(), frame.height());

    let src_stride = frame.stride();
    let dst_stride = video.stride(0);
    let data = video.data_mut(0);

    for (line, src) in frame.data().chunks_exact(src_stride).enumerate() {
        let dst_start = line * dst_stride;
        data[dst_start..dst_start + src_stride].copy_from_slice(src);
    }

    video
}

/// Frame rates are kept to millihertz precision so the time base stays small
/// enough for every supported codec.
pub fn frame_rate_rational(frame_rate: f64) -> Result<Rational, H264EncoderError> {
    let millis = (frame_rate * 1000.0).round();
    if !frame_rate.is_finite() || millis < 1.0 || millis > i32::MAX as f64 {
        return Err(H264EncoderError::InvalidFrameRate(frame_rate));
    }

    Ok(Rational::new(millis as i32, 1000).reduce())
}

fn get_codec_and_options(frame_rate: Rational) -> Option<(Codec, Dictionary<'static>)> {
    if let Some(codec) = encoder::find_by_name("libx264") {
        let mut options = Dictionary::new();

        let keyframe_interval = (2.0 * f64::from(frame_rate)).ceil().max(1.0) as i64;
        let keyframe_interval_str = keyframe_interval.to_string();

        options.set("preset", "medium");
        options.set("g", &keyframe_interval_str);
        options.set("keyint_min", &keyframe_interval_str);

        return Some((codec, options));
    }

    debug!("libx264 unavailable, falling back to MPEG-4 Part 2");

    encoder::find(codec::Id::MPEG4).map(|codec| (codec, Dictionary::new()))
}

fn get_bitrate(width: u32, height: u32, frame_rate: f32, bpp: f32) -> usize {
    // higher frame rates don't really need double the bitrate
    let frame_rate_multiplier = (frame_rate - 30.0).max(0.0) * 0.6 + 30.0;
    let pixels_per_second = (width * height) as f32 * frame_rate_multiplier;

    (pixels_per_second * bpp) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_rational_reduces() {
        let rate = frame_rate_rational(10.0).unwrap();
        assert_eq!((rate.numerator(), rate.denominator()), (10, 1));

        let rate = frame_rate_rational(29.97).unwrap();
        assert_eq!((rate.numerator(), rate.denominator()), (2997, 100));

        let rate = frame_rate_rational(0.5).unwrap();
        assert_eq!((rate.numerator(), rate.denominator()), (1, 2));
    }

    #[test]
    fn frame_rate_rational_rejects_degenerate_rates() {
        assert!(frame_rate_rational(0.0).is_err());
        assert!(frame_rate_rational(-5.0).is_err());
        assert!(frame_rate_rational(f64::NAN).is_err());
        assert!(frame_rate_rational(f64::INFINITY).is_err());
    }
}
