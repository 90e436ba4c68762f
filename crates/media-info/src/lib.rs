use std::{fmt, time::SystemTime};

/// Frames are always carried as packed RGB24.
pub const RGB24_BYTES_PER_PIXEL: usize = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn rgb24_len(&self) -> usize {
        self.width as usize * self.height as usize * RGB24_BYTES_PER_PIXEL
    }

    /// Largest size with the same aspect ratio that fits inside `bounds`.
    pub fn fit_within(&self, bounds: Dimensions) -> Dimensions {
        if self.is_empty() || bounds.is_empty() {
            return bounds;
        }

        let (w, h) = (self.width as u64, self.height as u64);
        let (bw, bh) = (bounds.width as u64, bounds.height as u64);

        // integer cross-multiplication keeps exact ratios from rounding down
        let (width, height) = if bw * h <= bh * w {
            (bw, h * bw / w)
        } else {
            (w * bh / h, bh)
        };

        Dimensions {
            width: (width as u32).max(1),
            height: (height as u32).max(1),
        }
    }

    pub fn ensure_even(&self) -> Dimensions {
        Dimensions {
            width: ensure_even(self.width),
            height: ensure_even(self.height),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Frame has no pixels ({0})")]
    Empty(Dimensions),
    #[error("Expected {expected} bytes for a {dimensions} RGB24 frame, got {actual}")]
    BufferSize {
        dimensions: Dimensions,
        expected: usize,
        actual: usize,
    },
}

/// A single RGB24 image together with the wall-clock time it was captured.
#[derive(Clone)]
pub struct RawFrame {
    dimensions: Dimensions,
    data: Vec<u8>,
    captured_at: SystemTime,
}

impl RawFrame {
    pub fn new(
        dimensions: Dimensions,
        data: Vec<u8>,
        captured_at: SystemTime,
    ) -> Result<Self, FrameError> {
        if dimensions.is_empty() {
            return Err(FrameError::Empty(dimensions));
        }

        let expected = dimensions.rgb24_len();
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                dimensions,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            dimensions,
            data,
            captured_at,
        })
    }

    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(Dimensions::new(width, height), data, SystemTime::now())
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn stride(&self) -> usize {
        self.dimensions.width as usize * RGB24_BYTES_PER_PIXEL
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("dimensions", &self.dimensions)
            .field("bytes", &self.data.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Size and constant frame rate of a video being written.
///
/// `dimensions` is the size of the frames handed to the encoder. YUV420P
/// output needs even sides, so the written video is
/// [`Dimensions::ensure_even`] of it: a 33x17 frame becomes a 32x16 video.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VideoInfo {
    pub dimensions: Dimensions,
    pub frame_rate: f64,
}

impl VideoInfo {
    pub fn new(dimensions: Dimensions, frame_rate: f64) -> Self {
        Self {
            dimensions,
            frame_rate,
        }
    }
}

pub fn ensure_even(value: u32) -> u32 {
    let adjusted = value - (value % 2);
    if adjusted == 0 { 2 } else { adjusted }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        let frame = Dimensions::new(1920, 1080);

        assert_eq!(
            frame.fit_within(Dimensions::new(800, 600)),
            Dimensions::new(800, 450)
        );
        assert_eq!(
            frame.fit_within(Dimensions::new(400, 1000)),
            Dimensions::new(400, 225)
        );
    }

    #[test]
    fn fit_within_upscales_small_frames() {
        let frame = Dimensions::new(320, 240);

        assert_eq!(
            frame.fit_within(Dimensions::new(640, 480)),
            Dimensions::new(640, 480)
        );
    }

    #[test]
    fn raw_frame_rejects_wrong_buffer_size() {
        let err = RawFrame::from_rgb24(4, 4, vec![0; 10]).unwrap_err();

        assert!(matches!(
            err,
            FrameError::BufferSize {
                expected: 48,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn raw_frame_rejects_empty_dimensions() {
        assert!(matches!(
            RawFrame::from_rgb24(0, 4, vec![]),
            Err(FrameError::Empty(_))
        ));
    }

    #[test]
    fn ensure_even_rounds_down() {
        assert_eq!(ensure_even(641), 640);
        assert_eq!(ensure_even(480), 480);
        assert_eq!(ensure_even(1), 2);
    }
}
