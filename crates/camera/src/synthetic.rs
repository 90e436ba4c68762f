use lapse_media_info::{Dimensions, RawFrame};
use std::time::SystemTime;
use tracing::debug;

use crate::{CameraError, FrameSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPattern {
    #[default]
    ColorGradient,
    Checkerboard,
    FrameCounter,
    SolidColor {
        r: u8,
        g: u8,
        b: u8,
    },
}

/// Generates test-pattern frames without any hardware.
///
/// Every device index opens successfully. The pattern advances by one step
/// per `read`, so consecutive frames differ.
pub struct SyntheticCamera {
    dimensions: Dimensions,
    pattern: TestPattern,
    device: Option<u32>,
    frame_number: u64,
}

impl SyntheticCamera {
    pub fn new(dimensions: Dimensions, pattern: TestPattern) -> Self {
        Self {
            dimensions,
            pattern,
            device: None,
            frame_number: 0,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(Dimensions::new(640, 480), TestPattern::default())
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self, index: u32) -> Result<(), CameraError> {
        self.close();
        debug!(index, dimensions = %self.dimensions, "Opened synthetic camera");
        self.device = Some(index);
        self.frame_number = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        if self.device.is_none() {
            return Err(CameraError::NotOpen);
        }

        let data = generate_frame(self.dimensions, self.pattern, self.frame_number);
        self.frame_number += 1;

        Ok(RawFrame::new(self.dimensions, data, SystemTime::now())?)
    }

    fn close(&mut self) {
        if let Some(index) = self.device.take() {
            debug!(index, "Closed synthetic camera");
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn device(&self) -> Option<u32> {
        self.device
    }
}

fn generate_frame(dimensions: Dimensions, pattern: TestPattern, frame_number: u64) -> Vec<u8> {
    let width = dimensions.width as usize;
    let height = dimensions.height as usize;
    let mut data = vec![0u8; dimensions.rgb24_len()];
    let phase = (frame_number % 256) as u8;
    let frame_bytes = frame_number.to_le_bytes();

    for (i, pixel) in data.chunks_exact_mut(3).enumerate() {
        let x = i % width;
        let y = i / width;

        let (r, g, b) = match pattern {
            TestPattern::ColorGradient => (
                ((x * 255 / width) as u8).wrapping_add(phase),
                ((y * 255 / height) as u8).wrapping_add(phase),
                (((x + y) * 255 / (width + height)) as u8).wrapping_add(phase),
            ),
            TestPattern::Checkerboard => {
                let square = 32;
                let offset = frame_number as usize;
                if ((x + offset) / square + y / square) % 2 == 0 {
                    (255, 255, 255)
                } else {
                    (0, 0, 0)
                }
            }
            TestPattern::FrameCounter => {
                let intensity = if y < 64 && x < 256 {
                    let byte = frame_bytes[x / 32];
                    if (byte >> ((x % 32) / 4)) & 1 == 1 {
                        255
                    } else {
                        0
                    }
                } else {
                    phase.wrapping_add(((x ^ y) & 0xFF) as u8)
                };
                (intensity, intensity, intensity)
            }
            TestPattern::SolidColor { r, g, b } => (r, g, b),
        };

        pixel[0] = r;
        pixel[1] = g;
        pixel[2] = b;
    }

    data
}
