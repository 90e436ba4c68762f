use image::{
    ExtendedColorType, ImageEncoder,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use lapse_media_info::{Dimensions, RawFrame};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};
use tracing::{debug, info, trace, warn};

use crate::{FrameStore, FrameStoreError};

const FILE_PREFIX: &str = "frame_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum StagingFormat {
    #[default]
    Jpeg,
    Png,
}

impl StagingFormat {
    pub const JPEG_QUALITY: u8 = 90;

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

impl FromStr for StagingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("Unknown staging format '{s}'"))
    }
}

/// Stages frames as individual image files named by zero-padded index
/// (`frame_00000.jpg`, `frame_00001.jpg`, ...).
#[derive(Debug)]
pub struct DiskFrameStore {
    dir: PathBuf,
    format: StagingFormat,
    frames: Vec<PathBuf>,
}

impl DiskFrameStore {
    /// Opens `dir` as a staging directory, creating it if needed. Frames
    /// already staged there are picked up in index order.
    pub fn open(dir: impl Into<PathBuf>, format: StagingFormat) -> Result<Self, FrameStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let frames = scan_frames(&dir)?;
        if !frames.is_empty() {
            info!(
                dir = %dir.display(),
                frames = frames.len(),
                "Found previously staged frames"
            );
        }

        Ok(Self {
            dir,
            format,
            frames,
        })
    }

    pub fn file_name(index: u32, format: StagingFormat) -> String {
        format!("{FILE_PREFIX}{index:05}.{}", format.extension())
    }

    fn path(&self, index: u32) -> Result<&PathBuf, FrameStoreError> {
        self.frames
            .get(index as usize)
            .ok_or(FrameStoreError::OutOfRange(index))
    }
}

impl FrameStore for DiskFrameStore {
    fn append(&mut self, frame: &RawFrame) -> Result<u32, FrameStoreError> {
        let index = self.len();
        let path = self.dir.join(Self::file_name(index, self.format));

        if let Err(e) = write_image(&path, frame, self.format) {
            std::fs::remove_file(&path).ok();
            return Err(e);
        }

        trace!(index, path = %path.display(), "Staged frame");
        self.frames.push(path);

        Ok(index)
    }

    fn read(&self, index: u32) -> Result<RawFrame, FrameStoreError> {
        let path = self.path(index)?;

        let image = image::open(path)?.into_rgb8();
        let captured_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        let dimensions = Dimensions::new(image.width(), image.height());

        Ok(RawFrame::new(dimensions, image.into_raw(), captured_at)?)
    }

    fn dimensions(&self, index: u32) -> Result<Dimensions, FrameStoreError> {
        let (width, height) = image::image_dimensions(self.path(index)?)?;
        Ok(Dimensions::new(width, height))
    }

    fn len(&self) -> u32 {
        self.frames.len() as u32
    }

    fn clear(&mut self) -> Result<(), FrameStoreError> {
        self.frames.clear();

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if parse_frame_index(&path).is_none() {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), "Failed to remove staged frame: {e}");
                    return Err(e.into());
                }
            }
        }

        debug!(dir = %self.dir.display(), removed, "Cleared staging directory");

        Ok(())
    }
}

fn write_image(path: &Path, frame: &RawFrame, format: StagingFormat) -> Result<(), FrameStoreError> {
    let mut writer = BufWriter::new(File::create(path)?);

    match format {
        StagingFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut writer, StagingFormat::JPEG_QUALITY).write_image(
                frame.data(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )?
        }
        StagingFormat::Png => PngEncoder::new(&mut writer).write_image(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?,
    }

    writer.flush()?;

    Ok(())
}

fn parse_frame_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let (stem, extension) = name.strip_prefix(FILE_PREFIX)?.rsplit_once('.')?;

    StagingFormat::from_extension(extension)?;

    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    stem.parse().ok()
}

fn scan_frames(dir: &Path) -> Result<Vec<PathBuf>, FrameStoreError> {
    let mut indexed: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter_map(|path| parse_frame_index(&path).map(|index| (index, path)))
        .collect();

    indexed.sort_by_key(|(index, _)| *index);

    for (expected, (index, _)) in indexed.iter().enumerate() {
        if *index != expected as u32 {
            return Err(FrameStoreError::Gap(expected as u32));
        }
    }

    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}
