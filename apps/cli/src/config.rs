use anyhow::{Context, Result};
use lapse_frame_store::StagingFormat;
use lapse_media_info::Dimensions;
use lapse_recording::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::RecordArgs;

/// Settings read from `--config`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapseConfig {
    pub camera: u32,
    pub interval_secs: f64,
    pub fps: f64,
    pub output: PathBuf,
    pub staging_dir: PathBuf,
    pub staging_format: StagingFormat,
    pub synthetic: bool,
    pub display: DisplayConfig,
}

/// Area the preview is scaled into. Zero means "unknown" and falls back to
/// 640x480.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl Default for LapseConfig {
    fn default() -> Self {
        Self {
            camera: 0,
            interval_secs: CaptureConfig::DEFAULT_INTERVAL.as_secs_f64(),
            fps: CaptureConfig::DEFAULT_RATE,
            output: PathBuf::from("timelapse.mp4"),
            staging_dir: PathBuf::from("timelapse_images"),
            staging_format: StagingFormat::default(),
            synthetic: false,
            display: DisplayConfig::default(),
        }
    }
}

impl LapseConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, args: &RecordArgs) {
        if let Some(camera) = args.camera {
            self.camera = camera;
        }
        if let Some(interval) = args.interval {
            self.interval_secs = interval;
        }
        if let Some(fps) = args.fps {
            self.fps = fps;
        }
        if let Some(output) = &args.output {
            self.output = output.clone();
        }
        if let Some(staging_dir) = &args.staging_dir {
            self.staging_dir = staging_dir.clone();
        }
        if let Some(format) = args.staging_format {
            self.staging_format = format;
        }
        self.synthetic |= args.synthetic;
    }

    pub fn capture(&self) -> Result<CaptureConfig> {
        let interval = Duration::try_from_secs_f64(self.interval_secs)
            .with_context(|| format!("Invalid interval: {}", self.interval_secs))?;

        Ok(CaptureConfig::new(interval, self.fps)?)
    }

    pub fn display(&self) -> Dimensions {
        Dimensions::new(self.display.width, self.display.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: LapseConfig = toml::from_str(
            r#"
            interval_secs = 2.5
            staging_format = "png"

            [display]
            width = 800
            "#,
        )
        .unwrap();

        assert_eq!(config.interval_secs, 2.5);
        assert_eq!(config.fps, 30.0);
        assert_eq!(config.staging_format, StagingFormat::Png);
        assert_eq!(config.output, PathBuf::from("timelapse.mp4"));
        assert_eq!(config.display(), Dimensions::new(800, 0));
    }

    #[test]
    fn flags_override_file() {
        let mut config = LapseConfig {
            fps: 24.0,
            ..Default::default()
        };

        config.apply(&RecordArgs {
            camera: Some(2),
            interval: Some(10.0),
            output: Some(PathBuf::from("out/sunset.mp4")),
            synthetic: true,
            ..Default::default()
        });

        assert_eq!(config.camera, 2);
        assert_eq!(config.interval_secs, 10.0);
        assert_eq!(config.fps, 24.0);
        assert_eq!(config.output, PathBuf::from("out/sunset.mp4"));
        assert!(config.synthetic);

        let capture = config.capture().unwrap();
        assert_eq!(capture.interval, Duration::from_secs(10));
        assert_eq!(capture.rate, 24.0);
    }

    #[test]
    fn invalid_capture_settings_are_rejected() {
        let config = LapseConfig {
            interval_secs: -1.0,
            ..Default::default()
        };
        assert!(config.capture().is_err());

        let config = LapseConfig {
            fps: 0.0,
            ..Default::default()
        };
        assert!(config.capture().is_err());
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lapse.toml");
        std::fs::write(&path, "fps = \"fast\"").unwrap();

        let err = LapseConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("lapse.toml"));
    }
}
