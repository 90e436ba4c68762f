use lapse_media_info::{Dimensions, RawFrame};
use std::{fmt, path::PathBuf, time::Duration};

/// Snapshot of everything the control surface displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub recording: bool,
    pub device: Option<u32>,
    /// Wall-clock time since recording started. `None` while idle.
    pub elapsed: Option<Duration>,
    /// Length of the video the captured frames will produce. `None` while idle.
    pub projected: Option<Duration>,
    pub frames: u64,
    pub last_error: Option<String>,
    pub last_output: Option<PathBuf>,
}

impl Status {
    pub fn elapsed_text(&self) -> Option<String> {
        self.elapsed.map(format_mm_ss)
    }

    pub fn projected_text(&self) -> Option<String> {
        self.projected.map(format_mm_ss)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            Some(device) => write!(f, "camera {device}")?,
            None => write!(f, "no camera")?,
        }

        if self.recording {
            write!(
                f,
                " | recording for {} | {} frames | final video length {}",
                self.elapsed_text().unwrap_or_default(),
                self.frames,
                self.projected_text().unwrap_or_default(),
            )?;
        } else {
            write!(f, " | idle")?;
        }

        if let Some(error) = &self.last_error {
            write!(f, " | last error: {error}")?;
        }

        Ok(())
    }
}

/// Formats whole seconds as zero-padded `mm:ss`. Minutes keep counting past 59.
pub fn format_mm_ss(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// The frame currently shown on the display, already scaled to fit it.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub frame: RawFrame,
    pub source_dimensions: Dimensions,
}

impl PreviewFrame {
    pub fn dimensions(&self) -> Dimensions {
        self.frame.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_mm_ss(Duration::ZERO), "00:00");
        assert_eq!(format_mm_ss(Duration::from_millis(300)), "00:00");
        assert_eq!(format_mm_ss(Duration::from_secs(59)), "00:59");
        assert_eq!(format_mm_ss(Duration::from_secs(61)), "01:01");
        assert_eq!(format_mm_ss(Duration::from_secs(3725)), "62:05");
    }

    #[test]
    fn idle_status_has_no_timings() {
        let status = Status::default();
        assert_eq!(status.elapsed_text(), None);
        assert_eq!(status.projected_text(), None);
        assert_eq!(status.to_string(), "no camera | idle");
    }

    #[test]
    fn recording_status_line() {
        let status = Status {
            recording: true,
            device: Some(1),
            elapsed: Some(Duration::from_secs(75)),
            projected: Some(Duration::from_secs(2)),
            frames: 60,
            ..Default::default()
        };

        assert_eq!(
            status.to_string(),
            "camera 1 | recording for 01:15 | 60 frames | final video length 00:02"
        );
    }
}
