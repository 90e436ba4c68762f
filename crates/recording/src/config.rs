use std::time::Duration;

use crate::RecordingError;

/// Sampling interval and playback rate of a capture session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    pub interval: Duration,
    pub rate: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            rate: Self::DEFAULT_RATE,
        }
    }
}

impl CaptureConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_RATE: f64 = 30.0;

    pub fn new(interval: Duration, rate: f64) -> Result<Self, RecordingError> {
        let config = Self { interval, rate };
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from user-entered text, e.g. `"5"` and `"30"`.
    /// The interval is in (possibly fractional) seconds.
    pub fn parse(interval: &str, rate: &str) -> Result<Self, RecordingError> {
        let interval_secs = parse_positive("interval", interval)?;
        let rate = parse_positive("frame rate", rate)?;

        let interval = Duration::try_from_secs_f64(interval_secs).map_err(|_| {
            RecordingError::InvalidConfig(format!("interval {interval_secs} is out of range"))
        })?;

        Self::new(interval, rate)
    }

    pub fn validate(&self) -> Result<(), RecordingError> {
        if self.interval.is_zero() {
            return Err(RecordingError::InvalidConfig(
                "interval must be greater than zero".to_string(),
            ));
        }

        check_positive("frame rate", self.rate)?;

        Ok(())
    }

    /// Playback length of `frames` frames at this config's rate.
    pub fn projected_duration(&self, frames: u64) -> Duration {
        Duration::from_nanos((frames as f64 * 1e9 / self.rate).round() as u64)
    }
}

fn parse_positive(name: &str, value: &str) -> Result<f64, RecordingError> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordingError::InvalidConfig(format!("{name} '{value}' is not a number")))?;

    check_positive(name, parsed)?;

    Ok(parsed)
}

fn check_positive(name: &str, value: f64) -> Result<(), RecordingError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RecordingError::InvalidConfig(format!(
            "{name} must be a positive number, got {value}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_interval() {
        let config = CaptureConfig::parse(" 0.5 ", "24").unwrap();
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.rate, 24.0);
    }

    #[test]
    fn rejects_non_positive_values() {
        for (interval, rate) in [("0", "30"), ("-1", "30"), ("5", "0"), ("5", "-30")] {
            assert!(
                matches!(
                    CaptureConfig::parse(interval, rate),
                    Err(RecordingError::InvalidConfig(_))
                ),
                "{interval}/{rate} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_numbers() {
        assert!(CaptureConfig::parse("five", "30").is_err());
        assert!(CaptureConfig::parse("5", "").is_err());
        assert!(CaptureConfig::parse("NaN", "30").is_err());
        assert!(CaptureConfig::parse("5", "inf").is_err());
    }

    #[test]
    fn projected_duration_is_frames_over_rate() {
        let config = CaptureConfig::new(Duration::from_secs(1), 10.0).unwrap();
        assert_eq!(config.projected_duration(3), Duration::from_millis(300));
        assert_eq!(config.projected_duration(0), Duration::ZERO);
    }

    #[test]
    fn default_is_valid() {
        CaptureConfig::default().validate().unwrap();
    }
}
