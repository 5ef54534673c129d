use crate::error::{Result, TrackerError};
use crate::identity::parse_code_set;
use crate::types::{Config, IdentityConfig, TrackingConfig};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracking.validate()?;
        self.identity.validate()?;
        if self.framerate.sample_count < 2 {
            return Err(TrackerError::InvalidConfig(format!(
                "framerate.sample_count must be at least 2, got {}",
                self.framerate.sample_count
            )));
        }
        Ok(())
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("decay_factor", self.decay_factor),
            ("max_pixel_shift_x", self.max_pixel_shift_x),
            ("max_pixel_shift_y", self.max_pixel_shift_y),
            ("initial_framerate", self.initial_framerate),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackerError::InvalidConfig(format!(
                    "tracking.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.polynomial_order == 0 {
            return Err(TrackerError::InvalidConfig(
                "tracking.polynomial_order must be at least 1".to_string(),
            ));
        }
        if !(self.prediction_margin.is_finite() && self.prediction_margin >= 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "tracking.prediction_margin must be non-negative, got {}",
                self.prediction_margin
            )));
        }
        if !(self.buffer_growth_factor.is_finite() && self.buffer_growth_factor > 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "tracking.buffer_growth_factor must exceed 1, got {}",
                self.buffer_growth_factor
            )));
        }
        if !(self.confidence_percent > 0.0 && self.confidence_percent < 100.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "tracking.confidence_percent must lie in (0, 100), got {}",
                self.confidence_percent
            )));
        }
        Ok(())
    }
}

impl IdentityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_match_ratio > 0.0 && self.min_match_ratio <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "identity.min_match_ratio must lie in (0, 1], got {}",
                self.min_match_ratio
            )));
        }
        self.parse_sequences().map(|_| ())
    }

    /// Decode the textual codes into boolean sequences.
    pub fn parse_sequences(&self) -> Result<Vec<Vec<bool>>> {
        parse_code_set(&self.sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
tracking:
  decay_factor: 0.5
  polynomial_order: 1
  max_pixel_shift_x: 2
  max_pixel_shift_y: 2
  prediction_margin: 0.0
  buffer_growth_factor: 3
identity:
  sequences: ["1010", "1100"]
debug:
  visual_debug: true
"#;

    #[test]
    fn test_load_sample_config() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.tracking.polynomial_order, 1);
        assert_eq!(config.tracking.max_pixel_shift_x, 2.0);
        // Omitted fields take their defaults
        assert_eq!(config.tracking.confidence_percent, 75.0);
        assert_eq!(config.framerate.sample_count, 30);
        assert!(config.debug.visual_debug);
        assert!(!config.debug.debug);

        let codes = config.identity.parse_sequences().unwrap();
        assert_eq!(codes, vec![vec![true, false, true, false], vec![true, true, false, false]]);
    }

    #[test]
    fn test_empty_code_set_rejected() {
        let yaml = "identity:\n  sequences: []\n";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, TrackerError::EmptyCodeSet), "got {err:?}");
    }

    #[test]
    fn test_ragged_code_set_rejected() {
        let yaml = "identity:\n  sequences: [\"1010\", \"110\"]\n";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(
            matches!(
                err,
                TrackerError::CodeLengthMismatch {
                    index: 1,
                    expected: 4,
                    found: 3
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn test_growth_factor_must_exceed_one() {
        let mut config = TrackingConfig::default();
        config.buffer_growth_factor = 1.0;
        assert!(matches!(
            config.validate(),
            Err(TrackerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_polynomial_order_rejected() {
        let mut config = TrackingConfig::default();
        config.polynomial_order = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/blink_tracker.yaml").unwrap_err();
        assert!(matches!(err, TrackerError::Io(_)));
    }
}
