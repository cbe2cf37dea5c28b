use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::detection::{DetectorSettings, FrameConstraints};
use crate::error::AppError;
use crate::scan::DEFAULT_DETECTION_THRESHOLD;

pub const ENV_PREFIX: &str = "HANDSCAN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub detection_threshold: u32,
    pub reveal_delay_ms: u64,
    pub analysis_timeout_ms: Option<u64>,
    pub event_buffer_size: usize,
    pub reveal_asset: PathBuf,
    pub log_level: String,
    pub camera: FrameConstraints,
    pub detector: DetectorSettings,
    pub simulation: SimulationSettings,
}

/// Knobs for the simulated camera and detector used by the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationSettings {
    pub frame_rate: u32,
    pub hand_presence: f64,
    pub failure_rate: f64,
    pub load_delay_ms: u64,
    pub seed: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            reveal_delay_ms: 500,
            analysis_timeout_ms: Some(2000),
            event_buffer_size: 64,
            reveal_asset: PathBuf::from("assets/prediction.mp4"),
            log_level: "info".to_string(),
            camera: FrameConstraints::default(),
            detector: DetectorSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            hand_presence: 0.9,
            failure_rate: 0.01,
            load_delay_ms: 250,
            seed: 42,
        }
    }
}

impl Configuration {
    /// Loads defaults, then `path` if given, then `HANDSCAN_*` environment
    /// variables. Nested keys use `__`, e.g. `HANDSCAN_DETECTOR__MAX_HANDS`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, AppError> {
        let configuration: Configuration = builder.build()?.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.detection_threshold == 0 {
            return Err(AppError::InvalidConfig(
                "detection_threshold must be greater than zero".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(AppError::InvalidConfig(
                "event_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.detector.max_hands == 0 {
            return Err(AppError::InvalidConfig(
                "detector.max_hands must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            (
                "detector.min_detection_confidence",
                self.detector.min_detection_confidence,
            ),
            (
                "detector.min_tracking_confidence",
                self.detector.min_tracking_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(AppError::InvalidConfig(
                "camera dimensions must be non-zero".to_string(),
            ));
        }
        if self.simulation.frame_rate == 0 {
            return Err(AppError::InvalidConfig(
                "simulation.frame_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn threshold(&self) -> Result<NonZeroU32, AppError> {
        NonZeroU32::new(self.detection_threshold).ok_or_else(|| {
            AppError::InvalidConfig("detection_threshold must be greater than zero".to_string())
        })
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn analysis_timeout(&self) -> Option<Duration> {
        self.analysis_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_are_valid() {
        let configuration = Configuration::default();
        configuration.validate().unwrap();
        assert_eq!(configuration.threshold().unwrap().get(), 30);
        assert_eq!(configuration.reveal_delay(), Duration::from_millis(500));
        assert_eq!(configuration.detector.max_hands, 2);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let configuration = Configuration {
            detection_threshold: 0,
            ..Configuration::default()
        };
        assert!(matches!(
            configuration.validate(),
            Err(AppError::InvalidConfig(_))
        ));
        assert!(configuration.threshold().is_err());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut configuration = Configuration::default();
        configuration.detector.min_tracking_confidence = 1.5;
        let err = configuration.validate().unwrap_err();
        assert!(err.to_string().contains("min_tracking_confidence"));
    }

    #[test]
    fn file_values_override_defaults() {
        let toml = r#"
            detection_threshold = 12
            analysis_timeout_ms = 750
            reveal_asset = "media/result.webm"

            [detector]
            max_hands = 1
            model_complexity = "lite"

            [camera]
            facing_mode = "environment"
        "#;
        let builder = config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        let configuration = Configuration::from_builder(builder).unwrap();

        assert_eq!(configuration.detection_threshold, 12);
        assert_eq!(
            configuration.analysis_timeout(),
            Some(Duration::from_millis(750))
        );
        assert_eq!(configuration.reveal_asset, PathBuf::from("media/result.webm"));
        assert_eq!(configuration.detector.max_hands, 1);
        assert_eq!(
            configuration.detector.model_complexity,
            crate::detection::ModelComplexity::Lite
        );
        // untouched nested fields keep their defaults
        assert_eq!(configuration.detector.min_detection_confidence, 0.5);
        assert_eq!(configuration.camera.width, 1280);
        assert_eq!(
            configuration.camera.facing_mode,
            crate::detection::FacingMode::Environment
        );
        assert_eq!(configuration.reveal_delay_ms, 500);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let builder = config::Config::builder()
            .add_source(File::from_str("detection_threshold = 0", FileFormat::Toml));
        assert!(matches!(
            Configuration::from_builder(builder),
            Err(AppError::InvalidConfig(_))
        ));
    }
}
