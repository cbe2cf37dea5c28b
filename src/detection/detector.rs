use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Frame, HandLandmarks};
use crate::error::DetectorError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite,
    #[default]
    Full,
}

impl ModelComplexity {
    pub fn as_index(&self) -> u8 {
        match self {
            ModelComplexity::Lite => 0,
            ModelComplexity::Full => 1,
        }
    }
}

/// Options handed to the detector before a session starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSettings {
    pub max_hands: u8,
    pub model_complexity: ModelComplexity,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            max_hands: 2,
            model_complexity: ModelComplexity::Full,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// A hand landmark model, typically a wrapped third-party library.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    /// Loads the underlying model. Must complete before any analysis.
    async fn load(&self) -> Result<(), DetectorError>;

    fn is_ready(&self) -> bool;

    fn configure(&self, settings: &DetectorSettings) -> Result<(), DetectorError>;

    /// Finds zero or more hands in one frame.
    async fn analyze(&self, frame: &Frame) -> Result<HandLandmarks, DetectorError>;

    fn name(&self) -> &'static str;
}
