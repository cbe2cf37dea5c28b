// Hand landmark types reported by a landmark detector

use serde::{Deserialize, Serialize};

/// Keypoints per hand in the MediaPipe hand model.
pub const HAND_KEYPOINT_COUNT: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint3D {
    pub x: f32, // Normalized [0, 1] image coordinates
    pub y: f32,
    pub z: f32, // Depth relative to the wrist
    pub confidence: f32,
}

impl Keypoint3D {
    pub fn new(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self { x, y, z, confidence }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// One detected hand. Any handedness label the detector attaches is not
/// trusted, so none is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandKeypoints {
    pub keypoints: Vec<Keypoint3D>,
    pub score: Option<f32>,
}

impl HandKeypoints {
    pub fn new(keypoints: Vec<Keypoint3D>) -> Self {
        Self {
            keypoints,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// A full set of keypoints at one normalized position, for synthetic detectors.
    pub fn uniform(x: f32, y: f32) -> Self {
        Self::new(vec![Keypoint3D::new(x, y, 0.0, 1.0); HAND_KEYPOINT_COUNT])
    }
}

/// Result of analyzing one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub hands: Vec<HandKeypoints>,
}

impl HandLandmarks {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(hands: Vec<HandKeypoints>) -> Self {
        Self { hands }
    }

    pub fn hands_found(&self) -> usize {
        self.hands.len()
    }
}
