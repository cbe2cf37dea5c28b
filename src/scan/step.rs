use serde::{Deserialize, Serialize};

/// Progress of a single scan attempt. Only moves forward; `reset` is the one
/// way back to `Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanStep {
    #[default]
    Idle,
    AwaitingLeftHand,
    AwaitingRightHand,
    Complete,
}

impl ScanStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStep::Idle => "idle",
            ScanStep::AwaitingLeftHand => "awaiting_left_hand",
            ScanStep::AwaitingRightHand => "awaiting_right_hand",
            ScanStep::Complete => "complete",
        }
    }

    /// Whether frames observed in this step count towards a confirmation.
    pub fn is_awaiting_hand(&self) -> bool {
        matches!(
            self,
            ScanStep::AwaitingLeftHand | ScanStep::AwaitingRightHand
        )
    }
}

/// Which confirmation fired. Assigned by order of confirmation only: the
/// first sustained detection is `Left`, the second `Right`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}
