use std::num::NonZeroU32;

use serde::Serialize;
use tracing::{debug, info};

use crate::scan::step::{Hand, ScanStep};

/// Consecutive qualifying frames required to confirm a hand.
pub const DEFAULT_DETECTION_THRESHOLD: u32 = 30;

const DEFAULT_THRESHOLD: NonZeroU32 = match NonZeroU32::new(DEFAULT_DETECTION_THRESHOLD) {
    Some(threshold) => threshold,
    None => panic!("default detection threshold must be non-zero"),
};

/// What the detector reported for one analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Number of hand landmark sets found in the frame.
    Hands(usize),
    /// The detector failed on this frame. Counts as zero hands.
    AnalysisFailed,
}

impl Observation {
    pub fn has_hand(&self) -> bool {
        matches!(self, Observation::Hands(count) if *count > 0)
    }
}

/// Read-only display state published to the UI layer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct ScanSnapshot {
    pub step: ScanStep,
    pub tally: u32,
    pub left_confirmed: bool,
    pub right_confirmed: bool,
}

/// Debounces per-frame hand observations into two ordered confirmations.
///
/// All transitions are synchronous so each observation is applied as a unit.
/// The owner (the frame pump) is the single writer; readers get
/// [`ScanSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct ScanStateMachine {
    step: ScanStep,
    tally: u32,
    left_confirmed: bool,
    right_confirmed: bool,
    threshold: NonZeroU32,
}

impl ScanStateMachine {
    pub fn new(threshold: NonZeroU32) -> Self {
        Self {
            step: ScanStep::Idle,
            tally: 0,
            left_confirmed: false,
            right_confirmed: false,
            threshold,
        }
    }

    pub fn threshold(&self) -> NonZeroU32 {
        self.threshold
    }

    pub fn step(&self) -> ScanStep {
        self.step
    }

    pub fn tally(&self) -> u32 {
        self.tally
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            step: self.step,
            tally: self.tally,
            left_confirmed: self.left_confirmed,
            right_confirmed: self.right_confirmed,
        }
    }

    /// Starts a scan attempt. Returns `false` unless the machine was `Idle`.
    pub fn begin(&mut self) -> bool {
        if self.step != ScanStep::Idle {
            return false;
        }
        self.transition(ScanStep::AwaitingLeftHand);
        true
    }

    /// Returns every entity to its initial value, from any step.
    pub fn reset(&mut self) {
        if self.step != ScanStep::Idle {
            info!("Resetting scan from step {}", self.step.as_str());
        }
        self.step = ScanStep::Idle;
        self.tally = 0;
        self.left_confirmed = false;
        self.right_confirmed = false;
    }

    /// Applies one frame's observation. Returns the hand confirmed by this
    /// observation, if the tally just reached the threshold.
    pub fn observe(&mut self, observation: Observation) -> Option<Hand> {
        if !self.step.is_awaiting_hand() {
            return None;
        }

        if !observation.has_hand() {
            if self.tally > 0 {
                debug!(
                    "Tally reset after {} frames in step {}",
                    self.tally,
                    self.step.as_str()
                );
            }
            self.tally = 0;
            return None;
        }

        self.tally += 1;
        if self.tally < self.threshold.get() {
            return None;
        }

        self.tally = 0;
        if !self.left_confirmed {
            self.left_confirmed = true;
            self.transition(ScanStep::AwaitingRightHand);
            Some(Hand::Left)
        } else if !self.right_confirmed {
            self.right_confirmed = true;
            self.transition(ScanStep::Complete);
            Some(Hand::Right)
        } else {
            None
        }
    }

    fn transition(&mut self, next: ScanStep) {
        info!("Scan step {} -> {}", self.step.as_str(), next.as_str());
        self.step = next;
        self.tally = 0;
    }
}

impl Default for ScanStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
