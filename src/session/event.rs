use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::scan::{Hand, ScanStep};

/// Notifications for the UI layer, delivered over a broadcast channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    SessionStarted { session_id: Uuid },
    HandConfirmed { hand: Hand, step: ScanStep },
    /// A single frame could not be analyzed. Logged only; the scan continues.
    AnalysisFailed { message: String },
    FrameSourceStopped,
    /// Fired once, after the reveal delay, when both hands are confirmed.
    RevealAsset { asset: PathBuf },
    SessionFailed { message: String },
    Reset,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// The landmark detector has not finished loading.
    #[default]
    NotReady,
    Ready,
    Scanning,
    Stopped,
    Failed { reason: String },
}

impl SessionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionStatus::Failed { .. })
    }
}
