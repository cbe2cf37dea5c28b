use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::Frame;
use crate::error::SourceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// Requested capture parameters, passed to [`FrameSource::start`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl Default for FrameConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            facing_mode: FacingMode::User,
        }
    }
}

/// Identifies one started stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A live camera feed.
#[async_trait]
pub trait FrameSource: Send {
    /// Opens the camera. Fails with [`SourceError::PermissionDenied`] when
    /// access is refused.
    async fn start(
        &mut self,
        constraints: &FrameConstraints,
    ) -> Result<StreamHandle, SourceError>;

    /// Waits for the next frame at the device's natural rate.
    async fn next_frame(&mut self) -> Result<Frame, SourceError>;

    /// Most recent frame, if the stream is running.
    fn current_frame(&self) -> Option<Frame>;

    /// Releases the camera. Calling it more than once is harmless.
    fn stop(&mut self, handle: &StreamHandle);

    fn name(&self) -> &'static str;
}
