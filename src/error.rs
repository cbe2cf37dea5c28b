use std::time::Duration;

use thiserror::Error;

use crate::scan::ScanStep;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("Landmark detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("A scan session is already running.")]
    AlreadyRunning,
    #[error("Scan cannot begin from step {0:?}, reset first.")]
    NotIdle(ScanStep),
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Scan pump task failed: {0}")]
    Pump(String),
    #[error("Coordinator is missing a {0}.")]
    MissingComponent(&'static str),
}

// Frame Source Error Type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Camera access was denied: {0}")]
    PermissionDenied(String),
    #[error("The frame source has not been started.")]
    NotStarted,
    #[error("The frame source disconnected: {0}")]
    Disconnected(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("The landmark detector has not finished loading.")]
    NotReady,
    #[error("Failed to load landmark detector: {0}")]
    LoadFailed(String),
    #[error("Frame analysis failed: {0}")]
    Analysis(String),
    #[error("Frame analysis timed out after {0:?}")]
    Timeout(Duration),
}
