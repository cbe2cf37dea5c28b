pub mod common;
pub mod config;
pub mod detection;
pub mod error;
pub mod scan;
pub mod session;

pub use config::Configuration;
pub use error::{AppError, DetectorError, SourceError};

pub use scan::{Hand, ScanSnapshot, ScanStateMachine, ScanStep};
pub use session::{ScanCoordinator, ScanEvent, SessionStatus};
