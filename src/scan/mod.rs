pub mod state_machine;
pub mod step;

pub use state_machine::{
    DEFAULT_DETECTION_THRESHOLD, Observation, ScanSnapshot, ScanStateMachine,
};
pub use step::{Hand, ScanStep};
