pub mod detector;
pub mod service;
pub mod simulated;
pub mod source;

pub use detector::{DetectorSettings, LandmarkDetector, ModelComplexity};
pub use service::{DetectionPipeline, DetectionService};
pub use simulated::{
    RandomDetector, ScriptStep, ScriptedDetector, SourceProbe, SyntheticFrameSource,
};
pub use source::{FacingMode, FrameConstraints, FrameSource, StreamHandle};
