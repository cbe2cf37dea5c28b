pub mod frame;
pub mod landmarks;

pub use frame::Frame;
pub use landmarks::{HAND_KEYPOINT_COUNT, HandKeypoints, HandLandmarks, Keypoint3D};
