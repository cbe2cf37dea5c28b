pub mod coordinator;
pub mod event;
pub mod metrics;
mod pump;

pub use coordinator::{ScanCoordinator, ScanCoordinatorBuilder};
pub use event::{ScanEvent, SessionStatus};
pub use metrics::PumpMetrics;
