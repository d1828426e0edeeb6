pub mod activity;
pub mod flow_tracker;
pub mod monitor;

pub use activity::{ActivityAggregator, ActivitySnapshot, ActivityState, SessionStatus};
pub use flow_tracker::{Classification, FlowRecord, FlowTracker, MediaType, MovingAverage};
pub use monitor::{MediaMonitor, MonitorStats};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    #[error("Activity can only be tracked for audio or video flows")]
    UnclassifiedMedia,
}
