// Library exports for media-flow-monitor
pub mod app;
pub mod capture;
pub mod classify;
pub mod config;
pub mod report;
pub mod utils;

pub use app::App;
pub use capture::{pcap_engine, origin};
pub use classify::{activity, flow_tracker, monitor};
pub use config::settings;
pub use utils::formatting;

// Error types
pub use anyhow::{Error, Result};
