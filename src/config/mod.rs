pub mod settings;

pub use settings::{CaptureConfig, ClassifierConfig, Config, ConfigError, OutputFormat, ReportConfig, MIN_SNAPLEN};
