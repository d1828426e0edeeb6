use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Ethernet + IPv6 + UDP headers; a shorter snapshot cannot be decoded.
pub const MIN_SNAPLEN: i32 = 14 + 40 + 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file '{path}': {source}")]
    Read { path: String, source: std::io::Error },

    #[error("Cannot write config file '{path}': {source}")]
    Write { path: String, source: std::io::Error },

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub classifier: ClassifierConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub interface: Option<String>,
    /// UDP port the capture filter matches in either direction.
    pub port: u16,
    /// Addresses or CIDR blocks treated as "this host". Empty means the
    /// capture interface's own addresses.
    pub local_addresses: Vec<String>,
    pub promiscuous: bool,
    pub snaplen: i32,
    pub timeout_ms: i32,
    /// Capacity of the queue between the capture thread and the classifier.
    pub queue_depth: usize,
}

/// Thresholds consumed by the classification core.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Packets at or below this size are keepalives or silence.
    pub audio_minimum: u32,
    /// Flows averaging above this size are video.
    pub audio_maximum: u32,
    /// Moving-average window.
    pub window: u32,
    /// Qualifying packets a flow must exceed before it can be classified.
    pub warmup_packets: u64,
    /// A call is on while any local flow has sent within this many milliseconds.
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: OutputFormat,
    /// Suppress status lines identical to the previous one.
    pub only_changes: bool,
    /// Re-report status this often while no packets arrive, so an ended call
    /// shows up. Zero disables it.
    pub status_interval_ms: u64,
}

impl ReportConfig {
    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval_ms > 0).then(|| Duration::from_millis(self.status_interval_ms))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            port: 8801,
            local_addresses: Vec::new(),
            promiscuous: false,
            snaplen: 96,
            timeout_ms: 1000,
            queue_depth: 1024,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            audio_minimum: 50,
            audio_maximum: 200,
            window: 50,
            warmup_packets: 50,
            call_timeout_ms: 5000,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::Invalid("classifier.window must be at least 1".to_string()));
        }
        if self.audio_maximum < self.audio_minimum {
            return Err(ConfigError::Invalid(format!(
                "classifier.audio_maximum ({}) is below classifier.audio_minimum ({})",
                self.audio_maximum, self.audio_minimum
            )));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("classifier.call_timeout_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            only_changes: false,
            status_interval_ms: 1000,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classifier.validate()?;

        // A zero timeout makes libpcap block until traffic arrives, which stalls shutdown.
        if self.capture.timeout_ms <= 0 {
            return Err(ConfigError::Invalid(format!(
                "capture.timeout_ms must be positive, got {}",
                self.capture.timeout_ms
            )));
        }
        if self.capture.snaplen < MIN_SNAPLEN {
            return Err(ConfigError::Invalid(format!(
                "capture.snaplen must be at least {} bytes to hold the UDP header, got {}",
                MIN_SNAPLEN, self.capture.snaplen
            )));
        }
        if self.capture.queue_depth == 0 {
            return Err(ConfigError::Invalid("capture.queue_depth must be at least 1".to_string()));
        }
        for addr in &self.capture.local_addresses {
            addr.parse::<ipnetwork::IpNetwork>()
                .map_err(|e| ConfigError::Invalid(format!("capture.local_addresses entry '{}': {}", addr, e)))?;
        }
        Ok(())
    }

    /// BPF filter handed to libpcap.
    pub fn capture_filter(&self) -> String {
        format!("udp && port {}", self.capture.port)
    }
}
