use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ClassifierConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Unclassified,
    Audio,
    Video,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaType::Unclassified => write!(f, "unclassified"),
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

/// Exponentially weighted running estimate of packet size.
///
/// Each sample moves the estimate by `1/window` of the distance to the sample,
/// so a constant input converges to exactly that input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage {
    value: f64,
    window: f64,
}

impl MovingAverage {
    pub fn new(first_sample: f64, window: u32) -> Self {
        Self {
            value: first_sample,
            window: f64::from(window.max(1)),
        }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        self.value -= self.value / self.window;
        self.value += sample / self.window;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Per-port classification state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    source_port: u16,
    #[serde(rename = "average_size", serialize_with = "serialize_average")]
    running_rate: MovingAverage,
    packets_seen: u64,
    media_type: MediaType,
    /// Last local packet of any size. Not part of the estimator.
    #[serde(skip)]
    last_seen: Instant,
}

fn serialize_average<S: serde::Serializer>(average: &MovingAverage, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(average.value())
}

impl FlowRecord {
    fn new(source_port: u16, length: u32, window: u32, now: Instant) -> Self {
        Self {
            source_port,
            running_rate: MovingAverage::new(f64::from(length), window),
            packets_seen: 1,
            media_type: MediaType::Unclassified,
            last_seen: now,
        }
    }

    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    pub fn running_rate(&self) -> f64 {
        self.running_rate.value()
    }

    pub fn packets_seen(&self) -> u64 {
        self.packets_seen
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn is_classified(&self) -> bool {
        self.media_type != MediaType::Unclassified
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Result of folding one observation into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub media_type: MediaType,
    /// True only on the call that fixed the flow's type.
    pub just_classified: bool,
}

impl Classification {
    fn pending() -> Self {
        Self {
            media_type: MediaType::Unclassified,
            just_classified: false,
        }
    }
}

/// Owns every flow seen since startup, keyed by source port. Flows are never evicted.
pub struct FlowTracker {
    flows: HashMap<u16, FlowRecord>,
    config: ClassifierConfig,
}

impl FlowTracker {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            flows: HashMap::new(),
            config,
        }
    }

    pub fn record_observation(&mut self, source_port: u16, length: u32) -> Classification {
        self.record_observation_at(source_port, length, Instant::now())
    }

    pub fn record_observation_at(&mut self, source_port: u16, length: u32, now: Instant) -> Classification {
        let config = self.config;

        let flow = match self.flows.entry(source_port) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(FlowRecord::new(source_port, length, config.window, now));
                log::debug!("New flow on port {} (first packet {} bytes)", source_port, length);
                return Classification::pending();
            }
        };
        flow.last_seen = now;

        // Classified flows are frozen.
        if flow.is_classified() {
            return Classification {
                media_type: flow.media_type,
                just_classified: false,
            };
        }

        if length <= config.audio_minimum {
            return Classification::pending();
        }

        let rate = flow.running_rate.update(f64::from(length));
        flow.packets_seen += 1;

        if flow.packets_seen <= config.warmup_packets {
            return Classification::pending();
        }

        // Re-evaluated on every qualifying packet after warm-up until one sticks.
        let media_type = if rate > f64::from(config.audio_maximum) {
            MediaType::Video
        } else if rate > f64::from(config.audio_minimum) {
            MediaType::Audio
        } else {
            return Classification::pending();
        };

        flow.media_type = media_type;
        log::info!(
            "Port {} classified as {} after {} packets (average {:.1} bytes)",
            source_port,
            media_type,
            flow.packets_seen,
            rate
        );

        Classification {
            media_type,
            just_classified: true,
        }
    }

    pub fn flow(&self, source_port: u16) -> Option<&FlowRecord> {
        self.flows.get(&source_port)
    }

    /// All flows ordered by source port.
    pub fn flows(&self) -> Vec<&FlowRecord> {
        let mut flows: Vec<_> = self.flows.values().collect();
        flows.sort_by_key(|flow| flow.source_port);
        flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn classified_count(&self) -> usize {
        self.flows.values().filter(|flow| flow.is_classified()).count()
    }

    /// Most recent packet across all flows.
    pub fn last_activity(&self) -> Option<Instant> {
        self.flows.values().map(|flow| flow.last_seen).max()
    }
}
