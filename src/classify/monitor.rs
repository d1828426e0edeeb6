use std::time::{Duration, Instant};

use serde::Serialize;

use super::activity::{ActivityAggregator, ActivitySnapshot, ActivityState, SessionStatus};
use super::flow_tracker::{FlowRecord, FlowTracker, MediaType};
use super::ObservationError;
use crate::config::ClassifierConfig;

/// Running totals over every call to [`MediaMonitor::observe`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub accepted: u64,
    pub ignored_remote: u64,
    pub rejected: u64,
}

/// Single entry point for packet observations.
///
/// Not safe for concurrent mutation; the runtime gives it exactly one owner and
/// feeds it observations in arrival order.
pub struct MediaMonitor {
    tracker: FlowTracker,
    activity: ActivityAggregator,
    call_timeout: Duration,
    stats: MonitorStats,
}

impl MediaMonitor {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            tracker: FlowTracker::new(config),
            activity: ActivityAggregator::new(config.audio_minimum),
            call_timeout: config.call_timeout(),
            stats: MonitorStats::default(),
        }
    }

    /// Fold one packet into the classifier and return the current activity snapshot.
    ///
    /// Packets not sent by this host leave every piece of state untouched,
    /// whatever their port and length.
    pub fn observe(&mut self, source_port: u32, length: u32, source_is_local: bool) -> Result<ActivitySnapshot, ObservationError> {
        self.observe_at(source_port, length, source_is_local, Instant::now())
    }

    /// [`MediaMonitor::observe`] with an explicit arrival time.
    pub fn observe_at(
        &mut self,
        source_port: u32,
        length: u32,
        source_is_local: bool,
        now: Instant,
    ) -> Result<ActivitySnapshot, ObservationError> {
        if !source_is_local {
            self.stats.ignored_remote += 1;
            return Ok(self.activity.snapshot());
        }

        let port = match Self::validate(source_port, length) {
            Ok(port) => port,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(e);
            }
        };
        self.stats.accepted += 1;

        let classification = self.tracker.record_observation_at(port, length, now);
        if classification.media_type != MediaType::Unclassified {
            return self.activity.update_activity(classification.media_type, length);
        }

        Ok(self.activity.snapshot())
    }

    fn validate(source_port: u32, length: u32) -> Result<u16, ObservationError> {
        if length == 0 {
            return Err(ObservationError::InvalidObservation(format!(
                "zero-length packet on port {}",
                source_port
            )));
        }
        u16::try_from(source_port).map_err(|_| {
            ObservationError::InvalidObservation(format!("source port {} out of range", source_port))
        })
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        self.activity.snapshot()
    }

    /// On while any local flow sent a packet within the call timeout, off once
    /// all have gone quiet, unknown before the first local packet.
    pub fn call_state(&self, now: Instant) -> ActivityState {
        match self.tracker.last_activity() {
            None => ActivityState::Unknown,
            Some(last) if now.saturating_duration_since(last) <= self.call_timeout => ActivityState::Active,
            Some(_) => ActivityState::Idle,
        }
    }

    pub fn status(&self, now: Instant) -> SessionStatus {
        SessionStatus {
            activity: self.activity.snapshot(),
            call: self.call_state(now),
        }
    }

    pub fn flow(&self, source_port: u16) -> Option<&FlowRecord> {
        self.tracker.flow(source_port)
    }

    pub fn flows(&self) -> Vec<&FlowRecord> {
        self.tracker.flows()
    }

    pub fn tracker(&self) -> &FlowTracker {
        &self.tracker
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> MediaMonitor {
        MediaMonitor::new(ClassifierConfig::default())
    }

    #[test]
    fn test_remote_packets_are_ignored() {
        let mut monitor = monitor();
        for _ in 0..100 {
            let snapshot = monitor.observe(8801, 1000, false).unwrap();
            assert_eq!(snapshot, ActivitySnapshot::default());
        }
        // Invalid values are not even looked at.
        assert!(monitor.observe(70000, 0, false).is_ok());
        assert!(monitor.tracker().is_empty());
        assert_eq!(monitor.stats().ignored_remote, 101);
        assert_eq!(monitor.stats().accepted, 0);
    }

    #[test]
    fn test_rejects_zero_length() {
        let mut monitor = monitor();
        let err = monitor.observe(5004, 0, true).unwrap_err();
        assert!(matches!(err, ObservationError::InvalidObservation(_)));
        assert!(monitor.flow(5004).is_none());
        assert_eq!(monitor.stats().rejected, 1);
    }

    #[test]
    fn test_rejects_port_out_of_range() {
        let mut monitor = monitor();
        assert!(monitor.observe(65536, 100, true).is_err());
        assert!(monitor.observe(65535, 100, true).is_ok());
        assert_eq!(monitor.tracker().len(), 1);
    }

    #[test]
    fn test_activity_follows_classification() {
        let mut monitor = monitor();
        for _ in 0..50 {
            let snapshot = monitor.observe(5004, 172, true).unwrap();
            assert_eq!(snapshot.audio, ActivityState::Unknown);
        }

        // The classifying packet reports activity immediately.
        let snapshot = monitor.observe(5004, 172, true).unwrap();
        assert_eq!(monitor.flow(5004).unwrap().media_type(), MediaType::Audio);
        assert_eq!(snapshot.audio, ActivityState::Active);

        let snapshot = monitor.observe(5004, 10, true).unwrap();
        assert_eq!(snapshot.audio, ActivityState::Idle);
        assert_eq!(snapshot.video, ActivityState::Unknown);
    }

    #[test]
    fn test_call_state_follows_last_local_packet() {
        let config = ClassifierConfig {
            call_timeout_ms: 5000,
            ..ClassifierConfig::default()
        };
        let mut monitor = MediaMonitor::new(config);
        let start = Instant::now();
        assert_eq!(monitor.call_state(start), ActivityState::Unknown);

        // Inbound traffic says nothing about our side of the call.
        monitor.observe_at(8801, 400, false, start).unwrap();
        assert_eq!(monitor.call_state(start), ActivityState::Unknown);

        monitor.observe_at(5004, 30, true, start).unwrap();
        assert_eq!(monitor.call_state(start + Duration::from_millis(5000)), ActivityState::Active);
        assert_eq!(monitor.call_state(start + Duration::from_millis(5001)), ActivityState::Idle);

        let later = start + Duration::from_secs(8);
        monitor.observe_at(5006, 30, true, later).unwrap();
        let status = monitor.status(later + Duration::from_secs(1));
        assert_eq!(status.call, ActivityState::Active);
        assert_eq!(status.activity, ActivitySnapshot::default());
    }

    #[test]
    fn test_unclassified_small_packets_leave_activity_unknown() {
        let mut monitor = monitor();
        for _ in 0..60 {
            monitor.observe(6000, 30, true).unwrap();
        }
        assert_eq!(monitor.snapshot(), ActivitySnapshot::default());
        assert_eq!(monitor.flow(6000).unwrap().media_type(), MediaType::Unclassified);
    }
}
