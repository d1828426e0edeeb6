use std::fmt;

use serde::Serialize;

use super::flow_tracker::MediaType;
use super::ObservationError;

/// Coarse on/off signal for one media type. Text and JSON both spell it `on`/`off`/`unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ActivityState {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "on")]
    Active,
    #[serde(rename = "off")]
    Idle,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActivityState::Unknown => write!(f, "unknown"),
            ActivityState::Active => write!(f, "on"),
            ActivityState::Idle => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActivitySnapshot {
    pub video: ActivityState,
    pub audio: ActivityState,
}

impl fmt::Display for ActivitySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Video: {} Audio: {}", self.video, self.audio)
    }
}

/// Activity snapshot plus whether a call is in progress at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStatus {
    #[serde(flatten)]
    pub activity: ActivitySnapshot,
    pub call: ActivityState,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} Call: {}", self.activity, self.call)
    }
}

pub struct ActivityAggregator {
    snapshot: ActivitySnapshot,
    audio_minimum: u32,
}

impl ActivityAggregator {
    pub fn new(audio_minimum: u32) -> Self {
        Self {
            snapshot: ActivitySnapshot::default(),
            audio_minimum,
        }
    }

    /// Data-bearing packets mark the type active; keepalive-sized ones mark it idle.
    pub fn update_activity(&mut self, media_type: MediaType, length: u32) -> Result<ActivitySnapshot, ObservationError> {
        let state = if length > self.audio_minimum {
            ActivityState::Active
        } else {
            ActivityState::Idle
        };

        let slot = match media_type {
            MediaType::Audio => &mut self.snapshot.audio,
            MediaType::Video => &mut self.snapshot.video,
            MediaType::Unclassified => return Err(ObservationError::UnclassifiedMedia),
        };

        if *slot != state {
            log::debug!("{} went {}", media_type, state);
        }
        *slot = state;

        Ok(self.snapshot)
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let aggregator = ActivityAggregator::new(50);
        assert_eq!(aggregator.snapshot(), ActivitySnapshot::default());
        assert_eq!(aggregator.snapshot().to_string(), "Video: unknown Audio: unknown");
    }

    #[test]
    fn test_toggles_between_active_and_idle() {
        let mut aggregator = ActivityAggregator::new(50);

        let snapshot = aggregator.update_activity(MediaType::Video, 900).unwrap();
        assert_eq!(snapshot.video, ActivityState::Active);
        assert_eq!(snapshot.audio, ActivityState::Unknown);

        let snapshot = aggregator.update_activity(MediaType::Video, 50).unwrap();
        assert_eq!(snapshot.video, ActivityState::Idle);

        let snapshot = aggregator.update_activity(MediaType::Video, 51).unwrap();
        assert_eq!(snapshot.video, ActivityState::Active);
        assert_eq!(snapshot.to_string(), "Video: on Audio: unknown");
    }

    #[test]
    fn test_rejects_unclassified() {
        let mut aggregator = ActivityAggregator::new(50);
        assert!(matches!(
            aggregator.update_activity(MediaType::Unclassified, 100),
            Err(ObservationError::UnclassifiedMedia)
        ));
        assert_eq!(aggregator.snapshot(), ActivitySnapshot::default());
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = ActivitySnapshot {
            video: ActivityState::Idle,
            audio: ActivityState::Active,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"video":"off","audio":"on"}"#);
        assert_eq!(snapshot.to_string(), "Video: off Audio: on");
    }

    #[test]
    fn test_session_status_flattens_activity() {
        let status = SessionStatus {
            activity: ActivitySnapshot {
                video: ActivityState::Unknown,
                audio: ActivityState::Active,
            },
            call: ActivityState::Active,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"video":"unknown","audio":"on","call":"on"}"#);
        assert_eq!(status.to_string(), "Video: unknown Audio: on Call: on");
    }
}
