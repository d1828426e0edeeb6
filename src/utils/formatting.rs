use crate::classify::{FlowRecord, MediaType};

/// Format bytes in human-readable format (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        format!("{}h {}m", hours, minutes)
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        format!("{}d {}h", days, hours)
    }
}

pub fn flow_table_header() -> String {
    format!("{:>6}  {:<12}  {:>10}  {:>8}", "PORT", "TYPE", "AVG SIZE", "PACKETS")
}

/// One row of the flow table printed at shutdown.
pub fn format_flow_row(flow: &FlowRecord) -> String {
    let media = match flow.media_type() {
        MediaType::Unclassified => "-".to_string(),
        other => other.to_string(),
    };
    format!(
        "{:>6}  {:<12}  {:>10}  {:>8}",
        flow.source_port(),
        media,
        format!("{:.1} B", flow.running_rate()),
        flow.packets_seen()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FlowTracker;
    use crate::config::ClassifierConfig;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m");
        assert_eq!(format_duration(90061), "1d 1h");
    }

    #[test]
    fn test_format_flow_row() {
        let mut tracker = FlowTracker::new(ClassifierConfig::default());
        for _ in 0..51 {
            tracker.record_observation(5004, 300);
        }
        tracker.record_observation(6000, 40);

        let row = format_flow_row(tracker.flow(5004).unwrap());
        assert!(row.contains("5004"));
        assert!(row.contains("video"));
        assert!(row.contains("300.0 B"));
        assert!(row.trim_end().ends_with("51"));

        let row = format_flow_row(tracker.flow(6000).unwrap());
        assert!(row.contains(" - "));
    }
}
