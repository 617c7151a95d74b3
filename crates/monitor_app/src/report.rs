//! Plain-text rendering of the monitor view for the terminal.
use monitor_core::{LogEntry, MonitorViewModel};

pub fn progress_line(view: &MonitorViewModel) -> String {
    let counters = &view.counters;
    format!(
        "{:<9} pages {:>5}  flows {:>4}  extracted {:>5}  files {:>4}  external {:>4}  {:.1} p/s  queue {}  threads {}{}",
        view.status.as_str(),
        counters.total_pages,
        counters.total_flows,
        counters.total_extracted,
        counters.total_downloaded,
        counters.total_external_urls,
        counters.pages_per_second,
        counters.queue_size,
        counters.active_threads,
        if view.connected { "" } else { "  (offline)" },
    )
}

/// Entries added since `last_seen`, oldest first. `log` is newest first.
pub fn entries_since<'a>(log: &'a [LogEntry], last_seen: Option<&LogEntry>) -> Vec<&'a LogEntry> {
    let fresh = match last_seen {
        Some(seen) => log
            .iter()
            .position(|entry| entry == seen)
            .map_or(log, |index| &log[..index]),
        None => log,
    };
    fresh.iter().rev().collect()
}

pub fn summary(view: &MonitorViewModel) -> Vec<String> {
    let counters = &view.counters;
    vec![
        format!(
            "session {} finished as {}",
            view.session_id.as_deref().unwrap_or("-"),
            view.status
        ),
        format!("  pages discovered   {}", counters.total_pages),
        format!(
            "  flows              {} ({} loaded)",
            counters.total_flows, view.flow_count
        ),
        format!(
            "  extracted values   {} ({} records)",
            counters.total_extracted, view.extracted_count
        ),
        format!("  files downloaded   {}", counters.total_downloaded),
        format!("  external urls      {}", counters.total_external_urls),
    ]
}

#[cfg(test)]
mod tests {
    use monitor_core::{Counters, LogLevel, SessionStatus};
    use pretty_assertions::assert_eq;

    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new("10:00:00", LogLevel::Info, message)
    }

    #[test]
    fn only_unseen_entries_are_returned_oldest_first() {
        let log = vec![entry("c"), entry("b"), entry("a")];

        let fresh: Vec<&str> = entries_since(&log, Some(&entry("a")))
            .into_iter()
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(fresh, vec!["b", "c"]);
        assert!(entries_since(&log, Some(&entry("c"))).is_empty());
        assert_eq!(entries_since(&log, None).len(), 3);
    }

    #[test]
    fn evicted_marker_prints_the_whole_buffer() {
        let log = vec![entry("z")];
        assert_eq!(entries_since(&log, Some(&entry("gone"))).len(), 1);
    }

    #[test]
    fn progress_line_flags_offline_channel() {
        let view = MonitorViewModel {
            status: SessionStatus::Running,
            counters: Counters {
                total_pages: 12,
                ..Counters::default()
            },
            connected: false,
            ..MonitorViewModel::default()
        };
        let line = progress_line(&view);
        assert!(line.starts_with("RUNNING"));
        assert!(line.contains("pages    12"));
        assert!(line.ends_with("(offline)"));
    }
}
