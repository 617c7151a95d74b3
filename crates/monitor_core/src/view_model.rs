use crate::{Counters, LogEntry, SessionStatus};

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorViewModel {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub counters: Counters,
    /// Newest first.
    pub log: Vec<LogEntry>,
    pub flow_count: usize,
    pub extracted_count: usize,
    pub page_count: usize,
    pub connected: bool,
}
