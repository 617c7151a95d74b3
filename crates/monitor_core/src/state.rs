use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::view_model::MonitorViewModel;
use crate::SessionStatus;

/// Maximum number of entries kept in the user-facing log.
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    /// Maps a level name as sent by the crawler. Unknown names fall back to `Info`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => LogLevel::Debug,
            "SUCCESS" => LogLevel::Success,
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" | "SEVERE" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.timestamp, self.level, self.message)
    }
}

/// Bounded, newest-first log. Pushing past [`LOG_CAPACITY`] evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(LOG_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRecord {
    pub id: Option<u64>,
    pub url: String,
    pub parent_url: Option<String>,
    pub depth_level: Option<u32>,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub processing_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowRecord {
    #[serde(alias = "flowId")]
    pub id: Option<u64>,
    #[serde(alias = "flowPath")]
    pub path: Vec<String>,
    pub depth: Option<u32>,
    pub start_url: Option<String>,
    pub end_url: Option<String>,
}

impl FlowRecord {
    /// Reported depth, or the path length when the crawler omitted it.
    pub fn effective_depth(&self) -> usize {
        self.depth
            .map(|depth| depth as usize)
            .unwrap_or(self.path.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedRecord {
    pub id: Option<u64>,
    pub page_id: Option<u64>,
    pub rule_id: Option<u64>,
    pub rule_name: Option<String>,
    #[serde(alias = "extractedValue")]
    pub value: Option<String>,
    pub count: Option<u64>,
}

/// The collections a finalization fetch can replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Pages,
    Flows,
    ExtractedData,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Pages => "pages",
            Collection::Flows => "flows",
            Collection::ExtractedData => "extracted data",
        };
        f.write_str(name)
    }
}

/// A canonical collection snapshot fetched from the control interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Pages(Vec<PageRecord>),
    Flows(Vec<FlowRecord>),
    ExtractedData(Vec<ExtractedRecord>),
}

impl Snapshot {
    pub fn collection(&self) -> Collection {
        match self {
            Snapshot::Pages(_) => Collection::Pages,
            Snapshot::Flows(_) => Collection::Flows,
            Snapshot::ExtractedData(_) => Collection::ExtractedData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Counters {
    pub total_pages: u64,
    pub total_flows: u64,
    pub total_extracted: u64,
    pub total_downloaded: u64,
    pub total_external_urls: u64,
    pub pages_per_second: f64,
    pub queue_size: u64,
    pub active_threads: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateState {
    counters: Counters,
    log: LogBuffer,
    flows: Vec<FlowRecord>,
    extracted_data: Vec<ExtractedRecord>,
    pages: Vec<PageRecord>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    pub fn flows(&self) -> &[FlowRecord] {
        &self.flows
    }

    pub fn extracted_data(&self) -> &[ExtractedRecord] {
        &self.extracted_data
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    /// Prepends a locally generated entry to the user-facing log.
    pub fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    pub fn view(
        &self,
        status: SessionStatus,
        session_id: Option<&str>,
        connected: bool,
    ) -> MonitorViewModel {
        MonitorViewModel {
            status,
            session_id: session_id.map(ToOwned::to_owned),
            counters: self.counters,
            log: self.log.to_vec(),
            flow_count: self.flows.len(),
            extracted_count: self.extracted_data.len(),
            page_count: self.pages.len(),
            connected,
        }
    }

    pub(crate) fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    pub(crate) fn append_flow(&mut self, flow: FlowRecord) {
        self.flows.push(flow);
    }

    pub(crate) fn append_extracted(&mut self, record: ExtractedRecord) {
        self.extracted_data.push(record);
    }

    pub(crate) fn replace(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Pages(pages) => self.pages = pages,
            Snapshot::Flows(flows) => self.flows = flows,
            Snapshot::ExtractedData(records) => self.extracted_data = records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> LogEntry {
        LogEntry::new(format!("t{n}"), LogLevel::Info, format!("message {n}"))
    }

    #[test]
    fn log_buffer_keeps_newest_first_and_caps_length() {
        let mut log = LogBuffer::default();
        for n in 0..(LOG_CAPACITY + 5) {
            log.push(entry(n));
        }

        assert_eq!(log.len(), LOG_CAPACITY);
        assert_eq!(log.newest().map(|e| e.message.as_str()), Some("message 104"));
        assert_eq!(
            log.iter().last().map(|e| e.message.as_str()),
            Some("message 5")
        );
    }

    #[test]
    fn wire_level_names_map_to_known_levels() {
        assert_eq!(LogLevel::from_wire("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from_wire("ERROR"), LogLevel::Error);
        assert_eq!(LogLevel::from_wire("Success"), LogLevel::Success);
        assert_eq!(LogLevel::from_wire("verbose"), LogLevel::Info);
    }

    #[test]
    fn flow_depth_falls_back_to_path_length() {
        let flow = FlowRecord {
            path: vec!["/".into(), "/a".into(), "/a/b".into()],
            ..FlowRecord::default()
        };
        assert_eq!(flow.effective_depth(), 3);

        let flow = FlowRecord {
            depth: Some(1),
            ..flow
        };
        assert_eq!(flow.effective_depth(), 1);
    }
}
