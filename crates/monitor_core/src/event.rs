use crate::{FlowRecord, LogEntry};

/// Wire-level discriminant of a push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PageDiscovered,
    FlowDiscovered,
    DataExtracted,
    FileDownloaded,
    ExternalUrlFound,
    Metrics,
    LogMessage,
    CrawlCompleted,
    CrawlError,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::PageDiscovered,
        EventKind::FlowDiscovered,
        EventKind::DataExtracted,
        EventKind::FileDownloaded,
        EventKind::ExternalUrlFound,
        EventKind::Metrics,
        EventKind::LogMessage,
        EventKind::CrawlCompleted,
        EventKind::CrawlError,
    ];

    pub fn as_wire(self) -> &'static str {
        match self {
            EventKind::PageDiscovered => "PAGE_DISCOVERED",
            EventKind::FlowDiscovered => "FLOW_DISCOVERED",
            EventKind::DataExtracted => "DATA_EXTRACTED",
            EventKind::FileDownloaded => "FILE_DOWNLOADED",
            EventKind::ExternalUrlFound => "EXTERNAL_URL_FOUND",
            EventKind::Metrics => "METRICS",
            EventKind::LogMessage => "LOG",
            EventKind::CrawlCompleted => "CRAWL_COMPLETED",
            EventKind::CrawlError => "CRAWL_ERROR",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_wire() == raw)
    }
}

/// One unit of push-delivered progress information.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PageDiscovered {
        url: String,
        depth: u32,
        total_pages: u64,
    },
    FlowDiscovered {
        flow: FlowRecord,
        total_flows: u64,
    },
    /// `count` is a delta; every other total on the wire is absolute.
    DataExtracted {
        rule_name: String,
        count: u64,
        value: String,
    },
    FileDownloaded {
        file_name: String,
        size: u64,
        total_downloaded: u64,
    },
    ExternalUrlFound {
        url: String,
        total_external_urls: u64,
    },
    Metrics {
        pages_per_second: f64,
        active_threads: u64,
        queue_size: u64,
    },
    LogMessage(LogEntry),
    CrawlCompleted {
        timestamp: String,
    },
    CrawlError {
        timestamp: String,
        message: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PageDiscovered { .. } => EventKind::PageDiscovered,
            Event::FlowDiscovered { .. } => EventKind::FlowDiscovered,
            Event::DataExtracted { .. } => EventKind::DataExtracted,
            Event::FileDownloaded { .. } => EventKind::FileDownloaded,
            Event::ExternalUrlFound { .. } => EventKind::ExternalUrlFound,
            Event::Metrics { .. } => EventKind::Metrics,
            Event::LogMessage(_) => EventKind::LogMessage,
            Event::CrawlCompleted { .. } => EventKind::CrawlCompleted,
            Event::CrawlError { .. } => EventKind::CrawlError,
        }
    }
}
