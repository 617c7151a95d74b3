//! Crawl monitor core: pure session state machine, event reconciliation and view-model helpers.
mod config;
mod effect;
mod event;
mod lifecycle;
mod reconcile;
mod state;
mod view_model;

pub use config::{
    CrawlConfig, ExtractionRule, SelectorType, ValidationError, MAX_CONCURRENT_THREADS,
    MAX_DEPTH_LIMIT, MAX_PAGES_LIMIT,
};
pub use effect::Effect;
pub use event::{Event, EventKind};
pub use lifecycle::{Command, InvalidTransition, SessionStatus};
pub use reconcile::{hydrate, reconcile};
pub use state::{
    AggregateState, Collection, Counters, ExtractedRecord, FlowRecord, LogBuffer, LogEntry,
    LogLevel, PageRecord, Snapshot, LOG_CAPACITY,
};
pub use view_model::MonitorViewModel;
