use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use monitor_core::{Collection, Command, CrawlConfig, SessionStatus, ValidationError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque identifier of a remote crawl session.
///
/// The crawler hands out numeric ids; they are kept as text so any id scheme round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<u64>() {
            Ok(numeric) => serializer.serialize_u64(numeric),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(id) => SessionId(id.to_string()),
            RawId::Text(id) => SessionId(id),
        })
    }
}

/// The session currently tracked by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub config: CrawlConfig,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Session summary returned by the start, lifecycle and status endpoints.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlSessionSnapshot {
    pub session_id: Option<SessionId>,
    pub status: Option<String>,
    pub start_url: Option<String>,
    pub base_domain: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub total_pages: Option<u64>,
    pub total_flows: Option<u64>,
    pub total_extracted: Option<u64>,
    pub total_downloaded: Option<u64>,
    pub total_external_urls: Option<u64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadedFile {
    pub id: Option<u64>,
    pub page_id: Option<u64>,
    pub url: String,
    pub local_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub download_success: Option<bool>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Json,
    Csv,
    Excel,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportRequest {
    pub formats: Vec<ExportFormat>,
    pub include_pages: bool,
    pub include_flows: bool,
    pub include_extracted_data: bool,
    pub include_downloaded_files: bool,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            formats: vec![ExportFormat::Json],
            include_pages: true,
            include_flows: true,
            include_extracted_data: true,
            include_downloaded_files: true,
        }
    }
}

impl ExportRequest {
    pub fn with_formats(formats: impl Into<Vec<ExportFormat>>) -> Self {
        Self {
            formats: formats.into(),
            ..Self::default()
        }
    }
}

/// Export result: format name to the file path written by the crawler.
pub type ExportedFiles = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ControlError {
    pub kind: ControlFailure,
    pub message: String,
}

impl ControlError {
    pub(crate) fn new(kind: ControlFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Decode,
    Network,
}

impl fmt::Display for ControlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlFailure::InvalidUrl => write!(f, "invalid url"),
            ControlFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ControlFailure::Timeout => write!(f, "timeout"),
            ControlFailure::Decode => write!(f, "malformed response"),
            ControlFailure::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("could not subscribe: {0}")]
    Connect(String),
    #[error("subscription rejected with http status {0}")]
    HttpStatus(u16),
    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// Why a command was refused by the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateConflict {
    Status(SessionStatus),
    CommandInFlight(Command),
    NoSession,
}

impl fmt::Display for StateConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateConflict::Status(status) => write!(f, "session is {status}"),
            StateConflict::CommandInFlight(command) => {
                write!(f, "a {command} command is already in flight")
            }
            StateConflict::NoSession => write!(f, "no session has been started"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid crawl configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Network(String),
    #[error("cannot {command}: {conflict}")]
    InvalidState {
        command: Command,
        conflict: StateConflict,
    },
    #[error("crawler reported an error: {0}")]
    ServerReported(String),
    #[error("failed to load final {collection}: {message}")]
    PartialHydrate {
        collection: Collection,
        message: String,
    },
}

impl From<ControlError> for MonitorError {
    fn from(err: ControlError) -> Self {
        MonitorError::Network(err.to_string())
    }
}

impl From<ChannelError> for MonitorError {
    fn from(err: ChannelError) -> Self {
        MonitorError::Network(err.to_string())
    }
}

/// Wall-clock time used to stamp locally generated log entries.
pub(crate) fn local_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
