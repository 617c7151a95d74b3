//! Decoding of push-channel envelopes `{type, sessionId?, timestamp?, data}` into core events.
use monitor_core::{Event, EventKind, FlowRecord, LogEntry, LogLevel};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("unrecognized event type {0:?}")]
    UnknownKind(String),
    #[error("bad {} payload: {message}", .kind.as_wire())]
    Payload { kind: EventKind, message: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagePayload {
    #[serde(default)]
    url: String,
    #[serde(default)]
    depth: u32,
    total_pages: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowPayload {
    #[serde(default)]
    flow_id: Option<u64>,
    #[serde(default)]
    path: Vec<String>,
    total_flows: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionPayload {
    #[serde(default)]
    rule_name: String,
    count: u64,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadPayload {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    size: u64,
    total_downloaded: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExternalUrlPayload {
    #[serde(default)]
    url: String,
    total_external_urls: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsPayload {
    pages_per_second: f64,
    #[serde(default)]
    active_threads: u64,
    queue_size: u64,
}

#[derive(Debug, Deserialize)]
struct LogPayload {
    #[serde(default)]
    level: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default, alias = "message")]
    error: Option<String>,
}

/// Decodes one text frame. `received_at` stamps entries whose envelope carries no timestamp.
pub fn decode_frame(frame: &str, received_at: &str) -> Result<Event, WireError> {
    let envelope: Envelope =
        serde_json::from_str(frame).map_err(|err| WireError::Malformed(err.to_string()))?;
    let kind =
        EventKind::from_wire(&envelope.kind).ok_or(WireError::UnknownKind(envelope.kind))?;
    let timestamp = envelope
        .timestamp
        .unwrap_or_else(|| received_at.to_string());
    let data = envelope.data;

    let event = match kind {
        EventKind::PageDiscovered => {
            let payload: PagePayload = payload(kind, data)?;
            Event::PageDiscovered {
                url: payload.url,
                depth: payload.depth,
                total_pages: payload.total_pages,
            }
        }
        EventKind::FlowDiscovered => {
            let payload: FlowPayload = payload(kind, data)?;
            Event::FlowDiscovered {
                flow: FlowRecord {
                    id: payload.flow_id,
                    path: payload.path,
                    ..FlowRecord::default()
                },
                total_flows: payload.total_flows,
            }
        }
        EventKind::DataExtracted => {
            let payload: ExtractionPayload = payload(kind, data)?;
            Event::DataExtracted {
                rule_name: payload.rule_name,
                count: payload.count,
                value: payload.value,
            }
        }
        EventKind::FileDownloaded => {
            let payload: DownloadPayload = payload(kind, data)?;
            Event::FileDownloaded {
                file_name: payload.file_name,
                size: payload.size,
                total_downloaded: payload.total_downloaded,
            }
        }
        EventKind::ExternalUrlFound => {
            let payload: ExternalUrlPayload = payload(kind, data)?;
            Event::ExternalUrlFound {
                url: payload.url,
                total_external_urls: payload.total_external_urls,
            }
        }
        EventKind::Metrics => {
            let payload: MetricsPayload = payload(kind, data)?;
            Event::Metrics {
                pages_per_second: payload.pages_per_second,
                active_threads: payload.active_threads,
                queue_size: payload.queue_size,
            }
        }
        EventKind::LogMessage => {
            let payload: LogPayload = payload(kind, data)?;
            Event::LogMessage(LogEntry::new(
                timestamp,
                LogLevel::from_wire(&payload.level),
                payload.message,
            ))
        }
        EventKind::CrawlCompleted => Event::CrawlCompleted { timestamp },
        EventKind::CrawlError => {
            let payload: ErrorPayload = if data.is_null() {
                ErrorPayload::default()
            } else {
                payload(kind, data)?
            };
            Event::CrawlError {
                timestamp,
                message: payload
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            }
        }
    };
    Ok(event)
}

fn payload<T: DeserializeOwned>(kind: EventKind, data: Value) -> Result<T, WireError> {
    serde_json::from_value(data).map_err(|err| WireError::Payload {
        kind,
        message: err.to_string(),
    })
}
