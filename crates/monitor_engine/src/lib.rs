//! Monitor engine: control client, push channel and session lifecycle.
mod channel;
mod control;
mod controller;
mod finalize;
mod sse;
mod types;
mod wire;

pub use channel::{
    ChannelSlot, ConnectionState, Delivery, EventChannel, EventSink, EventSource, FrameStream,
    ReconnectPolicy,
};
pub use control::{ControlApi, ControlSettings, ReqwestControlApi};
pub use controller::SessionController;
pub use finalize::{fetch_final_snapshots, HydrateOutcome};
pub use sse::{SseDecoder, SseEventSource};
pub use types::{
    ChannelError, ControlError, ControlFailure, CrawlSessionSnapshot, DownloadedFile,
    ExportFormat, ExportRequest, ExportedFiles, MonitorError, Session, SessionId, StateConflict,
};
pub use wire::{decode_frame, WireError};
