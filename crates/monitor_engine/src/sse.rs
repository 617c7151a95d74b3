//! `text/event-stream` transport for the push channel.
use bytes::BytesMut;
use futures_util::{future, stream, StreamExt};
use reqwest::header::ACCEPT;

use crate::channel::{EventSource, FrameStream};
use crate::{ChannelError, ControlSettings, SessionId};

/// Longest line accepted before the stream is considered corrupt.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental decoder turning raw stream bytes into `data` payloads.
///
/// Multi-line `data:` fields are joined with `\n`; comments and other
/// fields are ignored. A frame is emitted on the blank line that ends it.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails once a pending line grows past [`MAX_LINE_BYTES`] without a newline.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ChannelError> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw = self.buffer.split_to(newline + 1);
            let text = String::from_utf8_lossy(&raw[..newline]);
            let line = text.strip_suffix('\r').unwrap_or(text.as_ref());
            if let Some(frame) = self.feed_line(line) {
                frames.push(frame);
            }
        }
        if self.buffer.len() > MAX_LINE_BYTES {
            let pending = self.buffer.len();
            self.buffer.clear();
            self.data.clear();
            return Err(ChannelError::Stream(format!(
                "line exceeds {MAX_LINE_BYTES} bytes ({pending} pending)"
            )));
        }
        Ok(frames)
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.data).join("\n"));
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct SseEventSource {
    settings: ControlSettings,
    client: reqwest::Client,
}

impl SseEventSource {
    /// The stream is long-lived, so no overall request timeout applies. A read
    /// that stalls past `stream_idle_timeout` ends the stream with an error.
    pub fn new(settings: ControlSettings) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.stream_idle_timeout)
            .build()
            .map_err(|err| ChannelError::Connect(err.to_string()))?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl EventSource for SseEventSource {
    async fn subscribe(&self, session_id: &SessionId) -> Result<FrameStream, ChannelError> {
        let url = self
            .settings
            .endpoint(&format!("crawler/{session_id}/events"))
            .map_err(|err| ChannelError::Connect(err.to_string()))?;
        monitor_logging::monitor_debug!("subscribing to {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| ChannelError::Connect(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::HttpStatus(status.as_u16()));
        }

        let frames = response
            .bytes_stream()
            .scan(SseDecoder::new(), |decoder, chunk| {
                let batch: Vec<Result<String, ChannelError>> = match chunk {
                    Ok(bytes) => match decoder.push(&bytes) {
                        Ok(frames) => frames.into_iter().map(Ok).collect(),
                        Err(err) => vec![Err(err)],
                    },
                    Err(err) => vec![Err(ChannelError::Stream(err.to_string()))],
                };
                future::ready(Some(stream::iter(batch)))
            })
            .flatten()
            .boxed();
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_across_chunks_are_reassembled() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":").unwrap().is_empty());
        assert!(decoder.push(b"\"METRICS\"}\r\n").unwrap().is_empty());
        assert_eq!(
            decoder.push(b"\r\n").unwrap(),
            vec!["{\"type\":\"METRICS\"}".to_string()]
        );
    }

    #[test]
    fn comments_and_named_events_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .push(b": keep-alive\n\nevent: LOG\ndata: a\ndata: b\n\n")
            .unwrap();
        assert_eq!(frames, vec!["a\nb".to_string()]);
    }

    #[test]
    fn unterminated_line_past_the_cap_is_an_error() {
        let mut decoder = SseDecoder::new();
        let chunk = vec![b'x'; MAX_LINE_BYTES / 2];
        assert!(decoder.push(b"data: ").unwrap().is_empty());
        assert!(decoder.push(&chunk).unwrap().is_empty());
        assert!(matches!(decoder.push(&chunk), Err(ChannelError::Stream(_))));

        let frames = decoder.push(b"data: ok\n\n").unwrap();
        assert_eq!(frames, vec!["ok".to_string()]);
    }
}
