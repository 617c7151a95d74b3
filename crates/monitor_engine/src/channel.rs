use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use monitor_core::Event;
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::local_timestamp;
use crate::wire::decode_frame;
use crate::{ChannelError, SessionId};

/// Raw text frames of one subscription, in arrival order.
pub type FrameStream = BoxStream<'static, Result<String, ChannelError>>;

#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self, session_id: &SessionId) -> Result<FrameStream, ChannelError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(Event),
    /// A frame that could not be decoded into a known event.
    Anomaly(String),
}

/// Consumer of a channel. Called from the channel task, one delivery at a time.
pub trait EventSink: Send + Sync {
    fn deliver(&self, delivery: Delivery);

    fn connection_changed(&self, _state: &ConnectionState) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
    },
    Disconnected,
    Failed {
        reason: String,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Backoff before reconnect `attempt` (1-based): doubles each time, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// One logical subscription to the event topic of a session.
#[derive(Debug)]
pub struct EventChannel {
    session_id: SessionId,
    cancel: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
    task: Option<JoinHandle<()>>,
}

impl EventChannel {
    /// Spawns the subscription task on the current tokio runtime.
    pub fn open(
        source: Arc<dyn EventSource>,
        session_id: SessionId,
        policy: ReconnectPolicy,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);
        let worker = Worker {
            source,
            session_id: session_id.clone(),
            policy,
            sink,
            cancel: cancel.clone(),
            state: state.clone(),
        };
        let task = tokio::spawn(worker.run());
        monitor_debug!("event channel opened for session {}", session_id);
        Self {
            session_id,
            cancel,
            state,
            task: Some(task),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.task.is_some()
    }

    /// Stops the subscription. No delivery reaches the sink after this returns
    /// unless it was already inside `deliver`.
    pub fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.cancel.cancel();
        task.abort();
        self.state.send_replace(ConnectionState::Disconnected);
        monitor_debug!("event channel closed for session {}", self.session_id);
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker {
    source: Arc<dyn EventSource>,
    session_id: SessionId,
    policy: ReconnectPolicy,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Worker {
    async fn run(self) {
        let mut attempt: u32 = 0;
        loop {
            let subscribed = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.source.subscribe(&self.session_id) => result,
            };

            let reason = match subscribed {
                Ok(mut frames) => {
                    monitor_info!("event channel connected for session {}", self.session_id);
                    self.publish(ConnectionState::Connected);
                    loop {
                        let next = tokio::select! {
                            _ = self.cancel.cancelled() => return,
                            next = frames.next() => next,
                        };
                        match next {
                            Some(Ok(frame)) => {
                                attempt = 0;
                                if !self.forward(&frame) {
                                    return;
                                }
                            }
                            Some(Err(err)) => break err.to_string(),
                            None => break "stream ended".to_string(),
                        }
                    }
                }
                Err(err) => err.to_string(),
            };

            attempt += 1;
            if attempt > self.policy.max_retries {
                monitor_warn!(
                    "giving up on event channel for session {} after {} retries: {}",
                    self.session_id,
                    self.policy.max_retries,
                    reason
                );
                self.publish(ConnectionState::Failed { reason });
                return;
            }

            let delay = self.policy.delay_for(attempt);
            monitor_warn!(
                "event channel for session {} lost ({}), retry {} in {:?}",
                self.session_id,
                reason,
                attempt,
                delay
            );
            self.publish(ConnectionState::Reconnecting { attempt });
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Decodes and delivers one frame. Returns false once the channel is closed.
    fn forward(&self, frame: &str) -> bool {
        let delivery = match decode_frame(frame, &local_timestamp()) {
            Ok(event) => Delivery::Event(event),
            Err(err) => {
                monitor_warn!("session {}: {}", self.session_id, err);
                Delivery::Anomaly(err.to_string())
            }
        };
        if self.cancel.is_cancelled() {
            return false;
        }
        self.sink.deliver(delivery);
        true
    }

    fn publish(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if self.cancel.is_cancelled() || *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            self.sink.connection_changed(&next);
        }
    }
}

/// Holds at most one open channel; opening a new one closes the previous first.
#[derive(Debug, Default)]
pub struct ChannelSlot {
    current: Option<EventChannel>,
}

impl ChannelSlot {
    pub fn open(
        &mut self,
        source: Arc<dyn EventSource>,
        session_id: SessionId,
        policy: ReconnectPolicy,
        sink: Arc<dyn EventSink>,
    ) -> &EventChannel {
        self.close();
        self.current
            .insert(EventChannel::open(source, session_id, policy, sink))
    }

    /// Returns whether a channel was open.
    pub fn close(&mut self) -> bool {
        match self.current.take() {
            Some(mut channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&EventChannel> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }
}
