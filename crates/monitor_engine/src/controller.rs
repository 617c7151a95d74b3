//! Session lifecycle: commands, event application and end-of-session hydration.
//!
//! All mutation goes through one mutex so events, command results and the
//! finalization merge are applied in a single serialized order.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use monitor_core::{
    hydrate, reconcile, AggregateState, Command, CrawlConfig, Effect, LogEntry, LogLevel,
    MonitorViewModel, SessionStatus,
};
use monitor_logging::{monitor_debug, monitor_error, monitor_info, monitor_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::{ChannelSlot, ConnectionState, Delivery, EventSink, EventSource, ReconnectPolicy};
use crate::finalize::{fetch_final_snapshots, HydrateOutcome};
use crate::types::local_timestamp;
use crate::{
    ControlApi, ControlError, CrawlSessionSnapshot, DownloadedFile, ExportRequest, ExportedFiles,
    MonitorError, Session, SessionId, StateConflict,
};

/// Drives one crawl session at a time against a remote crawler.
///
/// Cloning is cheap; all clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    control: Arc<dyn ControlApi>,
    source: Arc<dyn EventSource>,
    policy: ReconnectPolicy,
    inner: Mutex<Inner>,
    changes: watch::Sender<u64>,
}

#[derive(Default)]
struct Inner {
    status: SessionStatus,
    session: Option<Session>,
    state: AggregateState,
    /// Bumped whenever the current session is replaced, stopped or cleared.
    epoch: u64,
    pending: Option<Command>,
    channel: ChannelSlot,
    last_error: Option<MonitorError>,
    hydrate_errors: Vec<MonitorError>,
    finalization: Option<JoinHandle<()>>,
    finalizations_started: u32,
}

impl Inner {
    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.state
            .push_log(LogEntry::new(local_timestamp(), level, message));
    }

    fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|session| &session.id)
    }

    fn mark_ended(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.ended_at = Some(Utc::now());
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn merge_final(&self, ticket: &Ticket, outcome: HydrateOutcome) {
        {
            let mut inner = lock(&self.inner);
            if !ticket.matches(&inner) {
                monitor_info!(
                    "discarding final snapshot of session {}: session changed",
                    ticket.session_id
                );
                return;
            }
            for snapshot in outcome.snapshots {
                monitor_debug!("hydrated {} for session {}", snapshot.collection(), ticket.session_id);
                inner.state = hydrate(std::mem::take(&mut inner.state), snapshot);
            }
            for failure in outcome.failures {
                monitor_warn!("session {}: {}", ticket.session_id, failure);
                inner.log(LogLevel::Error, failure.to_string());
                inner.hydrate_errors.push(failure);
            }
        }
        self.notify();
    }
}

/// Identity of the session a delivery or fetch belongs to.
#[derive(Debug, Clone)]
struct Ticket {
    session_id: SessionId,
    epoch: u64,
}

impl Ticket {
    fn matches(&self, inner: &Inner) -> bool {
        inner.epoch == self.epoch && inner.session_id() == Some(&self.session_id)
    }
}

struct SessionSink {
    shared: Weak<Shared>,
    ticket: Ticket,
}

impl SessionSink {
    fn apply_effect(&self, shared: &Arc<Shared>, inner: &mut Inner, effect: Effect) {
        match effect {
            Effect::SessionCompleted => match inner.status.on_crawl_completed() {
                Some(next) => {
                    monitor_info!("session {} completed", self.ticket.session_id);
                    inner.status = next;
                    inner.mark_ended();
                    self.spawn_finalization(shared, inner);
                }
                None => monitor_warn!(
                    "ignoring completion of session {} while {}",
                    self.ticket.session_id,
                    inner.status
                ),
            },
            Effect::SessionFailed { message } => match inner.status.on_crawl_error() {
                Some(next) => {
                    monitor_error!("session {} failed: {}", self.ticket.session_id, message);
                    inner.status = next;
                    inner.mark_ended();
                    inner.last_error = Some(MonitorError::ServerReported(message));
                }
                None => monitor_warn!(
                    "ignoring crawl error of session {} while {}: {}",
                    self.ticket.session_id,
                    inner.status,
                    message
                ),
            },
        }
    }

    fn spawn_finalization(&self, shared: &Arc<Shared>, inner: &mut Inner) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            monitor_error!("no runtime available to finalize session {}", self.ticket.session_id);
            return;
        };
        inner.finalizations_started += 1;
        let shared = Arc::clone(shared);
        let ticket = self.ticket.clone();
        inner.finalization = Some(runtime.spawn(async move {
            let outcome = fetch_final_snapshots(shared.control.as_ref(), &ticket.session_id).await;
            shared.merge_final(&ticket, outcome);
        }));
    }
}

impl EventSink for SessionSink {
    fn deliver(&self, delivery: Delivery) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        {
            let mut inner = lock(&shared.inner);
            if !self.ticket.matches(&inner) {
                monitor_debug!("dropping late delivery for session {}", self.ticket.session_id);
                return;
            }
            match delivery {
                Delivery::Event(event) => {
                    let (state, effects) = reconcile(std::mem::take(&mut inner.state), event);
                    inner.state = state;
                    for effect in effects {
                        self.apply_effect(&shared, &mut *inner, effect);
                    }
                }
                Delivery::Anomaly(reason) => {
                    inner.log(LogLevel::Warn, format!("Ignored unrecognized event: {reason}"));
                }
            }
        }
        shared.notify();
    }

    fn connection_changed(&self, state: &ConnectionState) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        {
            let mut inner = lock(&shared.inner);
            if !self.ticket.matches(&inner) {
                return;
            }
            if let ConnectionState::Failed { reason } = state {
                if !inner.status.is_terminal() {
                    inner.log(
                        LogLevel::Error,
                        format!("Lost connection to crawler: {reason}"),
                    );
                    inner.last_error = Some(MonitorError::Network(reason.clone()));
                }
            }
        }
        shared.notify();
    }
}

/// A command between its acceptance and its settlement.
///
/// Dropping an unsettled guard (for instance when the caller abandons the
/// future) clears the in-flight marker and restores the origin status.
struct CommandGuard {
    shared: Arc<Shared>,
    command: Command,
    origin: SessionStatus,
    in_flight: SessionStatus,
    epoch: u64,
    session_id: Option<SessionId>,
    settled: bool,
}

impl CommandGuard {
    fn is_current(&self, inner: &Inner) -> bool {
        inner.epoch == self.epoch && inner.status == self.in_flight
    }

    fn session_id(&self) -> Result<SessionId, MonitorError> {
        self.session_id.clone().ok_or(MonitorError::InvalidState {
            command: self.command,
            conflict: StateConflict::NoSession,
        })
    }

    /// Applies the command result. `apply` receives whether the session is
    /// still where the command left it; on error the origin status is restored.
    fn settle<T>(
        mut self,
        apply: impl FnOnce(&mut Inner, bool) -> Result<T, MonitorError>,
    ) -> Result<T, MonitorError> {
        self.settled = true;
        let result = {
            let mut inner = lock(&self.shared.inner);
            inner.pending = None;
            let current = self.is_current(&inner);
            let result = apply(&mut *inner, current);
            if result.is_err() && current {
                inner.status = self.origin;
            }
            result
        };
        self.shared.notify();
        result
    }
}

impl Drop for CommandGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        {
            let mut inner = lock(&self.shared.inner);
            inner.pending = None;
            if self.is_current(&inner) {
                inner.status = self.origin;
            }
        }
        monitor_warn!("{} command abandoned before completion", self.command);
        self.shared.notify();
    }
}

impl SessionController {
    pub fn new(control: Arc<dyn ControlApi>, source: Arc<dyn EventSource>) -> Self {
        Self::with_policy(control, source, ReconnectPolicy::default())
    }

    pub fn with_policy(
        control: Arc<dyn ControlApi>,
        source: Arc<dyn EventSource>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                control,
                source,
                policy,
                inner: Mutex::new(Inner::default()),
                changes,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.shared.inner)
    }

    fn begin(
        &self,
        command: Command,
        precheck: impl FnOnce(&Inner) -> Result<(), MonitorError>,
    ) -> Result<CommandGuard, MonitorError> {
        let guard = {
            let mut inner = self.lock();
            if let Some(in_flight) = inner.pending {
                return Err(MonitorError::InvalidState {
                    command,
                    conflict: StateConflict::CommandInFlight(in_flight),
                });
            }
            let next = inner
                .status
                .begin(command)
                .map_err(|err| MonitorError::InvalidState {
                    command,
                    conflict: StateConflict::Status(err.status),
                })?;
            precheck(&*inner)?;

            let guard = CommandGuard {
                shared: Arc::clone(&self.shared),
                command,
                origin: inner.status,
                in_flight: next,
                epoch: inner.epoch,
                session_id: inner.session_id().cloned(),
                settled: false,
            };
            inner.pending = Some(command);
            inner.status = next;
            guard
        };
        monitor_debug!("{} accepted, status {}", command, guard.in_flight);
        self.shared.notify();
        Ok(guard)
    }

    /// Starts a new crawl. Returns the session id assigned by the crawler.
    pub async fn start(&self, config: CrawlConfig) -> Result<SessionId, MonitorError> {
        let guard = self.begin(Command::Start, |_| Ok(config.validate()?))?;
        monitor_info!("starting crawl of {}", config.start_url);

        let acknowledged = self
            .shared
            .control
            .start(&config)
            .await
            .map_err(MonitorError::from)
            .and_then(|snapshot| {
                snapshot.session_id.ok_or_else(|| {
                    MonitorError::Network("start response carried no session id".to_string())
                })
            });

        guard.settle(|inner, _| match acknowledged {
            Ok(session_id) => {
                self.bind_session(inner, session_id.clone(), config);
                Ok(session_id)
            }
            Err(err) => {
                monitor_error!("start failed: {}", err);
                inner.log(LogLevel::Error, format!("Failed to start crawl: {err}"));
                inner.last_error = Some(err.clone());
                Err(err)
            }
        })
    }

    fn bind_session(&self, inner: &mut Inner, session_id: SessionId, config: CrawlConfig) {
        inner.channel.close();
        inner.epoch += 1;
        inner.state = AggregateState::new();
        inner.last_error = None;
        inner.hydrate_errors.clear();
        inner.finalizations_started = 0;
        inner.session = Some(Session {
            id: session_id.clone(),
            config,
            started_at: Utc::now(),
            ended_at: None,
        });
        inner.status = SessionStatus::Running;
        inner.log(
            LogLevel::Success,
            format!("Crawl started with session ID: {session_id}"),
        );
        monitor_info!("session {} running", session_id);

        let sink = Arc::new(SessionSink {
            shared: Arc::downgrade(&self.shared),
            ticket: Ticket {
                session_id: session_id.clone(),
                epoch: inner.epoch,
            },
        });
        inner.channel.open(
            Arc::clone(&self.shared.source),
            session_id,
            self.shared.policy,
            sink,
        );
    }

    pub async fn pause(&self) -> Result<(), MonitorError> {
        let guard = self.begin(Command::Pause, |_| Ok(()))?;
        let session_id = guard.session_id()?;
        let result = self.shared.control.pause(&session_id).await;
        self.settle_lifecycle(guard, result, "Crawl paused")
    }

    pub async fn resume(&self) -> Result<(), MonitorError> {
        let guard = self.begin(Command::Resume, |_| Ok(()))?;
        let session_id = guard.session_id()?;
        let result = self.shared.control.resume(&session_id).await;
        self.settle_lifecycle(guard, result, "Crawl resumed")
    }

    /// Stops the crawl and closes the event channel once the crawler acknowledges.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let guard = self.begin(Command::Stop, |_| Ok(()))?;
        let session_id = guard.session_id()?;
        let result = self.shared.control.stop(&session_id).await;
        self.settle_lifecycle(guard, result, "Crawl stopped")
    }

    fn settle_lifecycle(
        &self,
        guard: CommandGuard,
        result: Result<(), ControlError>,
        message: &'static str,
    ) -> Result<(), MonitorError> {
        let command = guard.command;
        guard.settle(|inner, current| {
            if let Err(err) = result {
                let err = MonitorError::from(err);
                monitor_error!("{} failed: {}", command, err);
                inner.log(LogLevel::Error, format!("Failed to {command} crawl: {err}"));
                inner.last_error = Some(err.clone());
                return Err(err);
            }
            if !current {
                monitor_info!("{} acknowledged after session moved to {}", command, inner.status);
                return Ok(());
            }

            inner.status = inner.status.acknowledged(command);
            if command == Command::Stop {
                inner.channel.close();
                inner.epoch += 1;
                inner.mark_ended();
            }
            inner.log(LogLevel::Info, message);
            monitor_info!("{}", message);
            Ok(())
        })
    }

    /// Asks the crawler to export the current session.
    pub async fn export(&self, request: &ExportRequest) -> Result<ExportedFiles, MonitorError> {
        let guard = self.begin(Command::Export, |inner| match inner.session {
            Some(_) => Ok(()),
            None => Err(MonitorError::InvalidState {
                command: Command::Export,
                conflict: StateConflict::NoSession,
            }),
        })?;
        let session_id = guard.session_id()?;
        let result = self.shared.control.export(&session_id, request).await;

        guard.settle(|inner, _| match result {
            Ok(files) => {
                monitor_info!("session {} exported to {} file(s)", session_id, files.len());
                inner.log(LogLevel::Success, "Export completed!");
                Ok(files)
            }
            Err(err) => {
                let err = MonitorError::from(err);
                monitor_error!("export failed: {}", err);
                inner.log(LogLevel::Error, format!("Failed to export: {err}"));
                inner.last_error = Some(err.clone());
                Err(err)
            }
        })
    }

    /// Returns to `Idle`, dropping the session, its data and any lingering channel.
    pub fn reset(&self) -> Result<(), MonitorError> {
        {
            let mut inner = self.lock();
            if let Some(in_flight) = inner.pending {
                return Err(MonitorError::InvalidState {
                    command: Command::Reset,
                    conflict: StateConflict::CommandInFlight(in_flight),
                });
            }
            if inner.status == SessionStatus::Idle {
                return Ok(());
            }
            inner
                .status
                .begin(Command::Reset)
                .map_err(|err| MonitorError::InvalidState {
                    command: Command::Reset,
                    conflict: StateConflict::Status(err.status),
                })?;

            inner.channel.close();
            inner.epoch += 1;
            inner.status = SessionStatus::Idle;
            inner.session = None;
            inner.state = AggregateState::new();
            inner.last_error = None;
            inner.hydrate_errors.clear();
            inner.finalizations_started = 0;
        }
        monitor_info!("session reset");
        self.shared.notify();
        Ok(())
    }

    /// Fetches the crawler's view of the current session. `None` without a session.
    pub async fn refresh_status(&self) -> Result<Option<CrawlSessionSnapshot>, MonitorError> {
        let Some(session_id) = self.session_id() else {
            return Ok(None);
        };
        let snapshot = self.shared.control.status(&session_id).await?;
        Ok(Some(snapshot))
    }

    pub async fn downloads(&self) -> Result<Option<Vec<DownloadedFile>>, MonitorError> {
        let Some(session_id) = self.session_id() else {
            return Ok(None);
        };
        let files = self.shared.control.downloads(&session_id).await?;
        Ok(Some(files))
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().session_id().cloned()
    }

    pub fn aggregate(&self) -> AggregateState {
        self.lock().state.clone()
    }

    pub fn view(&self) -> MonitorViewModel {
        let inner = self.lock();
        let connected = inner
            .channel
            .current()
            .is_some_and(|channel| channel.state().is_connected());
        inner.state.view(
            inner.status,
            inner.session_id().map(SessionId::as_str),
            connected,
        )
    }

    pub fn last_error(&self) -> Option<MonitorError> {
        self.lock().last_error.clone()
    }

    /// Collections that could not be refreshed when the session completed.
    pub fn hydrate_errors(&self) -> Vec<MonitorError> {
        self.lock().hydrate_errors.clone()
    }

    pub fn is_channel_open(&self) -> bool {
        self.lock().channel.current().is_some()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock()
            .channel
            .current()
            .map_or(ConnectionState::Disconnected, |channel| channel.state())
    }

    /// Ticks after every state change.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Finalization fetches started for the current session.
    pub fn finalization_count(&self) -> u32 {
        self.lock().finalizations_started
    }

    /// Waits for the most recent finalization fetch, if any, to be merged.
    pub async fn finalization_settled(&self) {
        let handle = self.lock().finalization.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                monitor_error!("finalization task failed: {}", err);
            }
        }
    }
}
