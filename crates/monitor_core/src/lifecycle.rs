use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Stopped | SessionStatus::Completed | SessionStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "IDLE",
            SessionStatus::Starting => "STARTING",
            SessionStatus::Running => "RUNNING",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Stopping => "STOPPING",
            SessionStatus::Stopped => "STOPPED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
        }
    }

    /// Status to hold while `command` is in flight.
    ///
    /// Pause, resume and export have no intermediate state; the status only
    /// changes once the command is acknowledged. Export needs a session that
    /// ended normally.
    pub fn begin(self, command: Command) -> Result<SessionStatus, InvalidTransition> {
        use SessionStatus::*;
        let next = match (self, command) {
            (Idle, Command::Start) => Starting,
            (Running, Command::Pause) => Running,
            (Paused, Command::Resume) => Paused,
            (Running | Paused, Command::Stop) => Stopping,
            (Stopped | Completed, Command::Export) => self,
            (Idle | Stopped | Completed | Failed, Command::Reset) => Idle,
            (status, command) => return Err(InvalidTransition { command, status }),
        };
        Ok(next)
    }

    /// Status after the server acknowledged `command`.
    pub fn acknowledged(self, command: Command) -> SessionStatus {
        match command {
            Command::Start | Command::Resume => SessionStatus::Running,
            Command::Pause => SessionStatus::Paused,
            Command::Stop => SessionStatus::Stopped,
            Command::Reset => SessionStatus::Idle,
            Command::Export => self,
        }
    }

    /// Transition forced by a `CrawlCompleted` event, if it applies.
    ///
    /// A completion racing a stop wins; the late stop acknowledgement is then
    /// ignored.
    pub fn on_crawl_completed(self) -> Option<SessionStatus> {
        match self {
            SessionStatus::Running | SessionStatus::Paused | SessionStatus::Stopping => {
                Some(SessionStatus::Completed)
            }
            _ => None,
        }
    }

    /// Transition forced by a `CrawlError` event, if it applies.
    pub fn on_crawl_error(self) -> Option<SessionStatus> {
        match self {
            SessionStatus::Running | SessionStatus::Paused | SessionStatus::Stopping => {
                Some(SessionStatus::Failed)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Export,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Reset => "reset",
            Command::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub command: Command,
    pub status: SessionStatus,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} while {}", self.command, self.status)
    }
}

impl std::error::Error for InvalidTransition {}
