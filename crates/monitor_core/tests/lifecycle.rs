use monitor_core::{Command, InvalidTransition, SessionStatus};

const ALL: [SessionStatus; 8] = [
    SessionStatus::Idle,
    SessionStatus::Starting,
    SessionStatus::Running,
    SessionStatus::Paused,
    SessionStatus::Stopping,
    SessionStatus::Stopped,
    SessionStatus::Completed,
    SessionStatus::Failed,
];

#[test]
fn start_is_only_legal_from_idle() {
    for status in ALL {
        let result = status.begin(Command::Start);
        if status == SessionStatus::Idle {
            assert_eq!(result, Ok(SessionStatus::Starting));
        } else {
            assert_eq!(
                result,
                Err(InvalidTransition {
                    command: Command::Start,
                    status
                })
            );
        }
    }
}

#[test]
fn pause_and_resume_toggle_between_running_and_paused() {
    assert!(SessionStatus::Running.begin(Command::Pause).is_ok());
    assert_eq!(
        SessionStatus::Running.acknowledged(Command::Pause),
        SessionStatus::Paused
    );
    assert!(SessionStatus::Paused.begin(Command::Pause).is_err());
    assert!(SessionStatus::Running.begin(Command::Resume).is_err());
    assert_eq!(
        SessionStatus::Paused.acknowledged(Command::Resume),
        SessionStatus::Running
    );
}

#[test]
fn stop_passes_through_stopping() {
    for status in [SessionStatus::Running, SessionStatus::Paused] {
        assert_eq!(status.begin(Command::Stop), Ok(SessionStatus::Stopping));
    }
    assert_eq!(
        SessionStatus::Stopping.acknowledged(Command::Stop),
        SessionStatus::Stopped
    );
    assert!(SessionStatus::Completed.begin(Command::Stop).is_err());
    assert!(SessionStatus::Idle.begin(Command::Stop).is_err());
}

#[test]
fn reset_requires_a_terminal_or_idle_state() {
    for status in ALL {
        let legal = status.is_terminal() || status == SessionStatus::Idle;
        assert_eq!(status.begin(Command::Reset).is_ok(), legal, "{status}");
    }
}

#[test]
fn export_is_only_legal_after_a_normal_end() {
    for status in ALL {
        let legal = matches!(status, SessionStatus::Stopped | SessionStatus::Completed);
        let result = status.begin(Command::Export);
        if legal {
            assert_eq!(result, Ok(status));
        } else {
            assert_eq!(
                result,
                Err(InvalidTransition {
                    command: Command::Export,
                    status
                }),
                "{status}"
            );
        }
    }
}

#[test]
fn server_events_only_move_live_sessions() {
    assert_eq!(
        SessionStatus::Running.on_crawl_completed(),
        Some(SessionStatus::Completed)
    );
    assert_eq!(SessionStatus::Stopped.on_crawl_completed(), None);
    assert_eq!(
        SessionStatus::Stopping.on_crawl_completed(),
        Some(SessionStatus::Completed)
    );
    assert_eq!(
        SessionStatus::Stopping.on_crawl_error(),
        Some(SessionStatus::Failed)
    );
    assert_eq!(SessionStatus::Completed.on_crawl_error(), None);
}

#[test]
fn invalid_transition_message_names_command_and_state() {
    let err = SessionStatus::Paused.begin(Command::Pause).unwrap_err();
    assert_eq!(err.to_string(), "cannot pause while PAUSED");
}
