mod report;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use monitor_core::{LogEntry, SessionStatus};
use monitor_engine::{ReqwestControlApi, SessionController, SseEventSource};
use monitor_logging::{monitor_info, monitor_warn};

use crate::settings::MonitorSettings;

fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: crawl_monitor <settings.ron>")?;
    let settings = MonitorSettings::load(&path)?;
    monitor_logging::initialize(settings.destination()?, settings.level()?);
    monitor_info!("crawl_monitor using {}", path.display());

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(run(settings))
}

async fn run(settings: MonitorSettings) -> anyhow::Result<()> {
    let control = Arc::new(ReqwestControlApi::new(settings.control_settings())?);
    let source = Arc::new(SseEventSource::new(settings.control_settings())?);
    let controller = SessionController::with_policy(control, source, settings.reconnect_policy());
    let mut changes = controller.subscribe_changes();

    let session_id = controller.start(settings.crawl.clone()).await?;
    println!("session {session_id} started, Ctrl-C stops the crawl");

    let mut last_seen: Option<LogEntry> = None;
    let mut stop_requested = false;
    loop {
        let view = controller.view();
        for entry in report::entries_since(&view.log, last_seen.as_ref()) {
            println!("{entry}");
        }
        last_seen = view.log.first().cloned();
        println!("{}", report::progress_line(&view));
        if view.status.is_terminal() {
            break;
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal.context("failed to listen for Ctrl-C")?;
                stop_requested = true;
                if let Err(err) = controller.stop().await {
                    monitor_warn!("stop request failed: {}", err);
                    eprintln!("could not stop crawl: {err}");
                }
            }
        }
    }

    controller.finalization_settled().await;
    let view = controller.view();
    for entry in report::entries_since(&view.log, last_seen.as_ref()) {
        println!("{entry}");
    }
    for line in report::summary(&view) {
        println!("{line}");
    }

    let exportable = matches!(view.status, SessionStatus::Completed | SessionStatus::Stopped);
    if let Some(request) = settings.export.as_ref().filter(|_| exportable) {
        let files = controller.export(request).await?;
        for (format, path) in files {
            println!("exported {format}: {path}");
        }
    }

    if view.status == SessionStatus::Failed {
        match controller.last_error() {
            Some(err) => bail!(err),
            None => bail!("crawl failed"),
        }
    }
    Ok(())
}
