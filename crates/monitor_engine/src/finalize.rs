use monitor_core::{Collection, Snapshot};

use crate::{ControlApi, ControlError, MonitorError, SessionId};

/// Result of the end-of-session fetch. Each collection lands in exactly one of the two lists.
#[derive(Debug, Default)]
pub struct HydrateOutcome {
    pub snapshots: Vec<Snapshot>,
    pub failures: Vec<MonitorError>,
}

impl HydrateOutcome {
    fn record(&mut self, collection: Collection, result: Result<Snapshot, ControlError>) {
        match result {
            Ok(snapshot) => self.snapshots.push(snapshot),
            Err(err) => self.failures.push(MonitorError::PartialHydrate {
                collection,
                message: err.to_string(),
            }),
        }
    }
}

/// Requests pages, flows and extracted data concurrently.
pub async fn fetch_final_snapshots(control: &dyn ControlApi, session_id: &SessionId) -> HydrateOutcome {
    let (pages, flows, extracted) = tokio::join!(
        control.pages(session_id),
        control.flows(session_id),
        control.extracted_data(session_id),
    );

    let mut outcome = HydrateOutcome::default();
    outcome.record(Collection::Pages, pages.map(Snapshot::Pages));
    outcome.record(Collection::Flows, flows.map(Snapshot::Flows));
    outcome.record(
        Collection::ExtractedData,
        extracted.map(Snapshot::ExtractedData),
    );
    outcome
}
