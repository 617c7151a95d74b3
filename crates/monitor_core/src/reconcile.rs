use crate::{AggregateState, Effect, Event, ExtractedRecord, LogEntry, LogLevel, Snapshot};

/// Pure reconciler: applies one event to the aggregate state and returns any effects.
///
/// Page, flow, download and external-URL totals arrive as absolutes and overwrite
/// the local value. Extraction counts arrive as deltas and are accumulated.
pub fn reconcile(mut state: AggregateState, event: Event) -> (AggregateState, Vec<Effect>) {
    let effects = match event {
        Event::PageDiscovered { total_pages, .. } => {
            state.counters_mut().total_pages = total_pages;
            Vec::new()
        }
        Event::FlowDiscovered { flow, total_flows } => {
            state.counters_mut().total_flows = total_flows;
            state.append_flow(flow);
            Vec::new()
        }
        Event::DataExtracted {
            rule_name,
            count,
            value,
        } => {
            let counters = state.counters_mut();
            counters.total_extracted = counters.total_extracted.saturating_add(count);
            state.append_extracted(ExtractedRecord {
                rule_name: Some(rule_name),
                value: Some(value),
                count: Some(count),
                ..ExtractedRecord::default()
            });
            Vec::new()
        }
        Event::FileDownloaded {
            total_downloaded, ..
        } => {
            state.counters_mut().total_downloaded = total_downloaded;
            Vec::new()
        }
        Event::ExternalUrlFound {
            total_external_urls,
            ..
        } => {
            state.counters_mut().total_external_urls = total_external_urls;
            Vec::new()
        }
        Event::Metrics {
            pages_per_second,
            active_threads,
            queue_size,
        } => {
            let counters = state.counters_mut();
            counters.pages_per_second = pages_per_second;
            counters.active_threads = active_threads;
            counters.queue_size = queue_size;
            Vec::new()
        }
        Event::LogMessage(entry) => {
            state.push_log(entry);
            Vec::new()
        }
        Event::CrawlCompleted { timestamp } => {
            state.push_log(LogEntry::new(
                timestamp,
                LogLevel::Success,
                "Crawl completed successfully!",
            ));
            vec![Effect::SessionCompleted]
        }
        Event::CrawlError { timestamp, message } => {
            state.push_log(LogEntry::new(
                timestamp,
                LogLevel::Error,
                format!("Crawl failed: {message}"),
            ));
            vec![Effect::SessionFailed { message }]
        }
    };

    (state, effects)
}

/// Replaces one collection wholesale with a canonical snapshot.
pub fn hydrate(mut state: AggregateState, snapshot: Snapshot) -> AggregateState {
    state.replace(snapshot);
    state
}
