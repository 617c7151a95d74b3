/// Side effects the session controller performs after an event is reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The crawl finished; move to `Completed` and run the finalization fetch.
    SessionCompleted,
    /// The crawler reported a fatal error; move to `Failed`.
    SessionFailed { message: String },
}
