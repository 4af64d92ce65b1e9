/// IO requested by [`crate::update`]; executed by the application's effect runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue one "start generation" request.
    TriggerJob { portfolio_id: String },
    /// Open the live event channel for a job.
    OpenChannel { job_id: String },
    /// Release the live event channel of a job that is no longer tracked.
    CloseChannel { job_id: String },
    /// Refresh the rendered preview of a portfolio.
    FetchPreview { portfolio_id: String },
}

/// How accepted events are ordered against the current latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Every delivered event becomes the latest one.
    #[default]
    LastReceivedWins,
    /// Drop events whose sequence number is not newer than the latest one.
    /// Events without a sequence number are always accepted.
    RejectStale,
}
