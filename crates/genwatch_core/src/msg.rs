#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The portfolio to generate for changed (`None` clears the selection).
    PortfolioSelected(Option<String>),
    /// User asked to start a generation job for the selected portfolio.
    GenerateRequested,
    /// Follow an already running job without triggering a new one.
    WatchRequested {
        job_id: String,
        portfolio_id: Option<String>,
    },
    /// The trigger request succeeded and returned the initial job snapshot.
    JobStarted(crate::GenerationJob),
    /// The trigger request failed.
    TriggerFailed { message: String },
    /// A decoded event arrived on the live channel of `job_id`.
    ProgressReceived {
        job_id: String,
        event: crate::GenerationProgressEvent,
    },
    /// The live channel of `job_id` gave up after a transport failure.
    ChannelFailed { job_id: String, reason: String },
    /// The live channel of `job_id` ended cleanly after a terminal event.
    ChannelClosed { job_id: String },
    /// The preview collaborator returned fresh markup.
    PreviewLoaded(crate::PreviewDigest),
    /// The preview collaborator failed; the previous preview is kept.
    PreviewFailed {
        portfolio_id: String,
        message: String,
    },
    /// Render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
