use crate::history::EventHistory;
use crate::view_model::{LogLine, ProgressView};
use crate::{GenerationJob, GenerationProgressEvent, JobStatus, OrderingPolicy, PreviewDigest};

/// Error recorded when generation is requested without a portfolio.
pub const MISSING_PORTFOLIO: &str = "Portfolio is required";

const IDLE_LABEL: &str = "idle";
const WAITING_LABEL: &str = "Waiting to start...";

/// Authoritative progress view of the tracked generation job.
///
/// Only [`crate::update`] mutates it; everything else reads snapshots via
/// [`ProgressState::view`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressState {
    ordering: OrderingPolicy,
    portfolio_id: Option<String>,
    trigger_pending: bool,
    trigger_error: Option<String>,
    active_job_id: Option<String>,
    seed: Option<GenerationJob>,
    latest: Option<GenerationProgressEvent>,
    history: EventHistory,
    events_seen: u64,
    channel_failed: bool,
    channel_closed: bool,
    preview: Option<PreviewDigest>,
    dirty: bool,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ordering(ordering: OrderingPolicy) -> Self {
        Self {
            ordering,
            ..Self::default()
        }
    }

    pub fn ordering(&self) -> OrderingPolicy {
        self.ordering
    }

    pub fn portfolio_id(&self) -> Option<&str> {
        self.portfolio_id.as_deref()
    }

    pub fn active_job_id(&self) -> Option<&str> {
        self.active_job_id.as_deref()
    }

    pub fn seed(&self) -> Option<&GenerationJob> {
        self.seed.as_ref()
    }

    pub fn latest(&self) -> Option<&GenerationProgressEvent> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn trigger_pending(&self) -> bool {
        self.trigger_pending
    }

    pub fn trigger_error(&self) -> Option<&str> {
        self.trigger_error.as_deref()
    }

    pub fn preview(&self) -> Option<&PreviewDigest> {
        self.preview.as_ref()
    }

    pub fn channel_closed(&self) -> bool {
        self.channel_closed
    }

    /// Latest event's progress, else the seed's, else 0.
    pub fn progress(&self) -> u32 {
        self.latest
            .as_ref()
            .map(|event| event.progress)
            .or_else(|| self.seed.as_ref().map(|job| job.progress_percentage))
            .unwrap_or(0)
    }

    /// Status of the latest event, falling back to the seed's.
    pub fn status(&self) -> Option<&JobStatus> {
        self.latest
            .as_ref()
            .map(|event| &event.status)
            .or_else(|| self.seed.as_ref().map(|job| &job.status))
    }

    pub fn is_generating(&self) -> bool {
        if self.trigger_pending {
            return true;
        }
        self.active_job_id.is_some()
            && matches!(
                self.status(),
                Some(JobStatus::Pending | JobStatus::Processing) | None
            )
    }

    pub fn view(&self) -> ProgressView {
        let latest = self.latest.as_ref();
        let is_generating = self.is_generating();
        ProgressView {
            job_id: self.active_job_id.clone(),
            status_label: latest
                .map(|event| event.status.to_string())
                .unwrap_or_else(|| IDLE_LABEL.to_string()),
            progress: self.progress().min(100),
            step_label: latest
                .map(|event| event.step.clone())
                .filter(|step| !step.is_empty())
                .unwrap_or_else(|| WAITING_LABEL.to_string()),
            is_generating,
            is_terminal: self.status().is_some_and(JobStatus::is_terminal),
            can_trigger: self.portfolio_id.is_some() && !is_generating,
            result_url: latest.and_then(|event| event.url.clone()),
            error: self
                .trigger_error
                .clone()
                .or_else(|| latest.and_then(|event| event.error.clone()))
                .or_else(|| self.seed.as_ref().and_then(|job| job.error_message.clone())),
            log: self.history.iter().map(LogLine::from).collect(),
            events_seen: self.events_seen,
            started_at: self.seed.as_ref().and_then(|job| job.started_at),
            preview: self.preview.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_active_job(&self, job_id: &str) -> bool {
        self.active_job_id.as_deref() == Some(job_id)
    }

    /// Portfolio whose preview follows this job.
    pub(crate) fn preview_portfolio_id(&self) -> Option<String> {
        self.seed
            .as_ref()
            .map(|job| job.portfolio_id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| self.portfolio_id.clone())
    }

    pub(crate) fn select_portfolio(&mut self, portfolio_id: Option<String>) {
        let portfolio_id = portfolio_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if self.portfolio_id != portfolio_id {
            self.portfolio_id = portfolio_id;
            self.preview = None;
            self.mark_dirty();
        }
    }

    pub(crate) fn begin_trigger(&mut self) {
        self.trigger_pending = true;
        self.trigger_error = None;
        self.mark_dirty();
    }

    pub(crate) fn record_trigger_error(&mut self, message: impl Into<String>) {
        self.trigger_pending = false;
        self.trigger_error = Some(message.into());
        self.mark_dirty();
    }

    /// Switches tracking to a new job and returns the previously active job id.
    pub(crate) fn track_job(
        &mut self,
        job_id: String,
        seed: Option<GenerationJob>,
    ) -> Option<String> {
        let previous = self.active_job_id.replace(job_id);
        self.trigger_pending = false;
        self.trigger_error = None;
        self.seed = seed;
        self.latest = None;
        self.history.clear();
        self.events_seen = 0;
        self.channel_failed = false;
        self.channel_closed = false;
        self.mark_dirty();
        previous
    }

    /// Whether the ordering policy lets `event` replace the current latest.
    pub(crate) fn admits(&self, event: &GenerationProgressEvent) -> bool {
        match self.ordering {
            OrderingPolicy::LastReceivedWins => true,
            OrderingPolicy::RejectStale => {
                match (event.seq, self.latest.as_ref().and_then(|latest| latest.seq)) {
                    (Some(incoming), Some(current)) => incoming > current,
                    _ => true,
                }
            }
        }
    }

    pub(crate) fn accept_event(&mut self, event: GenerationProgressEvent) {
        self.history.push(event.clone());
        self.events_seen += 1;
        self.latest = Some(event);
        self.mark_dirty();
    }

    /// Records the first transport failure of the active channel; later ones return false.
    pub(crate) fn mark_channel_failed(&mut self) -> bool {
        !std::mem::replace(&mut self.channel_failed, true)
    }

    pub(crate) fn mark_channel_closed(&mut self) {
        self.channel_closed = true;
        self.mark_dirty();
    }

    pub(crate) fn set_preview(&mut self, preview: PreviewDigest) {
        self.preview = Some(preview);
        self.mark_dirty();
    }
}
