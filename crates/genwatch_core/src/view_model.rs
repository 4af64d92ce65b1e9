use std::fmt;

use chrono::{DateTime, Utc};

use crate::{GenerationProgressEvent, PreviewDigest};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressView {
    pub job_id: Option<String>,
    pub status_label: String,
    /// Derived progress, clamped to 0..=100.
    pub progress: u32,
    pub step_label: String,
    pub is_generating: bool,
    pub is_terminal: bool,
    pub can_trigger: bool,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub log: Vec<LogLine>,
    /// Events accepted for this job, including ones evicted from `log`.
    pub events_seen: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub preview: Option<PreviewDigest>,
    pub dirty: bool,
}

/// One entry of the live log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub status: String,
    pub progress: u32,
    pub step: String,
}

impl From<&GenerationProgressEvent> for LogLine {
    fn from(event: &GenerationProgressEvent) -> Self {
        Self {
            status: event.status.to_string(),
            progress: event.progress,
            step: event.step.clone(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}% - {}", self.status, self.progress, self.step)
    }
}
