use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Lifecycle status shared by jobs and progress events.
///
/// Unknown strings are kept verbatim in `Other` so newer servers can add
/// statuses without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other(raw) => raw,
        }
    }

    /// Completed and failed jobs expect no further meaningful events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Other(raw),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        JobStatus::from(raw.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned once by the job trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub portfolio_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, deserialize_with = "deserialize_percent")]
    pub progress_percentage: u32,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// Minimal pending job, mostly useful for seeding tests.
    pub fn pending(id: impl Into<String>, portfolio_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            portfolio_id: portfolio_id.into(),
            status: JobStatus::Pending,
            progress_percentage: 0,
            current_step: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// One point-in-time status message about a job, as sent on the live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationProgressEvent {
    #[serde(default)]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(deserialize_with = "deserialize_percent")]
    pub progress: u32,
    #[serde(default)]
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Source sequence number; only consulted by [`crate::OrderingPolicy::RejectStale`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl GenerationProgressEvent {
    pub fn new(
        job_id: impl Into<String>,
        status: impl Into<JobStatus>,
        progress: u32,
        step: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: status.into(),
            progress,
            step: step.into(),
            url: None,
            error: None,
            seq: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

/// Rendered portfolio preview, reduced to something a terminal can show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviewDigest {
    pub portfolio_id: String,
    pub title: Option<String>,
    pub body: String,
}

// Servers occasionally send fractional or out-of-range percentages; the
// value is rounded and clamped to 0..=100.
fn deserialize_percent<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(de::Error::custom("progress must be a finite number"));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::{GenerationJob, GenerationProgressEvent, JobStatus};

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let status: JobStatus = serde_json::from_str("\"queued_remote\"").unwrap();
        assert_eq!(status, JobStatus::Other("queued_remote".to_string()));
        assert_eq!(status.as_str(), "queued_remote");
        assert!(!status.is_terminal());
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"queued_remote\"");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn job_snapshot_tolerates_missing_optional_fields() {
        let job: GenerationJob =
            serde_json::from_str(r#"{"id":"job1","status":"pending","progress_percentage":0}"#)
                .unwrap();
        assert_eq!(job.id, "job1");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.portfolio_id, "");
        assert_eq!(job.started_at, None);
    }

    #[test]
    fn job_snapshot_parses_timestamps() {
        let job: GenerationJob = serde_json::from_str(
            r#"{"id":"j","user_id":"u","portfolio_id":"p","status":"processing",
                "progress_percentage":12,"current_step":"Fetching",
                "started_at":"2024-05-01T10:00:00Z","completed_at":null}"#,
        )
        .unwrap();
        assert_eq!(job.user_id.as_deref(), Some("u"));
        assert_eq!(job.progress_percentage, 12);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn progress_is_rounded_and_clamped_to_percent_range() {
        let event: GenerationProgressEvent =
            serde_json::from_str(r#"{"status":"processing","progress":41.6,"step":"x"}"#).unwrap();
        assert_eq!(event.progress, 42);

        let event: GenerationProgressEvent =
            serde_json::from_str(r#"{"status":"processing","progress":-3,"step":"x"}"#).unwrap();
        assert_eq!(event.progress, 0);

        let event: GenerationProgressEvent =
            serde_json::from_str(r#"{"status":"processing","progress":250,"step":"x"}"#).unwrap();
        assert_eq!(event.progress, 100);

        let job: GenerationJob = serde_json::from_str(
            r#"{"id":"j","status":"completed","progress_percentage":180}"#,
        )
        .unwrap();
        assert_eq!(job.progress_percentage, 100);
    }
}
