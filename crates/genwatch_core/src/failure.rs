use crate::{GenerationProgressEvent, JobStatus};

/// Step text shown when the live stream is lost.
pub const DISCONNECT_STEP: &str = "WebSocket disconnected";

/// Builds the terminal event that stands in for a lost live stream, so the
/// view always settles on a renderable final state.
pub fn synthesize_disconnect(job_id: &str) -> GenerationProgressEvent {
    GenerationProgressEvent {
        job_id: job_id.to_string(),
        status: JobStatus::Failed,
        progress: 100,
        step: DISCONNECT_STEP.to_string(),
        url: None,
        error: None,
        seq: None,
    }
}
