use std::time::Duration;

use url::Url;

use crate::{ApiError, FailureKind};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub api_base: String,
    /// Live stream base; derived from `api_base` when unset.
    pub ws_base: Option<String>,
    pub access_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub preview_max_chars: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: None,
            access_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            preview_max_chars: 4_096,
        }
    }
}

impl EngineSettings {
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    /// Base URL of the live stream: the configured one, or the API base with
    /// `http` swapped for `ws`.
    pub fn ws_base(&self) -> String {
        if let Some(ws_base) = &self.ws_base {
            return ws_base.clone();
        }
        if let Some(rest) = self.api_base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.api_base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.api_base.clone()
        }
    }

    pub fn generation_stream_url(&self, job_id: &str) -> Result<Url, ApiError> {
        endpoint(&self.ws_base(), &["ws", "generation", job_id])
    }
}

/// Bounded exponential backoff for reconnecting a dropped live stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts after the first failure; 0 gives up immediately.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// A dropped session that delivered events and stayed up at least this
    /// long resets the retry budget; shorter sessions count as failures.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            stable_after: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before reconnect `attempt` (1-based): doubles each time, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = Url::parse(base)
        .map_err(|err| ApiError::new(FailureKind::InvalidUrl, format!("{base}: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::new(FailureKind::InvalidUrl, format!("{base}: not a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
