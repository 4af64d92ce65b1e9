use std::fmt;

use genwatch_core::{GenerationJob, GenerationProgressEvent, PreviewDigest};

/// Something the engine observed, delivered through an [`crate::EventSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    JobStarted(GenerationJob),
    TriggerFailed {
        portfolio_id: String,
        error: ApiError,
    },
    Channel {
        job_id: String,
        signal: ChannelSignal,
    },
    PreviewLoaded(PreviewDigest),
    PreviewFailed {
        portfolio_id: String,
        error: ApiError,
    },
}

/// Items produced by a live event channel.
///
/// A channel yields any number of `Event`s and then at most one of `Failed`
/// or `Closed`, after which it is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    Event(GenerationProgressEvent),
    /// The transport failed and the reconnect budget is spent.
    Failed { reason: String },
    /// The server closed the stream after a terminal event.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    MissingPortfolio,
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MissingPortfolio => write!(f, "missing portfolio"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}
