//! Genwatch engine: HTTP trigger, live event channel and effect execution.
mod api;
mod channel;
mod engine;
mod markup;
mod preview;
mod settings;
mod trigger;
mod types;

pub use api::ApiClient;
pub use channel::{ChannelHandle, LiveChannel};
pub use engine::{ChannelEventSink, EngineHandle, EventSink};
pub use markup::digest_markup;
pub use preview::{PreviewFetcher, ReqwestPreviewFetcher};
pub use settings::{EngineSettings, ReconnectPolicy, DEFAULT_API_BASE};
pub use trigger::{JobTrigger, ReqwestJobTrigger};
pub use types::{ApiError, ChannelSignal, EngineEvent, FailureKind};
