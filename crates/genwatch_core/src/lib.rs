//! Genwatch core: pure progress state machine and view-model helpers.
mod decode;
mod effect;
mod failure;
mod history;
mod model;
mod msg;
mod state;
mod update;
mod view_model;

pub use decode::{decode_event, DecodeError};
pub use effect::{Effect, OrderingPolicy};
pub use failure::{synthesize_disconnect, DISCONNECT_STEP};
pub use history::{EventHistory, HISTORY_CAPACITY};
pub use model::{GenerationJob, GenerationProgressEvent, JobStatus, PreviewDigest};
pub use msg::Msg;
pub use state::{ProgressState, MISSING_PORTFOLIO};
pub use update::update;
pub use view_model::{LogLine, ProgressView};
