use crate::GenerationProgressEvent;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,
    #[error("malformed progress event: {message}")]
    Malformed { message: String },
}

/// Decode one live-stream text frame into a progress event.
///
/// The frame must be a JSON object carrying at least `status` and `progress`;
/// everything else falls back to defaults.
pub fn decode_event(text: &str) -> Result<GenerationProgressEvent, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }
    serde_json::from_str(trimmed).map_err(|err| DecodeError::Malformed {
        message: err.to_string(),
    })
}
