//! Error types for stream decoding.

use thiserror::Error;

/// Errors that can occur while decoding the event stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The record length header is not a decimal number.
    #[error("invalid record length header: {0:?}")]
    InvalidLength(String),

    /// The record declares a size above the decoder limit.
    #[error("record of {size} bytes exceeds limit of {limit} bytes")]
    RecordTooLarge { size: usize, limit: usize },

    /// The record body is not valid JSON.
    #[error("malformed event body: {0}")]
    Json(#[from] serde_json::Error),

    /// The record body has no string `type` field.
    #[error("event is missing its `type` field")]
    MissingType,

    /// The payload for a known event kind does not have the expected shape.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
