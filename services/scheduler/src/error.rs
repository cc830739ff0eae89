//! Error types for the scheduler driver.

use std::time::Duration;

use mesos_solr_protocol::{CallKind, DecodeError};
use reqwest::StatusCode;
use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur while driving the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A candidate master rejected the subscription or failed to stream.
    #[error("master {host} unavailable: {reason}")]
    ConnectionFailure { host: String, reason: String },

    /// Every candidate master failed.
    #[error("no leading master available after trying {attempted} candidates")]
    NoLeaderAvailable { attempted: usize },

    /// A record on the stream could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The master answered a call with a non-2xx status.
    #[error("{call} rejected with status {status}")]
    RequestRejected { call: CallKind, status: StatusCode },

    /// A decision was already sent for this offer.
    #[error("offer {0} already has a decision")]
    DuplicateDecision(String),

    /// A SUBSCRIBED event arrived without a framework id.
    #[error("subscription acknowledged without a framework id")]
    MissingFrameworkId,

    /// A call needed a leader but none has been selected.
    #[error("not subscribed to any master")]
    NotSubscribed,

    /// The master closed the subscription stream.
    #[error("subscription stream ended")]
    StreamEnded,

    /// Nothing arrived on the stream within the heartbeat window.
    #[error("no heartbeat received for {0:?}")]
    HeartbeatTimeout(Duration),

    /// Transport error outside of leader selection.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SchedulerError {
    pub(crate) fn connection_failure(host: &str, reason: impl std::fmt::Display) -> Self {
        Self::ConnectionFailure {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }
}
