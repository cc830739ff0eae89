//! Inbound events from the subscription stream.
//!
//! Each record is a JSON object with a `type` field. The payload sits under
//! the lower-cased type name, e.g.
//! `{"type":"SUBSCRIBED","subscribed":{"framework_id":{"value":"fw-1"}}}`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::define_id;
use crate::error::DecodeError;
use crate::types::{Agent, AgentId, FrameworkId, Offer, OfferId, TaskId, WireResource};

define_id!(ExecutorId);

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The master acknowledged the subscription.
    Subscribed(Subscribed),
    /// Periodic keepalive from the master.
    Heartbeat,
    /// A batch of resource offers.
    Offers(Vec<Offer>),
    /// An outstanding offer is no longer valid.
    Rescind(Rescind),
    /// A task status update.
    Update(Update),
    /// An agent or executor failed.
    Failure(Failure),
    /// The master reported a framework-level error.
    Error(ErrorEvent),
    /// Any kind without a typed representation.
    Unknown { kind: String, body: Value },
}

impl Event {
    /// Decode one record body.
    pub fn decode(record: &[u8]) -> Result<Self, DecodeError> {
        let body: Value = serde_json::from_slice(record)?;
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_ascii_lowercase();

        let event = match kind.as_str() {
            "subscribed" => Event::Subscribed(payload(&body, &kind)?),
            "heartbeat" => Event::Heartbeat,
            "offers" => {
                let offers: OffersPayload = payload(&body, &kind)?;
                Event::Offers(offers.offers.into_iter().map(WireOffer::into_offer).collect())
            }
            "rescind" => Event::Rescind(payload(&body, &kind)?),
            "update" => Event::Update(payload(&body, &kind)?),
            "failure" => Event::Failure(payload(&body, &kind)?),
            "error" => Event::Error(payload(&body, &kind)?),
            _ => Event::Unknown {
                kind: kind.clone(),
                body,
            },
        };

        Ok(event)
    }

    /// The lower-cased event kind.
    pub fn kind(&self) -> &str {
        match self {
            Event::Subscribed(_) => "subscribed",
            Event::Heartbeat => "heartbeat",
            Event::Offers(_) => "offers",
            Event::Rescind(_) => "rescind",
            Event::Update(_) => "update",
            Event::Failure(_) => "failure",
            Event::Error(_) => "error",
            Event::Unknown { kind, .. } => kind,
        }
    }
}

fn payload<T: DeserializeOwned>(body: &Value, kind: &str) -> Result<T, DecodeError> {
    let value = body
        .get(kind)
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subscribed {
    #[serde(default)]
    pub framework_id: Option<FrameworkId>,
    #[serde(default)]
    pub heartbeat_interval_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OffersPayload {
    offers: Vec<WireOffer>,
}

#[derive(Debug, Deserialize)]
struct WireOffer {
    id: OfferId,
    agent_id: AgentId,
    hostname: String,
    #[serde(default)]
    resources: Vec<WireResource>,
}

impl WireOffer {
    fn into_offer(self) -> Offer {
        Offer {
            id: self.id,
            agent: Agent {
                id: self.agent_id,
                hostname: self.hostname,
            },
            resources: self
                .resources
                .into_iter()
                .filter_map(WireResource::into_scalar)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rescind {
    pub offer_id: OfferId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Update {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl TaskStatus {
    /// Whether the task will never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state.as_str(),
            "TASK_FINISHED"
                | "TASK_FAILED"
                | "TASK_KILLED"
                | "TASK_LOST"
                | "TASK_ERROR"
                | "TASK_DROPPED"
                | "TASK_GONE"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Failure {
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    #[serde(default)]
    pub executor_id: Option<ExecutorId>,
    #[serde(default)]
    pub status: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}
