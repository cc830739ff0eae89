//! Core protocol types shared by calls and events.

use serde::{Deserialize, Serialize};

use crate::define_id;

define_id!(FrameworkId);
define_id!(OfferId);
define_id!(AgentId);
define_id!(TaskId);

/// The framework's registered identity.
///
/// `id` stays `None` until the master acknowledges the subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkIdentity {
    pub id: Option<FrameworkId>,
    pub name: String,
    pub user: String,
    pub checkpoint: bool,
}

impl FrameworkIdentity {
    /// Create an identity that has not been assigned an id yet.
    pub fn new(name: impl Into<String>, user: impl Into<String>, checkpoint: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            user: user.into(),
            checkpoint,
        }
    }

    /// The `framework_info` block sent with SUBSCRIBE.
    pub fn framework_info(&self) -> FrameworkInfo {
        FrameworkInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            user: self.user.clone(),
            checkpoint: self.checkpoint,
        }
    }
}

/// Wire form of the framework identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<FrameworkId>,
    pub name: String,
    pub user: String,
    pub checkpoint: bool,
}

/// A compute node offering resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub hostname: String,
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.hostname, self.id)
    }
}

/// A time-bounded grant of capacity from one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: OfferId,
    pub agent: Agent,
    pub resources: Vec<ResourceEntry>,
}

impl std::fmt::Display for Offer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.agent)
    }
}

/// Resource value kinds understood by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Scalar,
}

/// A single named scalar quantity.
///
/// Serialized in the Mesos shape
/// `{"name": "cpus", "type": "SCALAR", "scalar": {"value": 1.0}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "WireResource")]
pub struct ResourceEntry {
    pub name: String,
    pub kind: ResourceKind,
    pub value: f64,
}

impl ResourceEntry {
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Scalar,
            value,
        }
    }
}

/// Scalar payload of a wire resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub value: f64,
}

/// A resource exactly as it appears on the wire.
///
/// Offers carry non-scalar resources too (port ranges, sets); those keep
/// their raw `type` and have no `scalar` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,
}

impl From<ResourceEntry> for WireResource {
    fn from(entry: ResourceEntry) -> Self {
        Self {
            name: entry.name,
            kind: "SCALAR".to_string(),
            scalar: Some(Scalar { value: entry.value }),
        }
    }
}

impl WireResource {
    /// Convert to a scalar entry, or `None` for any other resource type.
    pub fn into_scalar(self) -> Option<ResourceEntry> {
        if !self.kind.eq_ignore_ascii_case("SCALAR") {
            return None;
        }
        let scalar = self.scalar?;
        Some(ResourceEntry::scalar(self.name, scalar.value))
    }
}

/// A task to launch on an accepted offer.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLaunch {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub name: String,
    pub resources: Vec<ResourceEntry>,
    pub command: String,
    pub user: String,
}

impl TaskLaunch {
    /// The `TaskInfo` block embedded in a LAUNCH operation.
    pub fn task_info(&self) -> TaskInfo {
        TaskInfo {
            name: self.name.clone(),
            task_id: self.task_id.clone(),
            agent_id: self.agent_id.clone(),
            resources: self.resources.clone(),
            command: CommandInfo {
                value: self.command.clone(),
                user: self.user.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub name: String,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub resources: Vec<ResourceEntry>,
    pub command: CommandInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandInfo {
    pub value: String,
    pub user: String,
}
