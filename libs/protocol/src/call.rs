//! Outbound calls to the scheduler endpoint.
//!
//! A [`Call`] mirrors the Mesos v1 `Call` message: a `type` tag, an optional
//! `framework_id`, and exactly one populated payload field.

use serde::Serialize;

use crate::types::{FrameworkId, FrameworkIdentity, FrameworkInfo, OfferId, TaskInfo, TaskLaunch};

/// Call kinds sent by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallKind {
    Subscribe,
    Accept,
    Decline,
    Teardown,
    Reconcile,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Subscribe => write!(f, "SUBSCRIBE"),
            CallKind::Accept => write!(f, "ACCEPT"),
            CallKind::Decline => write!(f, "DECLINE"),
            CallKind::Teardown => write!(f, "TEARDOWN"),
            CallKind::Reconcile => write!(f, "RECONCILE"),
        }
    }
}

/// A single scheduler call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Call {
    #[serde(rename = "type")]
    pub kind: CallKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<FrameworkId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<Subscribe>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<Accept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<Operation>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline: Option<Decline>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<Reconcile>,
}

impl Call {
    fn empty(kind: CallKind) -> Self {
        Self {
            kind,
            framework_id: None,
            subscribe: None,
            accept: None,
            operations: None,
            decline: None,
            reconcile: None,
        }
    }

    /// SUBSCRIBE with the framework's identity.
    pub fn subscribe(framework: &FrameworkIdentity, force: bool) -> Self {
        Self {
            subscribe: Some(Subscribe {
                framework_info: framework.framework_info(),
                force,
            }),
            ..Self::empty(CallKind::Subscribe)
        }
        .with_framework_id(framework.id.clone())
    }

    /// ACCEPT one offer with a single LAUNCH operation.
    pub fn accept(offer_id: OfferId, launch: &TaskLaunch) -> Self {
        Self {
            accept: Some(Accept {
                offer_ids: vec![offer_id],
            }),
            operations: Some(vec![Operation::launch(launch)]),
            ..Self::empty(CallKind::Accept)
        }
    }

    /// DECLINE one or more offers in a single call.
    pub fn decline(offer_ids: Vec<OfferId>) -> Self {
        Self {
            decline: Some(Decline { offer_ids }),
            ..Self::empty(CallKind::Decline)
        }
    }

    pub fn teardown() -> Self {
        Self::empty(CallKind::Teardown)
    }

    /// RECONCILE with an empty task list.
    pub fn reconcile() -> Self {
        Self {
            reconcile: Some(Reconcile { tasks: Vec::new() }),
            ..Self::empty(CallKind::Reconcile)
        }
    }

    /// Stamp the call with the framework id, when one is known.
    pub fn with_framework_id(mut self, framework_id: Option<FrameworkId>) -> Self {
        self.framework_id = framework_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscribe {
    pub framework_info: FrameworkInfo,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accept {
    pub offer_ids: Vec<OfferId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decline {
    pub offer_ids: Vec<OfferId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconcile {
    pub tasks: Vec<ReconcileTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileTask {
    pub task_id: crate::types::TaskId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Launch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub launch: Launch,
}

impl Operation {
    pub fn launch(task: &TaskLaunch) -> Self {
        Self {
            kind: OperationKind::Launch,
            launch: Launch {
                task_infos: vec![task.task_info()],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Launch {
    pub task_infos: Vec<TaskInfo>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{AgentId, ResourceEntry, TaskId};

    #[test]
    fn test_subscribe_shape() {
        let framework = FrameworkIdentity::new("mesos-solr", "mesos-default", true);
        let json = serde_json::to_value(Call::subscribe(&framework, false)).unwrap();

        assert_eq!(
            json,
            json!({
                "type": "SUBSCRIBE",
                "subscribe": {
                    "framework_info": {
                        "name": "mesos-solr",
                        "user": "mesos-default",
                        "checkpoint": true
                    },
                    "force": false
                }
            })
        );
    }

    #[test]
    fn test_resubscribe_carries_framework_id() {
        let mut framework = FrameworkIdentity::new("mesos-solr", "mesos-default", true);
        framework.id = Some(FrameworkId::new("fw-123"));

        let json = serde_json::to_value(Call::subscribe(&framework, true)).unwrap();
        assert_eq!(json["framework_id"]["value"], "fw-123");
        assert_eq!(json["subscribe"]["framework_info"]["id"]["value"], "fw-123");
        assert_eq!(json["subscribe"]["force"], true);
    }

    #[test]
    fn test_accept_shape() {
        let launch = TaskLaunch {
            task_id: TaskId::new("solrcloud-abcd1234"),
            agent_id: AgentId::new("agent-1"),
            name: "solrcloud".to_string(),
            resources: vec![ResourceEntry::scalar("cpus", 1.0)],
            command: "echo foo && sleep 300".to_string(),
            user: "mesos-default".to_string(),
        };

        let call = Call::accept(OfferId::new("offer-1"), &launch)
            .with_framework_id(Some(FrameworkId::new("fw-123")));
        let json = serde_json::to_value(call).unwrap();

        assert_eq!(json["type"], "ACCEPT");
        assert_eq!(json["framework_id"], json!({"value": "fw-123"}));
        assert_eq!(json["accept"], json!({"offer_ids": [{"value": "offer-1"}]}));
        assert_eq!(json["operations"][0]["type"], "LAUNCH");
        assert_eq!(
            json["operations"][0]["launch"]["task_infos"][0]["task_id"]["value"],
            "solrcloud-abcd1234"
        );
    }

    #[test]
    fn test_decline_batches_offer_ids() {
        let call = Call::decline(vec![OfferId::new("o1"), OfferId::new("o2")]);
        let json = serde_json::to_value(call).unwrap();
        assert_eq!(
            json,
            json!({"type": "DECLINE", "decline": {"offer_ids": [{"value": "o1"}, {"value": "o2"}]}})
        );
    }

    #[test]
    fn test_teardown_and_reconcile_shapes() {
        let id = Some(FrameworkId::new("fw-123"));

        let teardown = serde_json::to_value(Call::teardown().with_framework_id(id.clone())).unwrap();
        assert_eq!(teardown, json!({"type": "TEARDOWN", "framework_id": {"value": "fw-123"}}));

        let reconcile = serde_json::to_value(Call::reconcile().with_framework_id(id)).unwrap();
        assert_eq!(reconcile["reconcile"], json!({"tasks": []}));
    }
}
