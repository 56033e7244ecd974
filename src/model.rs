//! Moderation records: messages with their embedded actions, plus reviewer approvals.
//!
//! These records are both the HTTP wire format and the storage format, so
//! field names are fixed. Decoding is strict: an unknown status string is an
//! error rather than a silent default.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a submitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Stored, scan not finished.
    Pending,
    /// Passed every check (terminal).
    Validated,
    /// Failed a check or an image was rejected by a reviewer (terminal).
    Rejected,
    /// At least one embedded image waits for a reviewer.
    #[serde(alias = "awaiting approval")]
    AwaitingApproval,
}

/// State of a single embedded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A moderation submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    /// `None` until the message has been checkpointed by the engine.
    #[serde(default)]
    pub status: Option<MessageStatus>,
    #[serde(default, alias = "reasons", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl Message {
    /// Create a fresh, not yet persisted message.
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            status: None,
            reason: None,
            actions: Vec::new(),
        }
    }

    /// True when the message carries actions and every one is approved.
    pub fn all_actions_approved(&self) -> bool {
        !self.actions.is_empty()
            && self
                .actions
                .iter()
                .all(|a| a.status == ActionStatus::Approved)
    }

    /// Find the action backing the given approval id.
    pub fn action_mut(&mut self, action_id: &str) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| a.id == action_id)
    }
}

/// One sub-decision on a detected image link, owned by its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub status: ActionStatus,
    pub reason: String,
}

impl Action {
    /// A new pending action for an image link, with a fresh id.
    pub fn image_review(url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: ActionStatus::Pending,
            reason: format!("image [{url}] requires approval"),
        }
    }
}

/// Reviewer-facing task mirroring a pending [`Action`]. Shares the action's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: String,
    pub message_id: String,
    pub status: ActionStatus,
    pub reason: String,
}

impl Approval {
    pub fn for_action(action: &Action, message_id: &str) -> Self {
        Self {
            id: action.id.clone(),
            message_id: message_id.to_string(),
            status: action.status,
            reason: action.reason.clone(),
        }
    }
}

/// Body of `POST /api/validate`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitMessage {
    pub id: String,
    pub body: String,
}

impl From<SubmitMessage> for Message {
    fn from(submit: SubmitMessage) -> Self {
        Message::new(submit.id, submit.body)
    }
}
