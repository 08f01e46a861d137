//! Mailbox message schema

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Plain,
    Broadcast,
    TaskAssignment,
    ShutdownRequest,
    ShutdownResponse,
    PlanApprovalResponse,
}

impl MessageKind {
    /// Direct types that keep the caller-supplied sender instead of the lead identity.
    pub fn honors_sender(self) -> bool {
        matches!(
            self,
            MessageKind::ShutdownResponse | MessageKind::PlanApprovalResponse
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Plain => "plain",
            MessageKind::Broadcast => "broadcast",
            MessageKind::TaskAssignment => "task_assignment",
            MessageKind::ShutdownRequest => "shutdown_request",
            MessageKind::ShutdownResponse => "shutdown_response",
            MessageKind::PlanApprovalResponse => "plan_approval_response",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    /// Accepts the stored tags plus `"message"` as an alias for plain.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" | "message" => Ok(MessageKind::Plain),
            "broadcast" => Ok(MessageKind::Broadcast),
            "task_assignment" => Ok(MessageKind::TaskAssignment),
            "shutdown_request" => Ok(MessageKind::ShutdownRequest),
            "shutdown_response" => Ok(MessageKind::ShutdownResponse),
            "plan_approval_response" => Ok(MessageKind::PlanApprovalResponse),
            other => Err(format!(
                "Unknown message type '{other}'. Valid values: message, broadcast, \
                 shutdown_request, shutdown_response, plan_approval_response"
            )),
        }
    }
}

/// Message in an agent's mailbox
///
/// Mailboxes live at `<teams_root>/<team>/inboxes/<agent>.json` as a JSON
/// array, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Sender identity (`name@team`)
    pub from: String,

    /// Message body
    pub text: String,

    /// ISO 8601 UTC timestamp
    pub timestamp: String,

    #[serde(rename = "type", default)]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl InboxMessage {
    pub fn new(kind: MessageKind, from: &str, text: &str, summary: Option<String>) -> Self {
        Self {
            from: from.to_string(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            kind,
            summary,
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            unknown_fields: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_tags() {
        assert_eq!(
            serde_json::to_string(&MessageKind::TaskAssignment).unwrap(),
            "\"task_assignment\""
        );
        assert_eq!(MessageKind::from_str("message").unwrap(), MessageKind::Plain);
        assert!(MessageKind::from_str("carrier-pigeon").is_err());
    }

    #[test]
    fn test_honors_sender() {
        assert!(MessageKind::ShutdownResponse.honors_sender());
        assert!(MessageKind::PlanApprovalResponse.honors_sender());
        assert!(!MessageKind::Plain.honors_sender());
        assert!(!MessageKind::Broadcast.honors_sender());
    }

    #[test]
    fn test_minimal_message_defaults() {
        let json = r#"{
            "from": "team-lead@t1",
            "text": "hello",
            "timestamp": "2026-02-11T14:30:00.000Z"
        }"#;
        let msg: InboxMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageKind::Plain);
        assert!(msg.summary.is_none());
    }

    #[test]
    fn test_foreign_keys_survive_rewrite() {
        let json = r#"{
            "from": "alice@t1",
            "text": "done",
            "timestamp": "2026-02-11T14:30:00.000Z",
            "read": true,
            "color": "blue"
        }"#;
        let msg: InboxMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.unknown_fields["read"], true);
        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["read"], true);
        assert_eq!(back["color"], "blue");
    }

    #[test]
    fn test_new_message_has_id_and_timestamp() {
        let msg = InboxMessage::new(MessageKind::Broadcast, "team-lead@t1", "hi", None);
        assert!(msg.message_id.is_some());
        assert!(msg.timestamp.ends_with('Z'));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "broadcast");
    }
}
