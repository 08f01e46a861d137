//! Task schema for team coordination

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status assigned to newly created tasks.
pub const DEFAULT_TASK_STATUS: &str = "open";

fn default_status() -> String {
    DEFAULT_TASK_STATUS.to_string()
}

/// Task item in `<teams_root>/<team>/tasks.json`
///
/// `status` is an open string; any value a caller sets is stored as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    /// Sequential identifier ("1", "2", ...)
    pub id: String,

    pub subject: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_status")]
    pub status: String,

    /// Assigned agent name (null if unassigned)
    #[serde(default)]
    pub owner: Option<String>,

    /// ISO 8601 timestamp when the task was created
    pub created_at: String,

    /// ISO 8601 timestamp of the last update
    pub updated_at: String,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl TaskItem {
    /// Numeric value of the id, for ordering; non-numeric ids sort first.
    pub fn numeric_id(&self) -> u64 {
        self.id.parse().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults() {
        let json = r#"{
            "id": "3",
            "subject": "Fix CI",
            "created_at": "2026-02-11T14:30:00Z",
            "updated_at": "2026-02-11T14:30:00Z"
        }"#;
        let task: TaskItem = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, "open");
        assert!(task.owner.is_none());
        assert_eq!(task.description, "");
        assert_eq!(task.numeric_id(), 3);
    }

    #[test]
    fn test_owner_serializes_as_null() {
        let task = TaskItem {
            id: "1".to_string(),
            subject: "s".to_string(),
            description: String::new(),
            status: "blocked-on-review".to_string(),
            owner: None,
            created_at: "t".to_string(),
            updated_at: "t".to_string(),
            unknown_fields: HashMap::new(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert!(json["owner"].is_null());
        assert_eq!(json["status"], "blocked-on-review");
    }
}
