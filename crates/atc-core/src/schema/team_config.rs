//! Team roster schema

use super::TeamMember;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Team configuration
///
/// Stored at `<teams_root>/<team>/config.json`. The lead is identified by
/// `lead_agent_id` and is never listed in `members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    /// Team name (matches directory name)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unix timestamp in milliseconds when team was created
    pub created_at: u64,

    /// Lead agent ID (format: "team-lead@{team_name}")
    pub lead_agent_id: String,

    /// UUID of the session that created the team
    pub lead_session_id: String,

    /// Worker roster in join order
    #[serde(default)]
    pub members: Vec<TeamMember>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl TeamConfig {
    pub fn new(name: &str, description: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            description,
            created_at: chrono::Utc::now().timestamp_millis().max(0) as u64,
            lead_agent_id: crate::lead_identity(name),
            lead_session_id: uuid::Uuid::new_v4().to_string(),
            members: Vec::new(),
            unknown_fields: HashMap::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut TeamMember> {
        self.members.iter_mut().find(|m| m.name == name)
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }
}
