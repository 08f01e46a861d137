//! Tool definitions returned by `tools/list`.
//!
//! Every coordinator operation is one tool. Argument names here must match
//! the argument structs deserialized in [`crate::coordinator`].

use serde_json::{Value, json};

/// Names of every tool the server exposes, in `tools/list` order.
pub const TOOL_NAMES: [&str; 16] = [
    "team_create",
    "team_delete",
    "spawn_teammate",
    "force_kill_teammate",
    "send_message",
    "read_inbox",
    "poll_inbox",
    "task_create",
    "task_list",
    "task_get",
    "task_update",
    "check_agent_health",
    "check_all_agents_health",
    "process_shutdown_approved",
    "read_config",
    "server_status",
];

/// All tool definitions.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        team_create_schema(),
        team_delete_schema(),
        spawn_teammate_schema(),
        force_kill_teammate_schema(),
        send_message_schema(),
        read_inbox_schema(),
        poll_inbox_schema(),
        task_create_schema(),
        task_list_schema(),
        task_get_schema(),
        task_update_schema(),
        check_agent_health_schema(),
        check_all_agents_health_schema(),
        process_shutdown_approved_schema(),
        read_config_schema(),
        server_status_schema(),
    ]
}

fn team_prop() -> Value {
    json!({"type": "string", "description": "Team name"})
}

fn agent_prop() -> Value {
    json!({"type": "string", "description": "Agent name or name@team"})
}

/// Schema for tools that only need a team.
fn team_only(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {"team_name": team_prop()},
            "required": ["team_name"]
        }
    })
}

/// Schema for tools addressing one agent in a team.
fn team_and_agent(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "agent_name": agent_prop()
            },
            "required": ["team_name", "agent_name"]
        }
    })
}

fn team_create_schema() -> Value {
    json!({
        "name": "team_create",
        "description": "Create a new team with an empty roster. The caller becomes its lead.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "description": {"type": "string", "description": "Optional team description"}
            },
            "required": ["team_name"]
        }
    })
}

fn team_delete_schema() -> Value {
    team_only(
        "team_delete",
        "Delete a team and all of its state. Fails while members remain.",
    )
}

fn spawn_teammate_schema() -> Value {
    json!({
        "name": "spawn_teammate",
        "description": "Spawn a worker agent: register it, deliver its prompt, write its config and launch it",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "name": {"type": "string", "description": "Worker name (letters, digits, '-' and '_', at most 64 chars)"},
                "prompt": {"type": "string", "description": "Initial prompt delivered to the worker's inbox"},
                "model": {"type": "string", "description": "Model identifier, or \"auto\" for the configured default"},
                "subagent_type": {"type": "string", "description": "Role label (default: general-purpose)"},
                "backend": {
                    "type": "string",
                    "enum": ["tmux", "desktop", "windows_terminal"],
                    "description": "Where the worker runs (default: tmux)"
                },
                "cwd": {"type": "string", "description": "Working directory (default: project directory)"},
                "plan_mode_required": {"type": "boolean", "description": "Worker must submit a plan before acting"},
                "role_instructions": {"type": "string", "description": "Role-specific instruction text"},
                "custom_instructions": {"type": "string", "description": "Extra instructions appended to the config document"},
                "desktop_binary": {"type": "string", "description": "Desktop app path for the desktop backend (default: discovered)"}
            },
            "required": ["team_name", "name", "prompt"]
        }
    })
}

fn force_kill_teammate_schema() -> Value {
    team_and_agent(
        "force_kill_teammate",
        "Stop a worker's process and remove its roster entry, config document and health record",
    )
}

fn send_message_schema() -> Value {
    json!({
        "name": "send_message",
        "description": "Send a message. Plain and broadcast messages are recorded as sent by the team lead.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "type": {
                    "type": "string",
                    "enum": ["message", "broadcast", "shutdown_request", "shutdown_response", "plan_approval_response"],
                    "description": "Message type (default: message)"
                },
                "recipient": {"type": "string", "description": "Recipient name; not used for broadcast or shutdown_response"},
                "content": {"type": "string", "description": "Message body"},
                "summary": {"type": "string", "description": "Short summary (default: first 60 characters of content)"},
                "sender": {"type": "string", "description": "Sending agent; excluded from broadcasts and required for responses"},
                "request_id": {"type": "string", "description": "Request being answered by a response"},
                "approve": {"type": "boolean", "description": "Verdict carried by a response"},
                "reason": {"type": "string", "description": "Reason attached to shutdown messages"}
            },
            "required": ["team_name"]
        }
    })
}

fn read_inbox_schema() -> Value {
    team_and_agent("read_inbox", "Return an agent's full mailbox, oldest first")
}

fn poll_inbox_schema() -> Value {
    json!({
        "name": "poll_inbox",
        "description": "Wait for new messages in an agent's mailbox, returning as soon as any arrive",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "agent_name": agent_prop(),
                "timeout_ms": {"type": "integer", "description": "Maximum wait in milliseconds (default: 30000, max: 120000)"},
                "since": {"type": "integer", "description": "Number of messages already seen (default: current mailbox length)"}
            },
            "required": ["team_name", "agent_name"]
        }
    })
}

fn task_create_schema() -> Value {
    json!({
        "name": "task_create",
        "description": "Create an open, unowned task",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "subject": {"type": "string", "description": "One-line task title"},
                "description": {"type": "string", "description": "Task details"}
            },
            "required": ["team_name", "subject"]
        }
    })
}

fn task_list_schema() -> Value {
    team_only("task_list", "List all tasks in id order")
}

fn task_get_schema() -> Value {
    json!({
        "name": "task_get",
        "description": "Fetch one task by id",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "task_id": {"type": "string", "description": "Task id"}
            },
            "required": ["team_name", "task_id"]
        }
    })
}

fn task_update_schema() -> Value {
    json!({
        "name": "task_update",
        "description": "Update a task. Assigning a new owner notifies that owner.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "team_name": team_prop(),
                "task_id": {"type": "string", "description": "Task id"},
                "status": {"type": "string", "description": "New status (free-form)"},
                "owner": {"type": "string", "description": "New owner agent name"},
                "subject": {"type": "string", "description": "New title"},
                "description": {"type": "string", "description": "New details"}
            },
            "required": ["team_name", "task_id"]
        }
    })
}

fn check_agent_health_schema() -> Value {
    team_and_agent(
        "check_agent_health",
        "Classify one worker as alive, dead, hung or unknown",
    )
}

fn check_all_agents_health_schema() -> Value {
    team_only(
        "check_all_agents_health",
        "Classify every worker in the team",
    )
}

fn process_shutdown_approved_schema() -> Value {
    team_and_agent(
        "process_shutdown_approved",
        "Acknowledge an approved shutdown: remove the worker's roster entry, config document and health record",
    )
}

fn read_config_schema() -> Value {
    team_only("read_config", "Return the team roster document")
}

fn server_status_schema() -> Value {
    json!({
        "name": "server_status",
        "description": "Report server version, teams root, project directory and agent binary",
        "inputSchema": {"type": "object", "properties": {}}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_match_names() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, TOOL_NAMES);
    }

    #[test]
    fn test_every_tool_is_well_formed() {
        for tool in tool_definitions() {
            let name = tool["name"].as_str().unwrap();
            assert!(
                tool["description"].as_str().is_some_and(|d| !d.is_empty()),
                "{name} has no description"
            );
            assert_eq!(tool["inputSchema"]["type"], "object", "{name}");
            if let Some(required) = tool["inputSchema"]["required"].as_array() {
                let props = tool["inputSchema"]["properties"].as_object().unwrap();
                for field in required {
                    assert!(
                        props.contains_key(field.as_str().unwrap()),
                        "{name} requires undeclared {field}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_send_message_types() {
        let schema = send_message_schema();
        let types = schema["inputSchema"]["properties"]["type"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(types.len(), 5);
        assert!(types.contains(&json!("shutdown_response")));
    }
}
