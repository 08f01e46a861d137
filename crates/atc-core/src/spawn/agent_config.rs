//! Per-agent config documents and the project tool-registration file
//!
//! Each spawned member gets `<project>/.opencode/agents/<name>.md`: YAML front
//! matter (model, mode, permissions, enabled tools) followed by a Markdown
//! system prompt. The project-level `opencode.json` is merged, never
//! clobbered, so the agent CLI can reach the coordinator's MCP server.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::io::{read_json, write_json_atomic, StoreError};

/// `$schema` written into a freshly created `opencode.json`
pub const OPENCODE_JSON_SCHEMA: &str = "https://opencode-files.s3.amazonaws.com/schemas/opencode.json";

const BUILTIN_TOOLS: [&str; 11] = [
    "read", "write", "edit", "bash", "glob", "grep", "list", "webfetch", "websearch", "todoread",
    "todowrite",
];

#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("Failed to render agent front matter: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inputs for rendering one agent's config document.
#[derive(Debug, Clone, Default)]
pub struct AgentConfigInput<'a> {
    pub agent_id: &'a str,
    pub name: &'a str,
    pub team: &'a str,
    pub color: &'a str,
    pub model: &'a str,
    /// Role text injected after the tool list
    pub role_instructions: Option<&'a str>,
    /// Per-spawn text under "# Additional Instructions"
    pub custom_instructions: Option<&'a str>,
    /// MCP server name; tools appear to the agent as `<prefix>_<tool>`
    pub tool_prefix: &'a str,
}

/// Produces the text of a per-agent config document.
pub trait AgentConfigRenderer: Send + Sync {
    fn render(&self, input: &AgentConfigInput<'_>) -> Result<String, AgentConfigError>;
}

/// Markdown body with YAML front matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownConfigRenderer;

#[derive(Serialize)]
struct FrontMatter<'a> {
    description: String,
    model: &'a str,
    mode: &'static str,
    permission: &'static str,
    tools: Map<String, Value>,
}

impl AgentConfigRenderer for MarkdownConfigRenderer {
    fn render(&self, input: &AgentConfigInput<'_>) -> Result<String, AgentConfigError> {
        let mut tools = Map::new();
        for tool in BUILTIN_TOOLS {
            tools.insert(tool.to_string(), Value::Bool(true));
        }
        tools.insert(format!("{}_*", input.tool_prefix), Value::Bool(true));

        let front = serde_yaml::to_string(&FrontMatter {
            description: format!("Team agent {} on team {}", input.name, input.team),
            model: input.model,
            mode: "primary",
            // The agent CLI expects the string "allow" here, not a boolean.
            permission: "allow",
            tools,
        })?;

        let mut sections = vec![
            identity_section(input),
            tools_section(input.tool_prefix),
        ];
        if let Some(role) = input.role_instructions.map(str::trim).filter(|s| !s.is_empty()) {
            sections.push(role.to_string());
        }
        if let Some(custom) = input
            .custom_instructions
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sections.push(format!("# Additional Instructions\n\n{custom}"));
        }
        sections.push(workflow_section(input));
        sections.push(rules_section(input.tool_prefix));
        sections.push(
            "# Shutdown Protocol\n\nWhen you receive a `shutdown_request` message, acknowledge it \
             and prepare to exit gracefully."
                .to_string(),
        );

        Ok(format!("---\n{front}---\n\n{}\n", sections.join("\n\n")))
    }
}

fn identity_section(input: &AgentConfigInput<'_>) -> String {
    format!(
        "# Agent Identity\n\n\
         You are **{name}**, a member of team **{team}**.\n\n\
         - Agent ID: `{id}`\n\
         - Color: {color}",
        name = input.name,
        team = input.team,
        id = input.agent_id,
        color = input.color,
    )
}

fn tools_section(p: &str) -> String {
    format!(
        "# Available MCP Tools\n\n\
         You MUST use these `{p}_*` MCP tools for all team coordination.\n\
         Do NOT invent custom workflows, scripts, or coordination frameworks.\n\n\
         **Team Coordination:**\n\
         - `{p}_read_config`: read team configuration\n\
         - `{p}_server_status`: check MCP server status\n\n\
         **Messaging:**\n\
         - `{p}_read_inbox`: check your inbox for messages\n\
         - `{p}_send_message`: send a message to a teammate or team-lead\n\
         - `{p}_poll_inbox`: long-poll for new messages\n\n\
         **Task Management:**\n\
         - `{p}_task_list`: list all tasks for the team\n\
         - `{p}_task_get`: get details of a specific task\n\
         - `{p}_task_create`: create a new task\n\
         - `{p}_task_update`: update task status or claim a task\n\n\
         **Lifecycle:**\n\
         - `{p}_check_agent_health`: check health of a single agent\n\
         - `{p}_check_all_agents_health`: check health of all agents\n\
         - `{p}_process_shutdown_approved`: acknowledge shutdown"
    )
}

fn workflow_section(input: &AgentConfigInput<'_>) -> String {
    let (p, team, name) = (input.tool_prefix, input.team, input.name);
    format!(
        "# Workflow\n\n\
         Follow this loop while working:\n\n\
         1. **Check inbox**: call `{p}_read_inbox(team_name=\"{team}\", agent_name=\"{name}\")` \
         every 3-5 tool calls. Always check before starting new work.\n\
         2. **Check tasks**: call `{p}_task_list(team_name=\"{team}\")` to find available tasks. \
         Claim one with `{p}_task_update(team_name=\"{team}\", task_id=\"<id>\", \
         status=\"in_progress\", owner=\"{name}\")`.\n\
         3. **Do the work**: use your tools to complete the task.\n\
         4. **Report progress**: send updates to team-lead via `{p}_send_message(team_name=\"{team}\", \
         type=\"message\", recipient=\"team-lead\", content=\"<update>\", summary=\"<short>\", \
         sender=\"{name}\")`.\n\
         5. **Mark done**: call `{p}_task_update(team_name=\"{team}\", task_id=\"<id>\", \
         status=\"completed\", owner=\"{name}\")` when finished."
    )
}

fn rules_section(p: &str) -> String {
    format!(
        "# Important Rules\n\n\
         - Use `{p}_*` MCP tools for ALL team communication and task management\n\
         - Do NOT create your own coordination systems, parallel agent frameworks, or orchestration patterns\n\
         - Do NOT use slash commands or skills from other projects for team coordination\n\
         - Focus on your assigned task and report to team-lead when done or blocked\n\
         - When uncertain, ask team-lead via `{p}_send_message` rather than improvising"
    )
}

/// `<project>/.opencode/agents/<name>.md`
pub fn agent_config_path(project_dir: &Path, name: &str) -> PathBuf {
    project_dir
        .join(".opencode")
        .join("agents")
        .join(format!("{name}.md"))
}

/// Write (or overwrite, on re-spawn) an agent's config document.
pub fn write_agent_config(
    project_dir: &Path,
    name: &str,
    content: &str,
) -> Result<PathBuf, AgentConfigError> {
    let path = agent_config_path(project_dir, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AgentConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(&path, content).map_err(|e| AgentConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    debug!("Wrote agent config {}", path.display());
    Ok(path)
}

/// Remove an agent's config document. A missing file is not an error.
pub fn cleanup_agent_config(project_dir: &Path, name: &str) -> Result<(), AgentConfigError> {
    let path = agent_config_path(project_dir, name);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!("Removed agent config {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AgentConfigError::Io { path, source: e }),
    }
}

/// MCP server entry registered in `opencode.json`.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistration {
    pub server_name: String,
    /// Whitespace-separated launch command, e.g. `"atc-mcp serve"`
    pub command: String,
    pub env: BTreeMap<String, String>,
}

/// Create or merge `<project>/opencode.json` so `mcp.<server_name>` points at the coordinator.
///
/// Existing keys are preserved; a new file gets a `$schema` key.
pub fn ensure_registration_file(
    project_dir: &Path,
    registration: &ServerRegistration,
) -> Result<PathBuf, AgentConfigError> {
    let path = project_dir.join("opencode.json");
    let mut content = match read_json::<Value>(&path)? {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(AgentConfigError::NotAnObject { path }),
        None => {
            let mut map = Map::new();
            map.insert("$schema".to_string(), json!(OPENCODE_JSON_SCHEMA));
            map
        }
    };

    let mut entry = Map::new();
    entry.insert("type".to_string(), json!("local"));
    entry.insert(
        "command".to_string(),
        json!(registration.command.split_whitespace().collect::<Vec<_>>()),
    );
    entry.insert("enabled".to_string(), json!(true));
    if !registration.env.is_empty() {
        entry.insert("environment".to_string(), json!(registration.env));
    }

    let mcp = content
        .entry("mcp".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !mcp.is_object() {
        *mcp = Value::Object(Map::new());
    }
    if let Value::Object(servers) = mcp {
        servers.insert(registration.server_name.clone(), Value::Object(entry));
    }

    write_json_atomic(&path, &Value::Object(content))?;
    Ok(path)
}
