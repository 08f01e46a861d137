//! Tool dispatch onto the core library.
//!
//! The coordinator holds no team state. Each call reads or mutates the team
//! directory through [`TeamStore`]; the only in-memory state is the spawner's
//! cached agent binary. Blocking store work (lock waits, long-polls) runs on
//! the blocking pool.

use agent_team_coord_core::config::Config;
use agent_team_coord_core::health::{self, HealthThresholds};
use agent_team_coord_core::io::StoreError;
use agent_team_coord_core::messaging::{self, MessageError, Outgoing, short_name};
use agent_team_coord_core::schema::{BackendKind, MessageKind};
use agent_team_coord_core::spawn::{
    MarkdownConfigRenderer, PassthroughModelResolver, SpawnError, SpawnRequest, Spawner,
    SystemRunner,
};
use agent_team_coord_core::tasks::{self, TaskPatch};
use agent_team_coord_core::{LEAD_NAME, TeamStore, lead_identity};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default `poll_inbox` wait
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 30_000;

/// Longest `poll_inbox` wait a caller may request
pub const MAX_POLL_TIMEOUT_MS: u64 = 120_000;

/// Failure of a single tool call, reported to the client as an `isError` result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Failed to encode result: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct TeamArgs {
    team_name: String,
}

#[derive(Debug, Deserialize)]
struct AgentArgs {
    team_name: String,
    agent_name: String,
}

#[derive(Debug, Deserialize)]
struct TeamCreateArgs {
    team_name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpawnArgs {
    team_name: String,
    name: String,
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    subagent_type: Option<String>,
    #[serde(default)]
    backend: Option<BackendKind>,
    #[serde(default)]
    cwd: Option<PathBuf>,
    #[serde(default)]
    plan_mode_required: bool,
    #[serde(default)]
    role_instructions: Option<String>,
    #[serde(default)]
    custom_instructions: Option<String>,
    #[serde(default)]
    desktop_binary: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SendArgs {
    team_name: String,
    #[serde(rename = "type", default = "default_message_type")]
    kind: String,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    approve: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
}

fn default_message_type() -> String {
    "message".to_string()
}

#[derive(Debug, Deserialize)]
struct PollArgs {
    team_name: String,
    agent_name: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    since: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TaskCreateArgs {
    team_name: String,
    subject: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TaskGetArgs {
    team_name: String,
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskUpdateArgs {
    team_name: String,
    task_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Serves tool calls for every team under one teams root.
pub struct Coordinator {
    spawner: Arc<Spawner>,
    thresholds: HealthThresholds,
}

impl Coordinator {
    pub fn new(spawner: Spawner, thresholds: HealthThresholds) -> Self {
        Self {
            spawner: Arc::new(spawner),
            thresholds,
        }
    }

    /// Build a coordinator that drives real processes from resolved configuration.
    pub fn from_config(config: &Config, home_dir: &Path, current_dir: &Path) -> Self {
        let store = TeamStore::new(config.teams_root(home_dir)).with_lock_timeout(config.lock_timeout());
        let spawner = Spawner::new(
            store,
            Arc::new(SystemRunner),
            Arc::new(MarkdownConfigRenderer),
            Arc::new(PassthroughModelResolver::new(config.spawn.default_model.clone())),
            config.spawn_settings(current_dir),
        );
        Self::new(spawner, config.health_thresholds())
    }

    pub fn store(&self) -> &TeamStore {
        self.spawner.store()
    }

    /// Run tool `name` with JSON `arguments` and return its JSON result.
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        debug!("tools/call {name}");
        match name {
            "team_create" => self.team_create(parse(name, arguments)?).await,
            "team_delete" => self.team_delete(parse(name, arguments)?).await,
            "spawn_teammate" => self.spawn_teammate(parse(name, arguments)?).await,
            "force_kill_teammate" => self.force_kill_teammate(parse(name, arguments)?).await,
            "send_message" => self.send_message(parse(name, arguments)?).await,
            "read_inbox" => self.read_inbox(parse(name, arguments)?).await,
            "poll_inbox" => self.poll_inbox(parse(name, arguments)?).await,
            "task_create" => self.task_create(parse(name, arguments)?).await,
            "task_list" => self.task_list(parse(name, arguments)?).await,
            "task_get" => self.task_get(parse(name, arguments)?).await,
            "task_update" => self.task_update(parse(name, arguments)?).await,
            "check_agent_health" => self.check_agent_health(parse(name, arguments)?).await,
            "check_all_agents_health" => self.check_all_agents_health(parse(name, arguments)?).await,
            "process_shutdown_approved" => {
                self.process_shutdown_approved(parse(name, arguments)?).await
            }
            "read_config" => self.read_config(parse(name, arguments)?).await,
            "server_status" => Ok(self.server_status()),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Run `f` against the store on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ToolError>
    where
        F: FnOnce(TeamStore) -> Result<T, ToolError> + Send + 'static,
        T: Send + 'static,
    {
        self.store().run_blocking(f).await
    }

    async fn team_create(&self, args: TeamCreateArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| {
            let config = store.create_team(&args.team_name, args.description)?;
            Ok(json!({
                "team_name": config.name,
                "team_file": store.config_path(&args.team_name),
                "lead_agent_id": config.lead_agent_id,
            }))
        })
        .await
    }

    async fn team_delete(&self, args: TeamArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| {
            store.delete_team(&args.team_name)?;
            Ok(json!({
                "success": true,
                "team_name": args.team_name,
                "message": format!("Team '{}' deleted", args.team_name),
            }))
        })
        .await
    }

    async fn spawn_teammate(&self, args: SpawnArgs) -> Result<Value, ToolError> {
        let backend = args.backend.unwrap_or_default();
        let desktop_binary = match (backend, args.desktop_binary) {
            (BackendKind::Desktop, None) => Some(self.spawner.discover_desktop_binary()?),
            (_, explicit) => explicit,
        };
        let request = SpawnRequest {
            team: args.team_name,
            name: args.name,
            prompt: args.prompt,
            model: args.model.unwrap_or_default(),
            agent_type: args.subagent_type,
            backend,
            cwd: args.cwd,
            plan_mode_required: args.plan_mode_required,
            role_instructions: args.role_instructions,
            custom_instructions: args.custom_instructions,
            desktop_binary,
        };
        let member = self.spawner.spawn(&request).await?;
        Ok(serde_json::to_value(member)?)
    }

    async fn force_kill_teammate(&self, args: AgentArgs) -> Result<Value, ToolError> {
        let name = short_name(&args.agent_name, &args.team_name).to_string();
        if name == LEAD_NAME {
            return Err(ToolError::Invalid(
                "The team lead cannot be killed".to_string(),
            ));
        }
        let member = self.spawner.kill(&args.team_name, &name).await?;
        Ok(json!({
            "success": true,
            "agent_id": member.agent_id,
            "message": format!("{name} has been stopped and removed from team '{}'", args.team_name),
        }))
    }

    async fn send_message(&self, args: SendArgs) -> Result<Value, ToolError> {
        let kind = MessageKind::from_str(&args.kind).map_err(ToolError::Invalid)?;
        self.blocking(move |store| deliver(&store, kind, args)).await
    }

    async fn read_inbox(&self, args: AgentArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| {
            let messages = messaging::read_inbox(&store, &args.team_name, &args.agent_name)?;
            Ok(serde_json::to_value(messages)?)
        })
        .await
    }

    async fn poll_inbox(&self, args: PollArgs) -> Result<Value, ToolError> {
        let timeout = Duration::from_millis(
            args.timeout_ms
                .unwrap_or(DEFAULT_POLL_TIMEOUT_MS)
                .min(MAX_POLL_TIMEOUT_MS),
        );
        self.blocking(move |store| {
            let messages =
                messaging::poll_inbox(&store, &args.team_name, &args.agent_name, args.since, timeout)?;
            Ok(serde_json::to_value(messages)?)
        })
        .await
    }

    async fn task_create(&self, args: TaskCreateArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| {
            let task = tasks::create_task(&store, &args.team_name, &args.subject, &args.description)?;
            Ok(serde_json::to_value(task)?)
        })
        .await
    }

    async fn task_list(&self, args: TeamArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| Ok(serde_json::to_value(tasks::list_tasks(&store, &args.team_name)?)?))
            .await
    }

    async fn task_get(&self, args: TaskGetArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| {
            Ok(serde_json::to_value(tasks::get_task(
                &store,
                &args.team_name,
                &args.task_id,
            )?)?)
        })
        .await
    }

    async fn task_update(&self, args: TaskUpdateArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| {
            let patch = TaskPatch {
                status: args.status,
                owner: args.owner,
                subject: args.subject,
                description: args.description,
            };
            let task = tasks::update_task(&store, &args.team_name, &args.task_id, patch)?;
            Ok(serde_json::to_value(task)?)
        })
        .await
    }

    async fn check_agent_health(&self, args: AgentArgs) -> Result<Value, ToolError> {
        let name = short_name(&args.agent_name, &args.team_name);
        let report = health::check_agent_health(
            self.store(),
            self.spawner.runner(),
            &args.team_name,
            name,
            &self.thresholds,
        )
        .await?;
        Ok(serde_json::to_value(report)?)
    }

    async fn check_all_agents_health(&self, args: TeamArgs) -> Result<Value, ToolError> {
        let reports = health::check_all_agents_health(
            self.store(),
            self.spawner.runner(),
            &args.team_name,
            &self.thresholds,
        )
        .await?;
        Ok(serde_json::to_value(reports)?)
    }

    async fn process_shutdown_approved(&self, args: AgentArgs) -> Result<Value, ToolError> {
        let name = short_name(&args.agent_name, &args.team_name).to_string();
        if name == LEAD_NAME {
            return Err(ToolError::Invalid(
                "The team lead cannot process its own shutdown".to_string(),
            ));
        }
        let spawner = Arc::clone(&self.spawner);
        let team = args.team_name.clone();
        let retired = {
            let name = name.clone();
            tokio::task::spawn_blocking(move || spawner.retire(&team, &name)).await??
        };
        if retired.is_none() {
            return Err(StoreError::MemberNotFound {
                team: args.team_name,
                name,
            }
            .into());
        }
        info!("'{name}' left team '{}' after approved shutdown", args.team_name);
        Ok(json!({
            "success": true,
            "message": format!("{name} removed from team '{}'", args.team_name),
        }))
    }

    async fn read_config(&self, args: TeamArgs) -> Result<Value, ToolError> {
        self.blocking(move |store| Ok(serde_json::to_value(store.read_config(&args.team_name)?)?))
            .await
    }

    fn server_status(&self) -> Value {
        json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "teams_root": self.store().root(),
            "project_dir": self.spawner.settings().project_dir,
            "agent_binary": self.spawner.cached_agent_binary(),
        })
    }
}

fn parse<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

fn required(value: Option<String>, kind: MessageKind, field: &'static str) -> Result<String, MessageError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(MessageError::MissingField { kind, field })
}

/// Route one `send_message` call by type.
fn deliver(store: &TeamStore, kind: MessageKind, args: SendArgs) -> Result<Value, ToolError> {
    let team = args.team_name.as_str();
    match kind {
        MessageKind::Plain | MessageKind::Broadcast => {
            let outgoing = Outgoing {
                kind,
                recipient: args.recipient,
                content: args.content,
                summary: args.summary,
                sender: args.sender,
            };
            let delivery = messaging::send(store, team, &outgoing)?;
            let message = match kind {
                MessageKind::Broadcast => {
                    format!("Broadcast sent to {} member(s)", delivery.recipients.len())
                }
                _ => format!("Message sent to {}", delivery.recipients.join(", ")),
            };
            Ok(json!({
                "success": true,
                "message": message,
                "recipients": delivery.recipients,
                "message_id": delivery.message.message_id,
            }))
        }
        MessageKind::ShutdownRequest => {
            let recipient = args
                .recipient
                .filter(|r| !r.trim().is_empty())
                .ok_or(MessageError::MissingRecipient { kind })?;
            if short_name(&recipient, team) == LEAD_NAME {
                return Err(ToolError::Invalid(
                    "Cannot send a shutdown request to the team lead".to_string(),
                ));
            }
            let reason = args.reason.or(Some(args.content).filter(|c| !c.is_empty()));
            let request_id =
                messaging::send_shutdown_request(store, team, &recipient, reason.as_deref())?;
            Ok(json!({
                "success": true,
                "message": format!("Shutdown request sent to {}", short_name(&recipient, team)),
                "request_id": request_id,
            }))
        }
        MessageKind::ShutdownResponse => {
            let sender = required(args.sender, kind, "sender")?;
            let approve = args.approve.ok_or(MessageError::MissingField {
                kind,
                field: "approve",
            })?;
            let reason = args.reason.or(Some(args.content).filter(|c| !c.is_empty()));
            messaging::send_shutdown_response(
                store,
                team,
                &sender,
                args.request_id.as_deref().unwrap_or_default(),
                approve,
                reason.as_deref(),
            )?;
            Ok(json!({
                "success": true,
                "message": format!("Shutdown response sent to {}", lead_identity(team)),
            }))
        }
        MessageKind::PlanApprovalResponse => {
            let sender = required(args.sender, kind, "sender")?;
            let recipient = args
                .recipient
                .filter(|r| !r.trim().is_empty())
                .ok_or(MessageError::MissingRecipient { kind })?;
            let approve = args.approve.ok_or(MessageError::MissingField {
                kind,
                field: "approve",
            })?;
            let content = Some(args.content).filter(|c| !c.is_empty());
            messaging::send_plan_approval_response(
                store,
                team,
                &sender,
                &recipient,
                args.request_id.as_deref().unwrap_or_default(),
                approve,
                content.as_deref(),
            )?;
            Ok(json!({
                "success": true,
                "message": format!("Plan response sent to {}", short_name(&recipient, team)),
            }))
        }
        MessageKind::TaskAssignment => Err(ToolError::Invalid(
            "task_assignment messages are sent by task_update, not send_message".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_team_coord_core::TeamMember;
    use agent_team_coord_core::spawn::SpawnSettings;
    use agent_team_coord_core::spawn::mock_runner::{MockResponse, MockRunner};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        project: PathBuf,
        runner: MockRunner,
        coordinator: Coordinator,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(temp.path().join("teams"));
        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        let agent = temp.path().join("opencode");
        std::fs::write(&agent, "").unwrap();

        let runner = MockRunner::new();
        runner.respond(
            &agent.to_string_lossy(),
            "--version",
            MockResponse::ok("opencode 1.1.60\n"),
        );
        runner.respond("tmux", "split-window", MockResponse::ok("%7\n"));
        runner.respond("tmux", "kill-pane", MockResponse::ok(""));

        let mut settings = SpawnSettings::new(&project);
        settings.agent_binary = Some(agent);
        let spawner = Spawner::new(
            store,
            Arc::new(runner.clone()),
            Arc::new(MarkdownConfigRenderer),
            Arc::new(PassthroughModelResolver::new(Some("openai/gpt-5".to_string()))),
            settings,
        );
        Fixture {
            _temp: temp,
            project,
            runner,
            coordinator: Coordinator::new(spawner, HealthThresholds::default()),
        }
    }

    async fn team_of(fx: &Fixture, members: &[&str]) {
        fx.coordinator
            .call_tool("team_create", &json!({"team_name": "t1"}))
            .await
            .unwrap();
        for name in members {
            fx.coordinator
                .store()
                .add_member("t1", TeamMember::new("t1", name, BackendKind::Tmux))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_team_create_reports_lead() {
        let fx = fixture();
        let result = fx
            .coordinator
            .call_tool("team_create", &json!({"team_name": "t1", "description": "demo"}))
            .await
            .unwrap();
        assert_eq!(result["team_name"], "t1");
        assert_eq!(result["lead_agent_id"], "team-lead@t1");
        assert!(result["team_file"].as_str().unwrap().ends_with("config.json"));

        let again = fx
            .coordinator
            .call_tool("team_create", &json!({"team_name": "t1"}))
            .await;
        assert!(matches!(again, Err(ToolError::Store(StoreError::TeamExists { .. }))));
    }

    #[tokio::test]
    async fn test_plain_send_is_relayed_by_lead() {
        let fx = fixture();
        team_of(&fx, &["alice", "bob"]).await;
        fx.coordinator
            .call_tool(
                "send_message",
                &json!({
                    "team_name": "t1",
                    "type": "message",
                    "recipient": "bob",
                    "content": "hello bob",
                    "sender": "alice"
                }),
            )
            .await
            .unwrap();

        let inbox = fx
            .coordinator
            .call_tool("read_inbox", &json!({"team_name": "t1", "agent_name": "bob"}))
            .await
            .unwrap();
        let inbox = inbox.as_array().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0]["text"], "hello bob");
        assert_eq!(inbox[0]["from"], "team-lead@t1");
    }

    #[tokio::test]
    async fn test_shutdown_round_trip() {
        let fx = fixture();
        team_of(&fx, &["alice"]).await;
        let request = fx
            .coordinator
            .call_tool(
                "send_message",
                &json!({"team_name": "t1", "type": "shutdown_request", "recipient": "alice"}),
            )
            .await
            .unwrap();
        let request_id = request["request_id"].as_str().unwrap().to_string();

        let missing_sender = fx
            .coordinator
            .call_tool(
                "send_message",
                &json!({"team_name": "t1", "type": "shutdown_response", "request_id": request_id, "approve": true}),
            )
            .await;
        assert!(matches!(
            missing_sender,
            Err(ToolError::Message(MessageError::MissingField { field: "sender", .. }))
        ));

        fx.coordinator
            .call_tool(
                "send_message",
                &json!({
                    "team_name": "t1",
                    "type": "shutdown_response",
                    "sender": "alice",
                    "request_id": request_id,
                    "approve": true
                }),
            )
            .await
            .unwrap();
        let lead = messaging::read_inbox(fx.coordinator.store(), "t1", LEAD_NAME).unwrap();
        assert_eq!(lead.len(), 1);
        assert_eq!(lead[0].from, "alice@t1");

        fx.coordinator
            .call_tool(
                "process_shutdown_approved",
                &json!({"team_name": "t1", "agent_name": "alice"}),
            )
            .await
            .unwrap();
        assert!(fx.coordinator.store().read_config("t1").unwrap().members.is_empty());
    }

    #[tokio::test]
    async fn test_process_shutdown_rejects_lead_and_unknown() {
        let fx = fixture();
        team_of(&fx, &[]).await;
        let lead = fx
            .coordinator
            .call_tool(
                "process_shutdown_approved",
                &json!({"team_name": "t1", "agent_name": "team-lead"}),
            )
            .await;
        assert!(matches!(lead, Err(ToolError::Invalid(_))));

        let unknown = fx
            .coordinator
            .call_tool(
                "process_shutdown_approved",
                &json!({"team_name": "t1", "agent_name": "ghost"}),
            )
            .await;
        assert!(matches!(
            unknown,
            Err(ToolError::Store(StoreError::MemberNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_poll_times_out_empty() {
        let fx = fixture();
        team_of(&fx, &["alice"]).await;
        let result = fx
            .coordinator
            .call_tool(
                "poll_inbox",
                &json!({"team_name": "t1", "agent_name": "alice", "timeout_ms": 50}),
            )
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn test_task_update_assigns_owner() {
        let fx = fixture();
        team_of(&fx, &["alice"]).await;
        let task = fx
            .coordinator
            .call_tool(
                "task_create",
                &json!({"team_name": "t1", "subject": "implement auth", "description": "add jwt"}),
            )
            .await
            .unwrap();
        assert_eq!(task["status"], "open");

        let updated = fx
            .coordinator
            .call_tool(
                "task_update",
                &json!({"team_name": "t1", "task_id": task["id"], "owner": "alice", "status": "in_progress"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["owner"], "alice");

        let inbox = messaging::read_inbox(fx.coordinator.store(), "t1", "alice").unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, MessageKind::TaskAssignment);
    }

    #[tokio::test]
    async fn test_spawn_then_force_kill() {
        let fx = fixture();
        team_of(&fx, &[]).await;
        let member = fx
            .coordinator
            .call_tool(
                "spawn_teammate",
                &json!({"team_name": "t1", "name": "worker", "prompt": "Do research"}),
            )
            .await
            .unwrap();
        assert_eq!(member["name"], "worker");
        assert_eq!(member["tmuxPaneId"], "%7");
        assert!(fx.project.join(".opencode/agents/worker.md").exists());

        let status = fx
            .coordinator
            .call_tool("server_status", &Value::Null)
            .await
            .unwrap();
        assert!(status["agent_binary"].as_str().unwrap().ends_with("opencode"));

        fx.coordinator
            .call_tool(
                "force_kill_teammate",
                &json!({"team_name": "t1", "agent_name": "worker@t1"}),
            )
            .await
            .unwrap();
        assert_eq!(fx.runner.runs_of("tmux").len(), 2);
        assert!(fx.coordinator.store().read_config("t1").unwrap().members.is_empty());
        assert!(!fx.project.join(".opencode/agents/worker.md").exists());
    }

    #[tokio::test]
    async fn test_argument_errors() {
        let fx = fixture();
        let unknown = fx.coordinator.call_tool("team_rename", &json!({})).await;
        assert!(matches!(unknown, Err(ToolError::UnknownTool(_))));

        let missing = fx.coordinator.call_tool("task_get", &json!({"team_name": "t1"})).await;
        assert!(matches!(missing, Err(ToolError::InvalidArguments { .. })));

        let bad_type = fx
            .coordinator
            .call_tool("send_message", &json!({"team_name": "t1", "type": "telegram"}))
            .await;
        assert!(matches!(bad_type, Err(ToolError::Invalid(_))));

        let bad_backend = fx
            .coordinator
            .call_tool(
                "spawn_teammate",
                &json!({"team_name": "t1", "name": "w", "prompt": "p", "backend": "screen"}),
            )
            .await;
        assert!(matches!(bad_backend, Err(ToolError::InvalidArguments { .. })));
    }
}
