//! Spawning and tearing down team workers
//!
//! [`Spawner::spawn`] runs a fixed sequence:
//!
//! 1. register the member in the roster (with its palette color)
//! 2. deliver the initial prompt as the first message in its mailbox
//! 3. render and write the per-agent config document
//! 4. merge the coordinator into the project's `opencode.json`
//! 5. launch the backend
//! 6. record the backend handle on the roster entry
//!
//! Validation (name, model, binaries) happens before step 1. If anything
//! after registration fails, the config document and roster entry are
//! removed again and the original error is returned. The mailbox is kept.

pub mod agent_config;
pub mod backend;
pub mod command;
pub mod discovery;
pub mod mock_runner;
pub mod model;
pub mod naming;
pub mod runner;
pub mod version;

pub use agent_config::{
    AgentConfigError, AgentConfigInput, AgentConfigRenderer, MarkdownConfigRenderer,
    ServerRegistration,
};
pub use backend::{Backend, LaunchContext, LaunchError, backend_for};
pub use discovery::DiscoveryError;
pub use model::{ModelError, ModelResolver, PassthroughModelResolver};
pub use naming::{NameError, assign_color, validate_name};
pub use runner::{CommandRunner, SystemRunner};
pub use version::{SemVer, VersionError};

use crate::health::forget_agent;
use crate::io::StoreError;
use crate::messaging::{self, MessageError, Outgoing};
use crate::schema::{BackendKind, TeamMember};
use crate::store::TeamStore;
use command::SPAWN_TIMEOUT_SECS;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error("The {backend} backend requires {what}, but none was supplied")]
    MissingBinary {
        backend: BackendKind,
        what: &'static str,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Config(#[from] AgentConfigError),
}

/// Deployment settings shared by every spawn.
#[derive(Debug, Clone)]
pub struct SpawnSettings {
    /// Project root receiving `.opencode/agents/` and `opencode.json`
    pub project_dir: PathBuf,
    /// Explicit agent CLI path; otherwise looked up on PATH
    pub agent_binary: Option<PathBuf>,
    /// Explicit desktop app path; otherwise discovered
    pub desktop_binary: Option<PathBuf>,
    pub timeout_secs: u64,
    pub registration: ServerRegistration,
}

impl SpawnSettings {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            agent_binary: None,
            desktop_binary: None,
            timeout_secs: SPAWN_TIMEOUT_SECS,
            registration: ServerRegistration {
                server_name: "atc".to_string(),
                command: "atc-mcp serve".to_string(),
                env: Default::default(),
            },
        }
    }
}

/// One spawn call.
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    pub team: String,
    pub name: String,
    pub prompt: String,
    /// Requested model; empty or `"auto"` resolves to the default
    pub model: String,
    pub agent_type: Option<String>,
    pub backend: BackendKind,
    /// Working directory; the project directory when `None`
    pub cwd: Option<PathBuf>,
    pub plan_mode_required: bool,
    pub role_instructions: Option<String>,
    pub custom_instructions: Option<String>,
    /// Desktop app path, required for [`BackendKind::Desktop`]
    pub desktop_binary: Option<PathBuf>,
}

/// Creates and removes workers. Holds only the cached agent binary path.
pub struct Spawner {
    store: TeamStore,
    runner: Arc<dyn CommandRunner>,
    renderer: Arc<dyn AgentConfigRenderer>,
    models: Arc<dyn ModelResolver>,
    settings: SpawnSettings,
    agent_binary: OnceCell<PathBuf>,
}

impl Spawner {
    pub fn new(
        store: TeamStore,
        runner: Arc<dyn CommandRunner>,
        renderer: Arc<dyn AgentConfigRenderer>,
        models: Arc<dyn ModelResolver>,
        settings: SpawnSettings,
    ) -> Self {
        Self {
            store,
            runner,
            renderer,
            models,
            settings,
            agent_binary: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &TeamStore {
        &self.store
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn settings(&self) -> &SpawnSettings {
        &self.settings
    }

    /// Agent binary path, if discovery has already succeeded.
    pub fn cached_agent_binary(&self) -> Option<&Path> {
        self.agent_binary.get().map(PathBuf::as_path)
    }

    /// Discover and version-check the agent CLI once; later calls reuse the result.
    pub async fn agent_binary(&self) -> Result<&Path, SpawnError> {
        let path = self
            .agent_binary
            .get_or_try_init(|| async {
                let path = discovery::discover_agent_binary(self.settings.agent_binary.as_deref())?;
                let found = version::check_binary_version(self.runner.as_ref(), &path).await?;
                info!("Using agent binary {} (version {found})", path.display());
                Ok::<_, SpawnError>(path)
            })
            .await?;
        Ok(path.as_path())
    }

    /// Desktop app from settings, `ATC_DESKTOP_BINARY`, known paths or PATH.
    pub fn discover_desktop_binary(&self) -> Result<PathBuf, SpawnError> {
        Ok(discovery::discover_desktop_binary(
            self.settings.desktop_binary.as_deref(),
        )?)
    }

    /// Register, configure and launch one worker.
    pub async fn spawn(&self, request: &SpawnRequest) -> Result<TeamMember, SpawnError> {
        validate_name(&request.name)?;
        let model = self.models.resolve(&request.model)?;
        let desktop_binary = match request.backend {
            BackendKind::Desktop => Some(request.desktop_binary.clone().ok_or(
                SpawnError::MissingBinary {
                    backend: BackendKind::Desktop,
                    what: "desktop_binary",
                },
            )?),
            _ => None,
        };
        let agent_binary = match request.backend {
            BackendKind::Desktop => None,
            _ => Some(self.agent_binary().await?.to_path_buf()),
        };

        let member = self.register(request, &model).await?;
        let mut rollback = Rollback::new(
            &self.store,
            &self.settings.project_dir,
            &request.team,
            &member.name,
        );
        let binaries = Binaries {
            agent: agent_binary.as_deref(),
            desktop: desktop_binary.as_deref(),
        };
        match self.provision(request, &member, binaries, &mut rollback).await {
            Ok(stored) => {
                rollback.disarm();
                info!(
                    "Spawned '{}' in team '{}' on {} ({})",
                    stored.name,
                    request.team,
                    request.backend,
                    stored.handle().map(|h| h.to_string()).unwrap_or_default()
                );
                Ok(stored)
            }
            Err(e) => {
                rollback.undo().await;
                Err(e)
            }
        }
    }

    /// Steps 2 to 6 for a member that is already registered.
    async fn provision(
        &self,
        request: &SpawnRequest,
        member: &TeamMember,
        binaries: Binaries<'_>,
        rollback: &mut Rollback,
    ) -> Result<TeamMember, SpawnError> {
        let team = request.team.as_str();
        {
            let (team, name, prompt) = (team.to_string(), member.name.clone(), request.prompt.clone());
            self.store
                .run_blocking(move |store| {
                    messaging::send(&store, &team, &Outgoing::plain(&name, &prompt))?;
                    Ok::<_, SpawnError>(())
                })
                .await?;
        }

        let document = self.renderer.render(&AgentConfigInput {
            agent_id: &member.agent_id,
            name: &member.name,
            team,
            color: &member.color,
            model: &member.model,
            role_instructions: request.role_instructions.as_deref(),
            custom_instructions: request.custom_instructions.as_deref(),
            tool_prefix: &self.settings.registration.server_name,
        })?;
        agent_config::write_agent_config(&self.settings.project_dir, &member.name, &document)?;
        rollback.config_written = true;

        agent_config::ensure_registration_file(
            &self.settings.project_dir,
            &self.settings.registration,
        )?;

        let backend = backend_for(request.backend);
        let context = LaunchContext {
            member,
            agent_binary: binaries.agent,
            desktop_binary: binaries.desktop,
            timeout_secs: self.settings.timeout_secs,
            transcript: (request.backend == BackendKind::WindowsTerminal)
                .then(|| self.store.transcript_path(team, &member.name)),
            env: self
                .settings
                .registration
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let handle = backend.launch(self.runner.as_ref(), &context).await?;

        let recorded = {
            let (team, name, handle) = (team.to_string(), member.name.clone(), handle.clone());
            self.store
                .run_blocking(move |store| store.update_member(&team, &name, |m| m.set_handle(handle)))
                .await
        };
        match recorded {
            Ok(stored) => Ok(stored),
            Err(e) => {
                if let Err(kill_err) = backend.kill(self.runner.as_ref(), &handle).await {
                    warn!("Could not stop '{}' after failed registration: {kill_err}", member.name);
                }
                Err(e.into())
            }
        }
    }

    /// Step 1: build the member and add it under the team lock.
    async fn register(&self, request: &SpawnRequest, model: &str) -> Result<TeamMember, SpawnError> {
        let mut member = TeamMember::new(&request.team, &request.name, request.backend);
        if let Some(agent_type) = request.agent_type.as_deref().filter(|t| !t.is_empty()) {
            member.agent_type = agent_type.to_string();
        }
        member.model = model.to_string();
        member.prompt = request.prompt.clone();
        member.plan_mode_required = request.plan_mode_required;
        member.cwd = request
            .cwd
            .as_deref()
            .unwrap_or(&self.settings.project_dir)
            .to_string_lossy()
            .into_owned();

        let team = request.team.clone();
        self.store
            .run_blocking(move |store| -> Result<TeamMember, SpawnError> {
                let guard = store.lock_team(&team)?;
                let mut config = guard.config()?;
                if config.member(&member.name).is_some() {
                    return Err(StoreError::DuplicateMember {
                        team,
                        name: member.name,
                    }
                    .into());
                }
                member.color = assign_color(config.members.len()).to_string();
                config.members.push(member.clone());
                guard.save_config(&config)?;
                Ok(member)
            })
            .await
    }

    /// Stop a worker's backend, then remove its roster entry, config document
    /// and health record. A worker that is already gone is not an error.
    pub async fn kill(&self, team: &str, name: &str) -> Result<TeamMember, SpawnError> {
        let config = {
            let team = team.to_string();
            self.store
                .run_blocking(move |store| store.read_config(&team))
                .await?
        };
        let member = config
            .member(name)
            .cloned()
            .ok_or_else(|| StoreError::MemberNotFound {
                team: team.to_string(),
                name: name.to_string(),
            })?;
        if let Some(handle) = member.handle() {
            backend_for(member.backend_type)
                .kill(self.runner.as_ref(), &handle)
                .await?;
        }
        let (team_owned, name_owned) = (team.to_string(), name.to_string());
        let project_dir = self.settings.project_dir.clone();
        self.store
            .run_blocking(move |store| retire_member(&store, &project_dir, &team_owned, &name_owned))
            .await?;
        info!("Killed '{name}' in team '{team}'");
        Ok(member)
    }

    /// Remove a worker's roster entry, config document and health record
    /// without touching its process. Blocks on the team lock.
    pub fn retire(&self, team: &str, name: &str) -> Result<Option<TeamMember>, SpawnError> {
        retire_member(&self.store, &self.settings.project_dir, team, name)
    }
}

fn retire_member(
    store: &TeamStore,
    project_dir: &Path,
    team: &str,
    name: &str,
) -> Result<Option<TeamMember>, SpawnError> {
    let removed = store.remove_member(team, name)?;
    agent_config::cleanup_agent_config(project_dir, name)?;
    forget_agent(store, team, name)?;
    Ok(removed)
}

#[derive(Clone, Copy)]
struct Binaries<'a> {
    agent: Option<&'a Path>,
    desktop: Option<&'a Path>,
}

/// Undoes a partial spawn. Error paths call [`Rollback::undo`]; dropping an
/// armed guard (a cancelled spawn) undoes synchronously.
struct Rollback {
    store: TeamStore,
    project_dir: PathBuf,
    team: String,
    name: String,
    config_written: bool,
    armed: bool,
}

impl Rollback {
    fn new(store: &TeamStore, project_dir: &Path, team: &str, name: &str) -> Self {
        Self {
            store: store.clone(),
            project_dir: project_dir.to_path_buf(),
            team: team.to_string(),
            name: name.to_string(),
            config_written: false,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    async fn undo(mut self) {
        self.armed = false;
        let (project_dir, team, name) = (
            self.project_dir.clone(),
            self.team.clone(),
            self.name.clone(),
        );
        let config_written = self.config_written;
        let undone = self
            .store
            .run_blocking(move |store| {
                undo_spawn(&store, &project_dir, &team, &name, config_written);
                Ok::<_, StoreError>(())
            })
            .await;
        if let Err(e) = undone {
            warn!("Rollback of '{}' did not complete: {e}", self.name);
        }
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        if self.armed {
            undo_spawn(
                &self.store,
                &self.project_dir,
                &self.team,
                &self.name,
                self.config_written,
            );
        }
    }
}

fn undo_spawn(store: &TeamStore, project_dir: &Path, team: &str, name: &str, config_written: bool) {
    warn!("Rolling back spawn of '{name}' in team '{team}'");
    if config_written {
        if let Err(e) = agent_config::cleanup_agent_config(project_dir, name) {
            warn!("Rollback could not remove config for '{name}': {e}");
        }
    }
    if let Err(e) = store.remove_member(team, name) {
        warn!("Rollback could not remove roster entry '{name}': {e}");
    }
}
