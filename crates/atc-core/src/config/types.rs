//! Configuration types
//!
//! Every field is optional so that each layer only overrides what it sets.
//! Accessors on [`Config`] supply the defaults.

use crate::health::HealthThresholds;
use crate::home::default_teams_root;
use crate::io::DEFAULT_LOCK_TIMEOUT;
use crate::spawn::command::SPAWN_TIMEOUT_SECS;
use crate::spawn::{ServerRegistration, SpawnSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default MCP server name registered in `opencode.json`
pub const DEFAULT_SERVER_NAME: &str = "atc";

/// Default command the agent CLI runs to reach the coordinator
pub const DEFAULT_SERVER_COMMAND: &str = "atc-mcp serve";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// `[core]`: where team state and the project live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Root holding one directory per team (default: ~/.atc/teams)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams_dir: Option<PathBuf>,
    /// Project receiving agent config documents (default: current directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_secs: Option<u64>,
}

/// `[spawn]`: agent binaries, models and the MCP registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_binary: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_binary: Option<PathBuf>,
    /// Model used when a spawn requests "auto" or nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_command: Option<String>,
    /// Extra environment for the registered server and headless workers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub server_env: BTreeMap<String, String>,
}

/// `[health]`: classification thresholds in seconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hung_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_secs: Option<u64>,
}

impl Config {
    /// Later layers win field by field; `server_env` entries are merged.
    pub(crate) fn merge(&mut self, other: Config) {
        let Config { core, spawn, health } = other;

        overlay(&mut self.core.teams_dir, core.teams_dir);
        overlay(&mut self.core.project_dir, core.project_dir);
        overlay(&mut self.core.lock_timeout_secs, core.lock_timeout_secs);

        overlay(&mut self.spawn.agent_binary, spawn.agent_binary);
        overlay(&mut self.spawn.desktop_binary, spawn.desktop_binary);
        overlay(&mut self.spawn.default_model, spawn.default_model);
        overlay(&mut self.spawn.spawn_timeout_secs, spawn.spawn_timeout_secs);
        overlay(&mut self.spawn.server_name, spawn.server_name);
        overlay(&mut self.spawn.server_command, spawn.server_command);
        self.spawn.server_env.extend(spawn.server_env);

        overlay(&mut self.health.grace_period_secs, health.grace_period_secs);
        overlay(&mut self.health.hung_timeout_secs, health.hung_timeout_secs);
        overlay(&mut self.health.probe_timeout_secs, health.probe_timeout_secs);
    }

    pub fn teams_root(&self, home_dir: &Path) -> PathBuf {
        self.core
            .teams_dir
            .clone()
            .unwrap_or_else(|| default_teams_root(home_dir))
    }

    pub fn project_dir(&self, current_dir: &Path) -> PathBuf {
        self.core
            .project_dir
            .clone()
            .unwrap_or_else(|| current_dir.to_path_buf())
    }

    pub fn lock_timeout(&self) -> Duration {
        self.core
            .lock_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn server_name(&self) -> &str {
        self.spawn
            .server_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVER_NAME)
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        let defaults = HealthThresholds::default();
        HealthThresholds {
            grace_period: self
                .health
                .grace_period_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_period),
            hung_timeout: self
                .health
                .hung_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.hung_timeout),
            probe_timeout: self
                .health
                .probe_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
        }
    }

    pub fn spawn_settings(&self, current_dir: &Path) -> SpawnSettings {
        SpawnSettings {
            project_dir: self.project_dir(current_dir),
            agent_binary: self.spawn.agent_binary.clone(),
            desktop_binary: self.spawn.desktop_binary.clone(),
            timeout_secs: self.spawn.spawn_timeout_secs.unwrap_or(SPAWN_TIMEOUT_SECS),
            registration: ServerRegistration {
                server_name: self.server_name().to_string(),
                command: self
                    .spawn
                    .server_command
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SERVER_COMMAND.to_string()),
                env: self.spawn.server_env.clone(),
            },
        }
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
