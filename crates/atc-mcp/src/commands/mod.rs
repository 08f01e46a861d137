//! Command implementations for atc-mcp subcommands.
//!
//! Each module corresponds to a top-level subcommand exposed by the CLI.

pub mod config_cmd;
pub mod serve;
pub mod status;

use agent_team_coord_core::config::{Config, ConfigOverrides, resolve_config};
use agent_team_coord_core::home::get_home_dir;
use anyhow::Context;
use std::path::PathBuf;

/// Configuration plus the directories it was resolved against.
pub(crate) struct Resolved {
    pub config: Config,
    pub home_dir: PathBuf,
    pub current_dir: PathBuf,
}

pub(crate) fn resolve(overrides: ConfigOverrides) -> anyhow::Result<Resolved> {
    let home_dir = get_home_dir()?;
    let current_dir = std::env::current_dir().context("Could not read current directory")?;
    let config = resolve_config(&overrides, &current_dir, &home_dir)?;
    Ok(Resolved {
        config,
        home_dir,
        current_dir,
    })
}
