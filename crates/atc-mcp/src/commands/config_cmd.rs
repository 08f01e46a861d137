//! `config` subcommand: show resolved configuration.
//!
//! Prints either JSON (`--json`) or a key = value table with defaults
//! filled in.

use super::resolve;
use crate::cli::ConfigArgs;
use agent_team_coord_core::config::ConfigOverrides;
use std::path::{Path, PathBuf};

/// Run the `config` subcommand.
///
/// # Errors
///
/// Returns an error if an explicit config file cannot be loaded or the home
/// directory cannot be determined.
pub async fn run(config_path: &Option<PathBuf>, args: ConfigArgs) -> anyhow::Result<()> {
    let resolved = resolve(ConfigOverrides {
        config_path: config_path.clone(),
        ..ConfigOverrides::default()
    })?;
    let cfg = &resolved.config;

    if args.json {
        println!("{}", serde_json::to_string_pretty(cfg)?);
        return Ok(());
    }

    let settings = cfg.spawn_settings(&resolved.current_dir);
    let thresholds = cfg.health_thresholds();
    println!("[core]");
    println!("  teams_dir            = {}", cfg.teams_root(&resolved.home_dir).display());
    println!("  project_dir          = {}", settings.project_dir.display());
    println!("  lock_timeout_secs    = {}", cfg.lock_timeout().as_secs());
    println!("[spawn]");
    println!("  agent_binary         = {}", or_unset(settings.agent_binary.as_deref()));
    println!("  desktop_binary       = {}", or_unset(settings.desktop_binary.as_deref()));
    println!(
        "  default_model        = {}",
        cfg.spawn.default_model.as_deref().unwrap_or("<unset>")
    );
    println!("  spawn_timeout_secs   = {}", settings.timeout_secs);
    println!("  server_name          = {}", settings.registration.server_name);
    println!("  server_command       = {}", settings.registration.command);
    for (key, value) in &settings.registration.env {
        println!("  server_env.{key} = {value}");
    }
    println!("[health]");
    println!("  grace_period_secs    = {}", thresholds.grace_period.as_secs());
    println!("  hung_timeout_secs    = {}", thresholds.hung_timeout.as_secs());
    println!("  probe_timeout_secs   = {}", thresholds.probe_timeout.as_secs());
    Ok(())
}

fn or_unset(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string())
}
