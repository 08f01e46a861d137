//! `serve` subcommand: run the coordinator on stdio.

use super::resolve;
use crate::cli::ServeArgs;
use crate::coordinator::Coordinator;
use crate::server::McpServer;
use agent_team_coord_core::config::ConfigOverrides;
use std::path::PathBuf;
use tracing::info;

/// Run the `serve` subcommand until stdin closes.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved or stdio fails.
pub async fn run(config_path: &Option<PathBuf>, args: ServeArgs) -> anyhow::Result<()> {
    let resolved = resolve(ConfigOverrides {
        config_path: config_path.clone(),
        teams_dir: args.teams_dir,
        project_dir: args.project_dir,
    })?;
    let coordinator =
        Coordinator::from_config(&resolved.config, &resolved.home_dir, &resolved.current_dir);
    info!(
        "Serving teams under {} for project {}",
        coordinator.store().root().display(),
        resolved.config.project_dir(&resolved.current_dir).display()
    );

    let server = McpServer::new(coordinator);
    server.run(tokio::io::stdin(), tokio::io::stdout()).await
}
