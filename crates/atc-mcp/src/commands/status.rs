//! `status` subcommand: summarize teams under the teams root.

use super::resolve;
use crate::cli::StatusArgs;
use agent_team_coord_core::TeamStore;
use agent_team_coord_core::config::ConfigOverrides;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct TeamSummary {
    pub name: String,
    pub members: usize,
    pub tasks: usize,
}

/// Summaries of every readable team under `root`. Unreadable teams are skipped.
pub fn collect(root: &Path) -> anyhow::Result<Vec<TeamSummary>> {
    let store = TeamStore::new(root);
    let mut summaries = Vec::new();
    for name in store.list_teams()? {
        let config = match store.read_config(&name) {
            Ok(config) => config,
            Err(e) => {
                warn!("Skipping team '{name}': {e}");
                continue;
            }
        };
        let tasks = store.read_tasks(&name).map(|t| t.len()).unwrap_or(0);
        summaries.push(TeamSummary {
            name,
            members: config.members.len(),
            tasks,
        });
    }
    Ok(summaries)
}

/// Run the `status` subcommand.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved or the teams root
/// cannot be listed.
pub async fn run(config_path: &Option<PathBuf>, args: StatusArgs) -> anyhow::Result<()> {
    let resolved = resolve(ConfigOverrides {
        config_path: config_path.clone(),
        teams_dir: args.teams_dir,
        ..ConfigOverrides::default()
    })?;
    let root = resolved.config.teams_root(&resolved.home_dir);
    let summaries = collect(&root)?;

    if args.json {
        let report = serde_json::json!({
            "teams_root": root,
            "teams": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Teams under {}:", root.display());
    if summaries.is_empty() {
        println!("  (none)");
    }
    for team in &summaries {
        println!(
            "  {:<24} {} member(s), {} task(s)",
            team.name, team.members, team.tasks
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_team_coord_core::TeamMember;
    use agent_team_coord_core::schema::BackendKind;
    use agent_team_coord_core::tasks::create_task;
    use tempfile::TempDir;

    #[test]
    fn test_collect_counts_members_and_tasks() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(temp.path());
        store.create_team("alpha", None).unwrap();
        store.create_team("beta", None).unwrap();
        store
            .add_member("beta", TeamMember::new("beta", "alice", BackendKind::Tmux))
            .unwrap();
        create_task(&store, "beta", "Write docs", "").unwrap();
        std::fs::create_dir(temp.path().join("stray")).unwrap();

        let summaries = collect(temp.path()).unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta"]);
        assert_eq!(summaries[1].members, 1);
        assert_eq!(summaries[1].tasks, 1);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(collect(&temp.path().join("absent")).unwrap().is_empty());
    }
}
