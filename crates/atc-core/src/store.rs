//! Per-team directory store
//!
//! ```text
//! <root>/<team>/
//!   config.json           roster
//!   tasks.json            task collection
//!   health.json           health records
//!   inboxes/<agent>.json  one mailbox per agent
//!   logs/<agent>.log      transcripts for scripted terminals
//!   .lock                 team-scoped exclusive lock
//! ```
//!
//! Writers go through [`TeamStore::lock_team`], which holds the team lock for
//! the lifetime of the returned [`TeamGuard`]; every write replaces a whole
//! document atomically. Readers on [`TeamStore`] never lock.

use crate::io::{
    FileLock, StoreError, acquire_lock, read_json, read_json_or_default, write_json_atomic,
    DEFAULT_LOCK_TIMEOUT,
};
use crate::schema::{HealthRecords, InboxMessage, TaskItem, TeamConfig, TeamMember};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Handle on the teams root directory
#[derive(Debug, Clone)]
pub struct TeamStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl TeamStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the bounded wait used when acquiring team locks.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `f` with a clone of this store on the blocking pool.
    ///
    /// Lock acquisition sleeps between attempts, so locked sections called
    /// from async code go through here.
    pub async fn run_blocking<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(TeamStore) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || f(store)).await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Background {
                reason: e.to_string(),
            }
            .into()),
        }
    }

    pub fn team_dir(&self, team: &str) -> PathBuf {
        self.root.join(team)
    }

    pub fn config_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("config.json")
    }

    pub fn tasks_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("tasks.json")
    }

    pub fn health_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("health.json")
    }

    pub fn inboxes_dir(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("inboxes")
    }

    pub fn inbox_path(&self, team: &str, agent: &str) -> PathBuf {
        self.inboxes_dir(team).join(format!("{agent}.json"))
    }

    pub fn transcript_path(&self, team: &str, agent: &str) -> PathBuf {
        self.team_dir(team).join("logs").join(format!("{agent}.log"))
    }

    fn lock_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join(".lock")
    }

    pub fn team_exists(&self, team: &str) -> bool {
        self.config_path(team).is_file()
    }

    /// Create a new team directory with an empty roster.
    pub fn create_team(
        &self,
        team: &str,
        description: Option<String>,
    ) -> Result<TeamConfig, StoreError> {
        validate_segment(team)?;
        let dir = self.team_dir(team);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let _lock = acquire_lock(&self.lock_path(team), self.lock_timeout)?;
        if self.team_exists(team) {
            return Err(StoreError::TeamExists {
                team: team.to_string(),
            });
        }

        let config = TeamConfig::new(team, description);
        write_json_atomic(&self.config_path(team), &config)?;
        let inboxes = self.inboxes_dir(team);
        std::fs::create_dir_all(&inboxes).map_err(|e| StoreError::io(&inboxes, e))?;
        info!("Created team '{team}' at {}", dir.display());
        Ok(config)
    }

    /// Delete a team that has no remaining members.
    pub fn delete_team(&self, team: &str) -> Result<(), StoreError> {
        {
            let guard = self.lock_team(team)?;
            let config = guard.config()?;
            if !config.members.is_empty() {
                return Err(StoreError::TeamNotEmpty {
                    team: team.to_string(),
                    members: config.members.len(),
                });
            }
        }
        let dir = self.team_dir(team);
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        info!("Deleted team '{team}'");
        Ok(())
    }

    /// Names of all teams under the root, sorted.
    pub fn list_teams(&self) -> Result<Vec<String>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };
        let mut teams: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().join("config.json").is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        teams.sort();
        Ok(teams)
    }

    /// Acquire the team lock for a read-modify-write cycle.
    pub fn lock_team(&self, team: &str) -> Result<TeamGuard<'_>, StoreError> {
        validate_segment(team)?;
        if !self.team_exists(team) {
            return Err(StoreError::TeamNotFound {
                team: team.to_string(),
            });
        }
        let lock = acquire_lock(&self.lock_path(team), self.lock_timeout)?;
        debug!("Acquired lock for team '{team}'");
        Ok(TeamGuard {
            store: self,
            team: team.to_string(),
            _lock: lock,
        })
    }

    /// Lock-free read of the roster document.
    pub fn read_config(&self, team: &str) -> Result<TeamConfig, StoreError> {
        validate_segment(team)?;
        read_json(&self.config_path(team))?.ok_or_else(|| StoreError::TeamNotFound {
            team: team.to_string(),
        })
    }

    /// Lock-free read of the task collection.
    pub fn read_tasks(&self, team: &str) -> Result<Vec<TaskItem>, StoreError> {
        self.read_config(team)?;
        read_json_or_default(&self.tasks_path(team))
    }

    /// Lock-free read of one mailbox; missing mailboxes are empty.
    pub fn read_inbox(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, StoreError> {
        validate_segment(agent)?;
        self.read_config(team)?;
        read_json_or_default(&self.inbox_path(team, agent))
    }

    /// Lock-free read of the health records; a missing file is an empty map.
    pub fn read_health(&self, team: &str) -> Result<HealthRecords, StoreError> {
        validate_segment(team)?;
        read_json_or_default(&self.health_path(team))
    }

    /// Add a member to the roster, rejecting duplicate names.
    pub fn add_member(&self, team: &str, member: TeamMember) -> Result<(), StoreError> {
        let guard = self.lock_team(team)?;
        let mut config = guard.config()?;
        if config.member(&member.name).is_some() {
            return Err(StoreError::DuplicateMember {
                team: team.to_string(),
                name: member.name,
            });
        }
        debug!("Adding member '{}' to team '{team}'", member.name);
        config.members.push(member);
        guard.save_config(&config)
    }

    /// Remove a member, returning the removed entry. Absent members are not an error.
    pub fn remove_member(&self, team: &str, name: &str) -> Result<Option<TeamMember>, StoreError> {
        let guard = self.lock_team(team)?;
        let mut config = guard.config()?;
        let Some(index) = config.members.iter().position(|m| m.name == name) else {
            return Ok(None);
        };
        let removed = config.members.remove(index);
        guard.save_config(&config)?;
        debug!("Removed member '{name}' from team '{team}'");
        Ok(Some(removed))
    }

    /// Patch a single member in place.
    pub fn update_member<F>(&self, team: &str, name: &str, patch: F) -> Result<TeamMember, StoreError>
    where
        F: FnOnce(&mut TeamMember),
    {
        let guard = self.lock_team(team)?;
        let mut config = guard.config()?;
        let member = config
            .member_mut(name)
            .ok_or_else(|| StoreError::MemberNotFound {
                team: team.to_string(),
                name: name.to_string(),
            })?;
        patch(member);
        let updated = member.clone();
        guard.save_config(&config)?;
        Ok(updated)
    }
}

/// Exclusive access to one team's documents; the lock is released on drop.
pub struct TeamGuard<'a> {
    store: &'a TeamStore,
    team: String,
    _lock: FileLock,
}

impl TeamGuard<'_> {
    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn config(&self) -> Result<TeamConfig, StoreError> {
        self.store.read_config(&self.team)
    }

    pub fn save_config(&self, config: &TeamConfig) -> Result<(), StoreError> {
        write_json_atomic(&self.store.config_path(&self.team), config)
    }

    pub fn tasks(&self) -> Result<Vec<TaskItem>, StoreError> {
        read_json_or_default(&self.store.tasks_path(&self.team))
    }

    pub fn save_tasks(&self, tasks: &[TaskItem]) -> Result<(), StoreError> {
        write_json_atomic(&self.store.tasks_path(&self.team), tasks)
    }

    pub fn save_health(&self, records: &HealthRecords) -> Result<(), StoreError> {
        write_json_atomic(&self.store.health_path(&self.team), records)
    }

    /// Append messages to a mailbox, preserving existing entries and order.
    pub fn append_messages(&self, agent: &str, messages: &[InboxMessage]) -> Result<usize, StoreError> {
        validate_segment(agent)?;
        let path = self.store.inbox_path(&self.team, agent);
        let mut inbox: Vec<InboxMessage> = read_json_or_default(&path)?;
        inbox.extend_from_slice(messages);
        write_json_atomic(&path, &inbox)?;
        Ok(inbox.len())
    }
}

/// Team and agent names become path segments.
pub(crate) fn validate_segment(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BackendKind, MessageKind};
    use tempfile::TempDir;

    fn store() -> (TempDir, TeamStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = TeamStore::new(temp_dir.path().join("teams"));
        (temp_dir, store)
    }

    #[test]
    fn test_create_team_layout() {
        let (_tmp, store) = store();
        let config = store.create_team("t1", Some("demo".to_string())).unwrap();
        assert_eq!(config.lead_agent_id, "team-lead@t1");
        assert!(store.config_path("t1").is_file());
        assert!(store.inboxes_dir("t1").is_dir());
        assert_eq!(store.list_teams().unwrap(), vec!["t1"]);
    }

    #[test]
    fn test_create_team_twice_fails() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        let err = store.create_team("t1", None).unwrap_err();
        assert!(matches!(err, StoreError::TeamExists { .. }));
    }

    #[test]
    fn test_invalid_team_name() {
        let (_tmp, store) = store();
        for bad in ["", "..", "a/b", "a b"] {
            assert!(matches!(
                store.create_team(bad, None),
                Err(StoreError::InvalidName { .. })
            ));
        }
    }

    #[test]
    fn test_missing_team_reads() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.read_config("nope"),
            Err(StoreError::TeamNotFound { .. })
        ));
        assert!(matches!(
            store.lock_team("nope"),
            Err(StoreError::TeamNotFound { .. })
        ));
        assert!(store.read_health("nope").unwrap().is_empty());
    }

    #[test]
    fn test_member_add_update_remove() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        store
            .add_member("t1", TeamMember::new("t1", "alice", BackendKind::Tmux))
            .unwrap();

        let dup = store.add_member("t1", TeamMember::new("t1", "alice", BackendKind::Tmux));
        assert!(matches!(dup, Err(StoreError::DuplicateMember { .. })));

        let updated = store
            .update_member("t1", "alice", |m| m.color = "blue".to_string())
            .unwrap();
        assert_eq!(updated.color, "blue");
        assert_eq!(store.read_config("t1").unwrap().members[0].color, "blue");

        let removed = store.remove_member("t1", "alice").unwrap();
        assert_eq!(removed.unwrap().name, "alice");
        assert!(store.remove_member("t1", "alice").unwrap().is_none());
        assert!(store.read_config("t1").unwrap().members.is_empty());
    }

    #[test]
    fn test_update_missing_member() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        let err = store.update_member("t1", "ghost", |_| {}).unwrap_err();
        assert!(matches!(err, StoreError::MemberNotFound { .. }));
    }

    #[test]
    fn test_append_preserves_order() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        {
            let guard = store.lock_team("t1").unwrap();
            let first = InboxMessage::new(MessageKind::Plain, "team-lead@t1", "one", None);
            let second = InboxMessage::new(MessageKind::Plain, "team-lead@t1", "two", None);
            assert_eq!(guard.append_messages("bob", &[first]).unwrap(), 1);
            assert_eq!(guard.append_messages("bob", &[second]).unwrap(), 2);
        }
        let inbox = store.read_inbox("t1", "bob").unwrap();
        let texts: Vec<_> = inbox.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(store.read_inbox("t1", "nobody").unwrap().is_empty());
    }

    #[test]
    fn test_lock_contention_surfaces_timeout() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        let impatient = store.clone().with_lock_timeout(Duration::from_millis(100));

        let _held = store.lock_team("t1").unwrap();
        let err = impatient
            .add_member("t1", TeamMember::new("t1", "bob", BackendKind::Tmux))
            .unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
    }

    #[test]
    fn test_teams_do_not_contend() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        store.create_team("t2", None).unwrap();
        let impatient = store.clone().with_lock_timeout(Duration::from_millis(50));

        let _held = store.lock_team("t1").unwrap();
        impatient
            .add_member("t2", TeamMember::new("t2", "bob", BackendKind::Tmux))
            .unwrap();
    }

    #[test]
    fn test_delete_team_requires_empty_roster() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        store
            .add_member("t1", TeamMember::new("t1", "alice", BackendKind::Tmux))
            .unwrap();
        assert!(matches!(
            store.delete_team("t1"),
            Err(StoreError::TeamNotEmpty { members: 1, .. })
        ));

        store.remove_member("t1", "alice").unwrap();
        store.delete_team("t1").unwrap();
        assert!(!store.team_dir("t1").exists());
    }

    #[tokio::test]
    async fn test_run_blocking_lock_wait_leaves_runtime_free() {
        let (_tmp, store) = store();
        store.create_team("t1", None).unwrap();
        let held = store.lock_team("t1").unwrap();

        let waiter = tokio::spawn({
            let store = store.clone();
            async move {
                store
                    .run_blocking(|store| {
                        store.add_member("t1", TeamMember::new("t1", "bob", BackendKind::Tmux))
                    })
                    .await
            }
        });
        // Single-threaded runtime: this sleep only completes if the waiter
        // is not sleeping on the runtime thread.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
        assert!(store.read_config("t1").unwrap().member("bob").is_some());
    }
}
