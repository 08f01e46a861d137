//! Shared task collection
//!
//! Tasks are created once and only mutated afterwards. Statuses are free-form
//! strings. Changing a task's owner appends exactly one task-assignment
//! message to the new owner's mailbox while the team lock is still held.

use crate::io::StoreError;
use crate::messaging::{short_name, task_assignment_message};
use crate::schema::{DEFAULT_TASK_STATUS, TaskItem};
use crate::store::{TeamGuard, TeamStore, validate_segment};
use crate::LEAD_NAME;
use std::collections::HashMap;
use tracing::{debug, info};

/// Partial update applied by [`update_task`].
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<String>,
    pub owner: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

/// Create a task with status "open" and no owner.
pub fn create_task(
    store: &TeamStore,
    team: &str,
    subject: &str,
    description: &str,
) -> Result<TaskItem, StoreError> {
    let guard = store.lock_team(team)?;
    let mut tasks = guard.tasks()?;

    let next_id = tasks.iter().map(TaskItem::numeric_id).max().unwrap_or(0) + 1;
    let now = now_rfc3339();
    let task = TaskItem {
        id: next_id.to_string(),
        subject: subject.to_string(),
        description: description.to_string(),
        status: DEFAULT_TASK_STATUS.to_string(),
        owner: None,
        created_at: now.clone(),
        updated_at: now,
        unknown_fields: HashMap::new(),
    };
    tasks.push(task.clone());
    guard.save_tasks(&tasks)?;
    info!("Created task #{} in team '{team}': {subject}", task.id);
    Ok(task)
}

/// All tasks in id order.
pub fn list_tasks(store: &TeamStore, team: &str) -> Result<Vec<TaskItem>, StoreError> {
    let mut tasks = store.read_tasks(team)?;
    tasks.sort_by_key(TaskItem::numeric_id);
    Ok(tasks)
}

pub fn get_task(store: &TeamStore, team: &str, task_id: &str) -> Result<TaskItem, StoreError> {
    store
        .read_tasks(team)?
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| StoreError::TaskNotFound {
            team: team.to_string(),
            task_id: task_id.to_string(),
        })
}

/// Apply `patch` to a task. Returns the updated task.
///
/// An owner given as `name@team` is stored as the short name and must be the
/// lead or a roster member. Assigning the current owner again is not a change
/// and sends nothing. Nothing is written when the patch is rejected.
pub fn update_task(
    store: &TeamStore,
    team: &str,
    task_id: &str,
    patch: TaskPatch,
) -> Result<TaskItem, StoreError> {
    let guard = store.lock_team(team)?;
    let owner = patch
        .owner
        .as_deref()
        .map(|owner| checked_owner(&guard, owner))
        .transpose()?;
    let mut tasks = guard.tasks()?;
    let task = tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| StoreError::TaskNotFound {
            team: team.to_string(),
            task_id: task_id.to_string(),
        })?;

    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(subject) = patch.subject {
        task.subject = subject;
    }
    if let Some(description) = patch.description {
        task.description = description;
    }

    let mut new_owner = None;
    if let Some(owner) = owner {
        if task.owner.as_deref() != Some(owner.as_str()) {
            task.owner = Some(owner.clone());
            new_owner = Some(owner);
        }
    }
    task.updated_at = now_rfc3339();
    let updated = task.clone();
    guard.save_tasks(&tasks)?;

    if let Some(owner) = new_owner {
        let message = task_assignment_message(team, &updated);
        guard.append_messages(&owner, std::slice::from_ref(&message))?;
        info!("Assigned task #{} to '{owner}' in team '{team}'", updated.id);
    } else {
        debug!("Updated task #{} in team '{team}'", updated.id);
    }
    Ok(updated)
}

fn checked_owner(guard: &TeamGuard<'_>, owner: &str) -> Result<String, StoreError> {
    let name = short_name(owner, guard.team());
    validate_segment(name)?;
    if name != LEAD_NAME && guard.config()?.member(name).is_none() {
        return Err(StoreError::MemberNotFound {
            team: guard.team().to_string(),
            name: name.to_string(),
        });
    }
    Ok(name.to_string())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
