//! Worker liveness classification
//!
//! Status is never stored. Every poll combines a fresh liveness probe and
//! content fingerprint with the persisted [`HealthRecord`] (last fingerprint
//! and when it last changed) and derives one of alive, dead, hung or unknown.
//!
//! Headless workers have no terminal, so they are only ever alive or dead.

use crate::io::StoreError;
use crate::schema::{
    BackendHandle, BackendKind, HealthRecord, HealthRecords, TeamConfig, TeamMember,
};
use crate::spawn::backend::backend_for;
use crate::spawn::runner::CommandRunner;
use crate::store::TeamStore;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_HUNG_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Alive,
    Dead,
    Hung,
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Alive => "alive",
            HealthStatus::Dead => "dead",
            HealthStatus::Hung => "hung",
            HealthStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    /// Unchanged output right after joining is not suspicious
    pub grace_period: Duration,
    /// Unchanged output for this long means hung
    pub hung_timeout: Duration,
    /// Outer bound on each probe
    pub probe_timeout: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            hung_timeout: DEFAULT_HUNG_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Fresh probe results for one worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evidence {
    pub alive: bool,
    /// Fingerprint of the latest output; `None` when capture failed or the backend has none
    pub fingerprint: Option<String>,
}

/// Outcome of [`classify`]: the status, a human-readable reason, and the
/// record to persist when it changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: HealthStatus,
    pub detail: String,
    pub updated_record: Option<HealthRecord>,
}

impl Classification {
    fn new(status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            updated_record: None,
        }
    }

    fn recording(mut self, hash: &str, now_secs: f64) -> Self {
        self.updated_record = Some(HealthRecord {
            hash: hash.to_string(),
            last_change_time: now_secs,
        });
        self
    }
}

/// Pure classification of one worker.
///
/// `since_join_secs` is the member's age; `now_secs` is the current Unix time
/// in seconds, used for the hung timeout and for new records.
pub fn classify(
    kind: BackendKind,
    evidence: &Evidence,
    previous: Option<&HealthRecord>,
    since_join_secs: f64,
    now_secs: f64,
    thresholds: &HealthThresholds,
) -> Classification {
    if !kind.has_terminal() {
        return if evidence.alive {
            Classification::new(HealthStatus::Alive, "Process is running")
        } else {
            Classification::new(HealthStatus::Dead, "Process is no longer running")
        };
    }

    if !evidence.alive {
        return Classification::new(HealthStatus::Dead, "Terminal is gone");
    }

    let Some(current) = evidence.fingerprint.as_deref() else {
        return Classification::new(HealthStatus::Unknown, "Could not capture terminal output");
    };

    let Some(previous) = previous else {
        return Classification::new(HealthStatus::Unknown, "First sample recorded")
            .recording(current, now_secs);
    };

    if previous.hash != current {
        return Classification::new(HealthStatus::Alive, "Output changed since last check")
            .recording(current, now_secs);
    }

    let grace = thresholds.grace_period.as_secs_f64();
    if since_join_secs < grace {
        return Classification::new(
            HealthStatus::Alive,
            format!("Within grace period ({since_join_secs:.0}s of {grace:.0}s since join)"),
        );
    }

    let unchanged_for = (now_secs - previous.last_change_time).max(0.0);
    let hung_after = thresholds.hung_timeout.as_secs_f64();
    if unchanged_for < hung_after {
        Classification::new(
            HealthStatus::Alive,
            format!("Output unchanged for {unchanged_for:.0}s (hung after {hung_after:.0}s)"),
        )
    } else {
        Classification::new(
            HealthStatus::Hung,
            format!("Output unchanged for {unchanged_for:.0}s"),
        )
    }
}

/// Health of one member as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub agent_name: String,
    pub status: HealthStatus,
    pub backend_type: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    pub last_content_hash: Option<String>,
    pub detail: String,
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Run both probes for `member`, bounded by the probe timeout.
async fn gather_evidence(
    store: &TeamStore,
    runner: &dyn CommandRunner,
    team: &str,
    member: &TeamMember,
    timeout: Duration,
) -> Evidence {
    let Some(handle) = member.handle() else {
        return Evidence::default();
    };
    let backend = backend_for(member.backend_type);

    let alive = tokio::time::timeout(timeout, backend.probe_alive(runner, &handle))
        .await
        .unwrap_or_else(|_| {
            debug!("Liveness probe for '{}' timed out", member.name);
            false
        });
    if !alive || !member.backend_type.has_terminal() {
        return Evidence {
            alive,
            fingerprint: None,
        };
    }

    let transcript = store.transcript_path(team, &member.name);
    let fingerprint = tokio::time::timeout(
        timeout,
        backend.probe_content(runner, &handle, Some(&transcript)),
    )
    .await
    .unwrap_or(None);
    Evidence { alive, fingerprint }
}

async fn assess(
    store: &TeamStore,
    runner: &dyn CommandRunner,
    team: &str,
    member: &TeamMember,
    records: &HealthRecords,
    thresholds: &HealthThresholds,
) -> (HealthReport, Option<HealthRecord>) {
    let evidence = gather_evidence(store, runner, team, member, thresholds.probe_timeout).await;
    let now = now_secs();
    let mut outcome = classify(
        member.backend_type,
        &evidence,
        records.get(&member.name),
        member.seconds_since_join(now),
        now,
        thresholds,
    );
    let handle = member.handle();
    if handle.is_none() {
        outcome.detail = "No backend handle recorded".to_string();
    }

    let report = HealthReport {
        agent_name: member.name.clone(),
        status: outcome.status,
        backend_type: member.backend_type,
        pane_id: match &handle {
            Some(BackendHandle::Pane(id)) => Some(id.clone()),
            _ => None,
        },
        process_id: match handle {
            Some(BackendHandle::Process(pid)) => Some(pid),
            _ => None,
        },
        last_content_hash: evidence.fingerprint,
        detail: outcome.detail,
    };
    (report, outcome.updated_record)
}

/// Roster and stored records, read off the async workers.
async fn load(store: &TeamStore, team: &str) -> Result<(TeamConfig, HealthRecords), StoreError> {
    let team = team.to_string();
    store
        .run_blocking(move |store| -> Result<_, StoreError> {
            Ok((store.read_config(&team)?, store.read_health(&team)?))
        })
        .await
}

async fn persist(
    store: &TeamStore,
    team: &str,
    updates: Vec<(String, HealthRecord)>,
) -> Result<(), StoreError> {
    if updates.is_empty() {
        return Ok(());
    }
    let team = team.to_string();
    store
        .run_blocking(move |store| -> Result<(), StoreError> {
            let guard = store.lock_team(&team)?;
            let mut records = store.read_health(&team)?;
            records.extend(updates);
            guard.save_health(&records)
        })
        .await
}

/// Classify a single member and persist its updated record.
pub async fn check_agent_health(
    store: &TeamStore,
    runner: &dyn CommandRunner,
    team: &str,
    name: &str,
    thresholds: &HealthThresholds,
) -> Result<HealthReport, StoreError> {
    let (config, records) = load(store, team).await?;
    let member = config
        .member(name)
        .ok_or_else(|| StoreError::MemberNotFound {
            team: team.to_string(),
            name: name.to_string(),
        })?;
    let (report, update) = assess(store, runner, team, member, &records, thresholds).await;
    persist(store, team, update.map(|r| (name.to_string(), r)).into_iter().collect()).await?;
    debug!("Health of '{name}' in team '{team}': {}", report.status);
    Ok(report)
}

/// Classify every member. Records are loaded once and saved once.
pub async fn check_all_agents_health(
    store: &TeamStore,
    runner: &dyn CommandRunner,
    team: &str,
    thresholds: &HealthThresholds,
) -> Result<Vec<HealthReport>, StoreError> {
    let (config, records) = load(store, team).await?;

    let mut reports = Vec::with_capacity(config.members.len());
    let mut updates = Vec::new();
    for member in &config.members {
        let (report, update) = assess(store, runner, team, member, &records, thresholds).await;
        if report.status != HealthStatus::Alive {
            warn!(
                "Agent '{}' in team '{team}' is {}: {}",
                report.agent_name, report.status, report.detail
            );
        }
        if let Some(record) = update {
            updates.push((member.name.clone(), record));
        }
        reports.push(report);
    }
    persist(store, team, updates).await?;
    Ok(reports)
}

/// Drop an agent's health record. Absent records are not an error.
pub fn forget_agent(store: &TeamStore, team: &str, name: &str) -> Result<(), StoreError> {
    let guard = store.lock_team(team)?;
    let mut records = store.read_health(team)?;
    if records.remove(name).is_some() {
        guard.save_health(&records)?;
    }
    Ok(())
}
