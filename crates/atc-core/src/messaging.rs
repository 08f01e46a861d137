//! Append-only team mailboxes
//!
//! Every send appends one [`InboxMessage`] to each target mailbox under the
//! team lock. Reads are non-consuming: `read_inbox` always returns the full
//! history, and `poll_inbox` returns entries past a cursor.
//!
//! Plain and broadcast messages are relayed, so their recorded sender is the
//! lead identity. Shutdown and plan-approval responses keep the sender the
//! caller names.

use crate::io::StoreError;
use crate::schema::{InboxMessage, MessageKind, TaskItem};
use crate::store::TeamStore;
use crate::{LEAD_NAME, lead_identity};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum characters kept when deriving a summary from the body
pub const SUMMARY_CHARS: usize = 60;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message type '{kind}' requires a recipient")]
    MissingRecipient { kind: MessageKind },

    #[error("Recipient '{name}' is not a member of team '{team}'")]
    UnknownRecipient { team: String, name: String },

    #[error("Message type '{kind}' requires field '{field}'")]
    MissingField { kind: MessageKind, field: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A message to be delivered.
#[derive(Debug, Clone, Default)]
pub struct Outgoing {
    pub kind: MessageKind,
    /// Recipient name or `name@team`; ignored for broadcasts
    pub recipient: Option<String>,
    pub content: String,
    pub summary: Option<String>,
    /// Caller identity; recorded only for types that honor it
    pub sender: Option<String>,
}

impl Outgoing {
    pub fn plain(recipient: &str, content: &str) -> Self {
        Self {
            kind: MessageKind::Plain,
            recipient: Some(recipient.to_string()),
            content: content.to_string(),
            ..Self::default()
        }
    }

    pub fn broadcast(content: &str) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            content: content.to_string(),
            ..Self::default()
        }
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }
}

/// Result of a send: the mailboxes written and the stored message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipients: Vec<String>,
    pub message: InboxMessage,
}

/// Deliver `outgoing` to its recipient, or to every roster member for broadcasts.
pub fn send(store: &TeamStore, team: &str, outgoing: &Outgoing) -> Result<Delivery, MessageError> {
    let guard = store.lock_team(team)?;
    let config = guard.config()?;

    let sender_name = outgoing.sender.as_deref().map(|s| short_name(s, team));
    let recipients: Vec<String> = if outgoing.kind == MessageKind::Broadcast {
        config
            .members
            .iter()
            .map(|m| m.name.clone())
            .filter(|name| Some(name.as_str()) != sender_name)
            .collect()
    } else {
        let raw = outgoing
            .recipient
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or(MessageError::MissingRecipient {
                kind: outgoing.kind,
            })?;
        let name = short_name(raw, team);
        if name != LEAD_NAME && config.member(name).is_none() {
            return Err(MessageError::UnknownRecipient {
                team: team.to_string(),
                name: name.to_string(),
            });
        }
        vec![name.to_string()]
    };

    let from = match (outgoing.kind.honors_sender(), outgoing.sender.as_deref()) {
        (true, Some(sender)) => full_identity(sender, team),
        _ => lead_identity(team),
    };
    let summary = outgoing
        .summary
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| summarize(&outgoing.content));
    let message = InboxMessage::new(outgoing.kind, &from, &outgoing.content, Some(summary));

    for recipient in &recipients {
        guard.append_messages(recipient, std::slice::from_ref(&message))?;
    }
    debug!(
        "Delivered {} message from {from} to {} mailbox(es) in team '{team}'",
        outgoing.kind,
        recipients.len()
    );

    Ok(Delivery {
        recipients,
        message,
    })
}

/// Full mailbox for `agent`, oldest first.
pub fn read_inbox(
    store: &TeamStore,
    team: &str,
    agent: &str,
) -> Result<Vec<InboxMessage>, MessageError> {
    Ok(store.read_inbox(team, short_name(agent, team))?)
}

/// Wait up to `timeout` for messages beyond `since`.
///
/// `since` is the number of messages the caller has already seen; when
/// `None`, the mailbox length at call time is used. Returns immediately if
/// the mailbox already holds more than `since` entries, otherwise blocks on a
/// filesystem watcher (or polls when no watcher can be installed) and returns
/// an empty list on timeout.
pub fn poll_inbox(
    store: &TeamStore,
    team: &str,
    agent: &str,
    since: Option<usize>,
    timeout: Duration,
) -> Result<Vec<InboxMessage>, MessageError> {
    let agent = short_name(agent, team);
    let current = store.read_inbox(team, agent)?;
    let cursor = since.unwrap_or(current.len());
    if current.len() > cursor {
        return Ok(current[cursor..].to_vec());
    }

    match watch_for_new(store, team, agent, cursor, timeout) {
        Ok(found) => Ok(found),
        Err(WatchFailure::Store(e)) => Err(e.into()),
        Err(WatchFailure::Notify(e)) => {
            warn!("Inbox watcher unavailable ({e}), falling back to polling");
            polling_wait(store, team, agent, cursor, timeout)
        }
    }
}

enum WatchFailure {
    Notify(notify::Error),
    Store(StoreError),
}

fn watch_for_new(
    store: &TeamStore,
    team: &str,
    agent: &str,
    cursor: usize,
    timeout: Duration,
) -> Result<Vec<InboxMessage>, WatchFailure> {
    let inbox_dir = store.inboxes_dir(team);
    std::fs::create_dir_all(&inbox_dir)
        .map_err(|e| WatchFailure::Store(StoreError::Io {
            path: inbox_dir.clone(),
            source: e,
        }))?;

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if res.is_ok() {
                let _ = tx.send(());
            }
        },
        NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
    )
    .map_err(WatchFailure::Notify)?;
    watcher
        .watch(&inbox_dir, RecursiveMode::NonRecursive)
        .map_err(WatchFailure::Notify)?;

    let start = Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(Vec::new());
        }
        // Re-check at least every poll interval in case an event is coalesced away.
        let wait = (timeout - elapsed).min(POLL_INTERVAL);
        match rx.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(WatchFailure::Notify(notify::Error::generic(
                    "inbox watcher disconnected",
                )));
            }
        }
        let inbox = store.read_inbox(team, agent).map_err(WatchFailure::Store)?;
        if inbox.len() > cursor {
            return Ok(inbox[cursor..].to_vec());
        }
    }
}

fn polling_wait(
    store: &TeamStore,
    team: &str,
    agent: &str,
    cursor: usize,
    timeout: Duration,
) -> Result<Vec<InboxMessage>, MessageError> {
    let start = Instant::now();
    loop {
        let inbox = store.read_inbox(team, agent)?;
        if inbox.len() > cursor {
            return Ok(inbox[cursor..].to_vec());
        }
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Ok(Vec::new());
        }
        std::thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

/// Ask `recipient` to shut down. Returns the generated request id.
pub fn send_shutdown_request(
    store: &TeamStore,
    team: &str,
    recipient: &str,
    reason: Option<&str>,
) -> Result<String, MessageError> {
    let request_id = format!("shutdown-{}", uuid::Uuid::new_v4());
    let payload = json!({
        "type": MessageKind::ShutdownRequest.as_str(),
        "requestId": request_id,
        "from": lead_identity(team),
        "reason": reason.unwrap_or_default(),
        "timestamp": now_rfc3339(),
    });
    let outgoing = Outgoing {
        kind: MessageKind::ShutdownRequest,
        recipient: Some(recipient.to_string()),
        content: payload.to_string(),
        summary: Some(format!("Shutdown requested for {}", short_name(recipient, team))),
        sender: None,
    };
    send(store, team, &outgoing)?;
    Ok(request_id)
}

/// A worker's answer to a shutdown request, delivered to the lead.
pub fn send_shutdown_response(
    store: &TeamStore,
    team: &str,
    sender: &str,
    request_id: &str,
    approve: bool,
    reason: Option<&str>,
) -> Result<Delivery, MessageError> {
    if request_id.trim().is_empty() {
        return Err(MessageError::MissingField {
            kind: MessageKind::ShutdownResponse,
            field: "request_id",
        });
    }
    let payload = json!({
        "type": MessageKind::ShutdownResponse.as_str(),
        "requestId": request_id,
        "from": full_identity(sender, team),
        "approve": approve,
        "reason": reason.unwrap_or_default(),
        "timestamp": now_rfc3339(),
    });
    let verdict = if approve { "approved" } else { "rejected" };
    let outgoing = Outgoing {
        kind: MessageKind::ShutdownResponse,
        recipient: Some(LEAD_NAME.to_string()),
        content: payload.to_string(),
        summary: Some(format!("Shutdown {verdict} by {}", short_name(sender, team))),
        sender: Some(sender.to_string()),
    };
    send(store, team, &outgoing)
}

/// Approve or reject a plan submitted by `recipient`.
pub fn send_plan_approval_response(
    store: &TeamStore,
    team: &str,
    sender: &str,
    recipient: &str,
    request_id: &str,
    approve: bool,
    content: Option<&str>,
) -> Result<Delivery, MessageError> {
    if request_id.trim().is_empty() {
        return Err(MessageError::MissingField {
            kind: MessageKind::PlanApprovalResponse,
            field: "request_id",
        });
    }
    let payload = json!({
        "type": MessageKind::PlanApprovalResponse.as_str(),
        "requestId": request_id,
        "from": full_identity(sender, team),
        "approve": approve,
        "content": content.unwrap_or_default(),
        "timestamp": now_rfc3339(),
    });
    let verdict = if approve { "approved" } else { "rejected" };
    let outgoing = Outgoing {
        kind: MessageKind::PlanApprovalResponse,
        recipient: Some(recipient.to_string()),
        content: payload.to_string(),
        summary: Some(format!("Plan {verdict}")),
        sender: Some(sender.to_string()),
    };
    send(store, team, &outgoing)
}

/// Build the notification appended to a new task owner's mailbox.
pub fn task_assignment_message(team: &str, task: &TaskItem) -> InboxMessage {
    let assigned_by = lead_identity(team);
    let payload = json!({
        "type": MessageKind::TaskAssignment.as_str(),
        "taskId": task.id,
        "subject": task.subject,
        "description": task.description,
        "assignedBy": assigned_by,
        "timestamp": now_rfc3339(),
    });
    InboxMessage::new(
        MessageKind::TaskAssignment,
        &assigned_by,
        &payload.to_string(),
        Some(format!("Task #{} assigned: {}", task.id, summarize(&task.subject))),
    )
}

/// First [`SUMMARY_CHARS`] characters of `content`.
pub fn summarize(content: &str) -> String {
    content.chars().take(SUMMARY_CHARS).collect()
}

/// `alice@t1` -> `alice` when the suffix matches `team`.
pub fn short_name<'a>(identity: &'a str, team: &str) -> &'a str {
    match identity.split_once('@') {
        Some((name, suffix)) if suffix == team => name,
        _ => identity,
    }
}

fn full_identity(name: &str, team: &str) -> String {
    if name.contains('@') {
        name.to_string()
    } else {
        format!("{name}@{team}")
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
