//! Team member schema and backend identity

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Backend a worker runs on.
///
/// Serialised as `"tmux"`, `"desktop"` or `"windows_terminal"`.
///
/// ```rust
/// use agent_team_coord_core::schema::BackendKind;
/// use std::str::FromStr;
///
/// assert_eq!(BackendKind::from_str("desktop").unwrap(), BackendKind::Desktop);
/// assert!(BackendKind::from_str("screen").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A pane in the current tmux session.
    #[default]
    Tmux,
    /// A detached headless process with no terminal to sample.
    Desktop,
    /// A PowerShell console launched from an encoded script.
    WindowsTerminal,
}

impl BackendKind {
    /// Whether the worker has terminal output that can be fingerprinted.
    pub fn has_terminal(self) -> bool {
        !matches!(self, BackendKind::Desktop)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Tmux => write!(f, "tmux"),
            BackendKind::Desktop => write!(f, "desktop"),
            BackendKind::WindowsTerminal => write!(f, "windows_terminal"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tmux" => Ok(BackendKind::Tmux),
            "desktop" => Ok(BackendKind::Desktop),
            "windows_terminal" => Ok(BackendKind::WindowsTerminal),
            other => Err(format!(
                "Unknown backend '{other}'. Valid values: tmux, desktop, windows_terminal"
            )),
        }
    }
}

/// Handle to a running worker: a tmux pane id or an OS process id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendHandle {
    Pane(String),
    Process(u32),
}

impl fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendHandle::Pane(id) => write!(f, "pane {id}"),
            BackendHandle::Process(pid) => write!(f, "pid {pid}"),
        }
    }
}

/// Worker entry in the team roster
///
/// Stored in the `members` array of `<teams_root>/<team>/config.json`.
/// The backend handle is kept in exactly one of `tmuxPaneId` / `processId`;
/// use [`TeamMember::handle`] and [`TeamMember::set_handle`] to access it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    /// Full agent identity (format: "name@team")
    pub agent_id: String,

    /// Short display name, unique within the team
    pub name: String,

    /// Role/type label (e.g. "general-purpose")
    pub agent_type: String,

    /// Resolved model identifier
    pub model: String,

    /// Initial prompt delivered at spawn
    #[serde(default)]
    pub prompt: String,

    /// Display color from the round-robin palette
    pub color: String,

    #[serde(default)]
    pub plan_mode_required: bool,

    /// Unix timestamp in milliseconds when the member joined
    pub joined_at: u64,

    /// Working directory of the worker
    pub cwd: String,

    pub backend_type: BackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tmux_pane_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    process_id: Option<u32>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl TeamMember {
    /// New roster entry with no backend handle yet.
    pub fn new(team: &str, name: &str, backend_type: BackendKind) -> Self {
        Self {
            agent_id: format!("{name}@{team}"),
            name: name.to_string(),
            agent_type: "general-purpose".to_string(),
            model: String::new(),
            prompt: String::new(),
            color: String::new(),
            plan_mode_required: false,
            joined_at: chrono::Utc::now().timestamp_millis().max(0) as u64,
            cwd: String::new(),
            backend_type,
            tmux_pane_id: None,
            process_id: None,
            unknown_fields: HashMap::new(),
        }
    }

    /// The stored backend handle, if the member has been launched.
    ///
    /// A pane id wins if a hand-edited document carries both.
    pub fn handle(&self) -> Option<BackendHandle> {
        if let Some(pane) = self.tmux_pane_id.as_deref().filter(|p| !p.is_empty()) {
            return Some(BackendHandle::Pane(pane.to_string()));
        }
        self.process_id.map(BackendHandle::Process)
    }

    /// Store a backend handle, clearing the other kind.
    pub fn set_handle(&mut self, handle: BackendHandle) {
        match handle {
            BackendHandle::Pane(id) => {
                self.tmux_pane_id = Some(id);
                self.process_id = None;
            }
            BackendHandle::Process(pid) => {
                self.process_id = Some(pid);
                self.tmux_pane_id = None;
            }
        }
    }

    /// Seconds since the member joined, relative to `now_secs`.
    pub fn seconds_since_join(&self, now_secs: f64) -> f64 {
        (now_secs - self.joined_at as f64 / 1000.0).max(0.0)
    }
}
