//! Core types and state management for agent-team-coord (atc)
//!
//! A team of worker agents coordinates through a single directory per team:
//! a roster, a task collection, one mailbox per agent and a small health
//! record store. Every mutation goes through a team-scoped exclusive lock and
//! rewrites the affected document atomically; reads never lock.
//!
//! On top of the store this crate provides:
//! - [`messaging`]: append-only mailboxes with direct send, broadcast and long-poll
//! - [`tasks`]: shared task collection with owner-change notifications
//! - [`health`]: liveness classification from external probes
//! - [`spawn`]: worker spawning and teardown across tmux, headless and scripted terminals
//! - [`config`]: layered TOML configuration for the coordinator binary

pub mod config;
pub mod health;
pub mod home;
pub mod io;
pub mod logging;
pub mod messaging;
pub mod schema;
pub mod spawn;
pub mod store;
pub mod tasks;

pub use schema::{
    BackendHandle, BackendKind, HealthRecord, InboxMessage, MessageKind, TaskItem, TeamConfig,
    TeamMember,
};
pub use store::TeamStore;

/// Reserved name of the team lead. Never a valid worker name.
pub const LEAD_NAME: &str = "team-lead";

/// Identity string for the lead of `team`.
pub fn lead_identity(team: &str) -> String {
    format!("{LEAD_NAME}@{team}")
}

