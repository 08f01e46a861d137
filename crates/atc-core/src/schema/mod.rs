//! Persisted document schemas
//!
//! All types preserve unknown JSON fields so read-modify-write cycles never
//! drop data written by other tools.

pub mod health;
pub mod inbox_message;
pub mod member;
pub mod task;
pub mod team_config;

pub use health::{HealthRecord, HealthRecords};
pub use inbox_message::{InboxMessage, MessageKind};
pub use member::{BackendHandle, BackendKind, TeamMember};
pub use task::{DEFAULT_TASK_STATUS, TaskItem};
pub use team_config::TeamConfig;
