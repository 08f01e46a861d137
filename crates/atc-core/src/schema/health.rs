//! Persisted health sampling state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last observed content fingerprint for one agent.
///
/// This is the whole persisted health state; classifications are always
/// recomputed from it plus fresh probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Fingerprint of the most recent distinct terminal content
    pub hash: String,
    /// Unix seconds when `hash` last changed
    pub last_change_time: f64,
}

/// Per-team map of agent name to record, stored in `health.json`.
pub type HealthRecords = BTreeMap<String, HealthRecord>;
