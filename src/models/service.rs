// Service state models

use serde::{Deserialize, Serialize};

/// Service state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub display_name: String,
    /// systemd unit, or the process pattern for process-checked entries.
    pub unit_name: String,
    pub state: ServiceState,
    /// Milliseconds since the Unix epoch.
    pub last_checked: u64,
}
