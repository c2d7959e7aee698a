// Action requests and acknowledgements

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    ToggleService,
    /// Re-aggregate now; no system state changes.
    Refresh,
    Reboot,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub kind: ActionKind,
    /// Service display name or unit; only used by `ToggleService`.
    #[serde(default)]
    pub target: Option<String>,
}

impl ActionRequest {
    pub fn toggle(service: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::ToggleService,
            target: Some(service.into()),
        }
    }

    pub fn refresh() -> Self {
        Self {
            kind: ActionKind::Refresh,
            target: None,
        }
    }

    pub fn reboot() -> Self {
        Self {
            kind: ActionKind::Reboot,
            target: None,
        }
    }

    pub fn shutdown() -> Self {
        Self {
            kind: ActionKind::Shutdown,
            target: None,
        }
    }
}

/// Returned as soon as the underlying action was issued; says nothing about its eventual effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub kind: ActionKind,
    pub target: Option<String>,
    /// "start", "stop", "refresh", "reboot" or "shutdown".
    pub action: String,
    pub refresh_scheduled: bool,
}
