// Probe and command outcomes

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Exit code reported when no process exit status exists (spawn failure, timeout, signal).
pub const NO_EXIT_CODE: i32 = -1;

/// sshpass: "invalid/incorrect password".
const SSHPASS_BAD_PASSWORD: i32 = 5;
/// ssh: connection-level failure (refused, no route, handshake).
const SSH_CONNECTION_FAILED: i32 = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub host: String,
    pub port: u16,
    pub reachable: bool,
    pub elapsed_ms: u64,
}

/// Outcome of one command. Failures are carried in the fields, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self {
            exit_code: NO_EXIT_CODE,
            stdout: String::new(),
            stderr: format!("command timed out after {timeout_ms} ms"),
            timed_out: true,
        }
    }

    pub fn spawn_failed(program: &str, err: impl std::fmt::Display) -> Self {
        Self {
            exit_code: NO_EXIT_CODE,
            stdout: String::new(),
            stderr: format!("failed to spawn {program}: {err}"),
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// `None` on success; otherwise the error taxonomy bucket for this outcome.
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        if self.success() {
            return None;
        }
        if self.timed_out {
            return Some(ErrorKind::Timeout);
        }
        if self.exit_code == NO_EXIT_CODE {
            return Some(ErrorKind::Unknown);
        }
        if self.exit_code == SSHPASS_BAD_PASSWORD || self.stderr.contains("Permission denied") {
            return Some(ErrorKind::AuthFailure);
        }
        if self.exit_code == SSH_CONNECTION_FAILED {
            return Some(ErrorKind::Unreachable);
        }
        Some(ErrorKind::ExecutionFailure)
    }

    /// stderr if present, else stdout; trimmed. For log lines and error details.
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}
