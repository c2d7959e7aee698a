// Where service queries and actions run: this host, or a remote one over ssh

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use super::exec::{RemoteExecutor, RemoteTarget, run_with_timeout, spawn_detached};
use crate::models::CommandResult;

/// Runs an argv under a timeout. Implementations never raise; failures are in the result.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[&str], timeout: Duration) -> CommandResult;

    /// Starts the command without waiting for it. `Err` only if it could not be started.
    async fn launch(&self, argv: &[&str]) -> Result<(), String>;

    /// Short label for logs ("local", "pi@10.0.0.2").
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, argv: &[&str], timeout: Duration) -> CommandResult {
        let Some((program, args)) = argv.split_first() else {
            return CommandResult::spawn_failed("", "empty command");
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        run_with_timeout(cmd, program, timeout).await
    }

    async fn launch(&self, argv: &[&str]) -> Result<(), String> {
        let Some((program, args)) = argv.split_first() else {
            return Err("empty command".into());
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        spawn_detached(cmd).map_err(|e| format!("failed to spawn {program}: {e}"))
    }

    fn describe(&self) -> String {
        "local".into()
    }
}

/// Runs argvs on `target` through the remote executor.
#[derive(Debug, Clone)]
pub struct RemoteRunner {
    executor: RemoteExecutor,
    target: RemoteTarget,
}

impl RemoteRunner {
    pub fn new(target: RemoteTarget) -> Self {
        Self {
            executor: RemoteExecutor::new(),
            target,
        }
    }
}

#[async_trait]
impl CommandRunner for RemoteRunner {
    async fn run(&self, argv: &[&str], timeout: Duration) -> CommandResult {
        if argv.is_empty() {
            return CommandResult::spawn_failed("", "empty command");
        }
        self.executor
            .execute(&self.target, &shell_join(argv), timeout)
            .await
    }

    async fn launch(&self, argv: &[&str]) -> Result<(), String> {
        if argv.is_empty() {
            return Err("empty command".into());
        }
        self.executor
            .launch(&self.target, &shell_join(argv))
            .map_err(|e| format!("failed to spawn ssh to {}: {e}", self.target.destination()))
    }

    fn describe(&self) -> String {
        self.target.destination()
    }
}

/// Joins an argv into one remote shell command line, single-quoting words that need it.
pub fn shell_join(argv: &[&str]) -> String {
    argv.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,".contains(c));
            if plain {
                (*arg).to_string()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
