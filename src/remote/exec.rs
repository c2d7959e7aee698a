// Remote command execution over ssh

use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::models::{CommandResult, NO_EXIT_CODE};

/// Reference timeout for remote commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// How ssh authenticates. Password auth goes through `sshpass -e` with the
/// secret in `SSHPASS`, never on a command line. Host-key verification is off
/// for both; the monitored devices are re-imaged and their keys change.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Password { password: String },
    Key { identity_file: String },
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Password { .. } => f.write_str("Password { .. }"),
            AuthStrategy::Key { identity_file } => f
                .debug_struct("Key")
                .field("identity_file", identity_file)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthStrategy,
}

impl RemoteTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Program, arguments and extra environment for one ssh invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshInvocation {
    pub program: &'static str,
    pub args: Vec<String>,
    pub env: Vec<(&'static str, String)>,
}

impl SshInvocation {
    pub fn build(target: &RemoteTarget, command: &str, timeout: Duration) -> Self {
        // Always past the wall clock, so a silent host ends as a timeout.
        let connect_secs = timeout.as_secs() + 1;
        let mut args: Vec<String> = Vec::new();
        let mut env = Vec::new();
        let program = match &target.auth {
            AuthStrategy::Password { password } => {
                env.push(("SSHPASS", password.clone()));
                args.push("-e".into());
                args.push("ssh".into());
                "sshpass"
            }
            AuthStrategy::Key { identity_file } => {
                args.push("-o".into());
                args.push("BatchMode=yes".into());
                args.push("-i".into());
                args.push(identity_file.clone());
                "ssh"
            }
        };
        for opt in [
            "StrictHostKeyChecking=no".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "LogLevel=ERROR".to_string(),
            format!("ConnectTimeout={connect_secs}"),
        ] {
            args.push("-o".into());
            args.push(opt);
        }
        args.push("-p".into());
        args.push(target.port.to_string());
        args.push(target.destination());
        args.push(command.to_string());
        Self { program, args, env }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

/// Runs commands on a remote host. All outcomes, including spawn failures and
/// timeouts, come back as a [`CommandResult`].
#[derive(Debug, Clone, Default)]
pub struct RemoteExecutor;

impl RemoteExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        target: &RemoteTarget,
        command: &str,
        timeout: Duration,
    ) -> CommandResult {
        let invocation = SshInvocation::build(target, command, timeout);
        let result = run_with_timeout(invocation.command(), invocation.program, timeout).await;
        if let Some(kind) = result.failure_kind() {
            tracing::debug!(
                destination = %target.destination(),
                command,
                kind = %kind,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                operation = "remote_execute",
                "remote command failed"
            );
        }
        result
    }

    /// Starts the command and returns once the local ssh process is running.
    pub fn launch(&self, target: &RemoteTarget, command: &str) -> std::io::Result<()> {
        let invocation = SshInvocation::build(target, command, DEFAULT_COMMAND_TIMEOUT);
        spawn_detached(invocation.command())
    }

    /// Whether `sshpass` can be started on this machine.
    pub async fn sshpass_available(&self) -> bool {
        let mut cmd = Command::new("sshpass");
        cmd.arg("-V");
        let result = run_with_timeout(cmd, "sshpass", Duration::from_secs(2)).await;
        !result.timed_out && result.exit_code != NO_EXIT_CODE
    }
}

/// Spawns `cmd` with piped output and waits at most `timeout`. On expiry the
/// local child is killed; nothing is guaranteed about processes it started
/// elsewhere.
pub(crate) async fn run_with_timeout(
    mut cmd: Command,
    program: &str,
    timeout: Duration,
) -> CommandResult {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return CommandResult::spawn_failed(program, e),
    };
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandResult::exited(
            output.status.code().unwrap_or(NO_EXIT_CODE),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ),
        Ok(Err(e)) => CommandResult::exited(
            NO_EXIT_CODE,
            String::new(),
            format!("waiting for {program}: {e}"),
        ),
        Err(_) => CommandResult::timeout(timeout.as_millis() as u64),
    }
}

/// Spawns without waiting; the child is reaped in the background.
pub(crate) fn spawn_detached(mut cmd: Command) -> std::io::Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let mut child = cmd.spawn()?;
    tokio::spawn(async move {
        let _ = child.wait().await;
    });
    Ok(())
}
