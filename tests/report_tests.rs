// Connectivity report against local listeners and a scripted remote shell

use async_trait::async_trait;
use pimon::models::CommandResult;
use pimon::remote::CommandRunner;
use pimon::config::AppConfig;
use pimon::report::{self, Mark, RemoteShell, ReportSettings};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Replies to `sh -c <script>` by the first configured fragment found in the script.
struct ScriptedShell {
    replies: Vec<(&'static str, CommandResult)>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedShell {
    fn new(replies: Vec<(&'static str, CommandResult)>) -> Self {
        Self {
            replies,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn healthy() -> Self {
        Self::new(vec![
            (
                "whoami",
                CommandResult::exited(0, " 10:02:11 up 3:25,  1 user,  load average: 0.10\npi\n", ""),
            ),
            (
                "list-units",
                CommandResult::exited(
                    0,
                    "ssh.service loaded active running OpenBSD Secure Shell server\n",
                    "",
                ),
            ),
            (
                "ps aux",
                CommandResult::exited(0, "pi 812 0.3 python3 /opt/raspberry-pi-gui/main.py\n", ""),
            ),
        ])
    }
}

#[async_trait]
impl CommandRunner for ScriptedShell {
    async fn run(&self, argv: &[&str], _timeout: Duration) -> CommandResult {
        let script = argv.last().copied().unwrap_or_default().to_string();
        self.seen.lock().unwrap().push(script.clone());
        self.replies
            .iter()
            .find(|(fragment, _)| script.contains(fragment))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| CommandResult::exited(1, "", ""))
    }

    async fn launch(&self, _argv: &[&str]) -> Result<(), String> {
        Err("not supported".into())
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

/// A port on 127.0.0.1 with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Accepts connections and drops them.
async fn open_port() -> (u16, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    (port, task)
}

/// Minimal HTTP/1.1 server answering every request with `status`.
async fn http_port(status: &'static str) -> (u16, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    (port, task)
}

fn settings(ssh_port: u16, web_port: u16, cast_port: u16) -> ReportSettings {
    ReportSettings {
        host: "127.0.0.1".into(),
        user: "pi".into(),
        ssh_port,
        web_port,
        cast_port,
        probe_timeout: Duration::from_millis(500),
        command_timeout: Duration::from_secs(5),
        dashboard_process: "raspberry-pi-gui".into(),
    }
}

#[tokio::test]
async fn closed_ssh_port_stops_after_first_step() {
    let shell = ScriptedShell::healthy();
    let http = reqwest::Client::new();
    let report = report::run(
        &settings(closed_port().await, closed_port().await, closed_port().await),
        RemoteShell::Ready(&shell),
        &http,
    )
    .await;

    assert!(report.stopped_early);
    assert_eq!(report.sections.len(), 1);
    assert_eq!(report.count(Mark::Fail), 1);
    assert!(shell.seen.lock().unwrap().is_empty());
    let text = report.to_string();
    assert!(text.contains("[FAIL] SSH port"));
    assert!(text.contains("remaining checks skipped"));
}

#[tokio::test]
async fn closed_web_port_skips_http_follow_up() {
    let (ssh, _ssh_task) = open_port().await;
    let shell = ScriptedShell::healthy();
    let http = reqwest::Client::new();
    let report = report::run(
        &settings(ssh, closed_port().await, closed_port().await),
        RemoteShell::Ready(&shell),
        &http,
    )
    .await;

    assert!(!report.stopped_early);
    let dashboard = &report.sections[1];
    assert_eq!(dashboard.lines.len(), 1);
    assert_eq!(dashboard.lines[0].mark, Mark::Fail);
    assert!(!report.contains("responding"));
    assert!(report.contains("SSH connection successful"));
    assert!(report.contains("Custom GUI is running"));
    assert_eq!(report.summary.len(), 4);
}

#[tokio::test]
async fn open_web_port_gets_http_follow_up() {
    let (ssh, _ssh_task) = open_port().await;
    let (web, _web_task) = http_port("200 OK").await;
    let shell = ScriptedShell::healthy();
    let http = reqwest::Client::new();
    let report = report::run(&settings(ssh, web, closed_port().await), RemoteShell::Ready(&shell), &http).await;

    let dashboard = &report.sections[1];
    assert_eq!(dashboard.lines.len(), 2);
    assert_eq!(dashboard.lines[1].mark, Mark::Pass);
    assert!(report.contains("Web dashboard is responding"));
}

#[tokio::test]
async fn non_200_dashboard_is_a_warning_with_status() {
    let (ssh, _ssh_task) = open_port().await;
    let (web, _web_task) = http_port("503 Service Unavailable").await;
    let shell = ScriptedShell::healthy();
    let http = reqwest::Client::new();
    let report = report::run(&settings(ssh, web, web), RemoteShell::Ready(&shell), &http).await;

    let line = &report.sections[1].lines[1];
    assert_eq!(line.mark, Mark::Warn);
    assert!(line.message.contains("503"));
    assert_eq!(report.sections[2].lines[0].mark, Mark::Pass);
}

#[tokio::test]
async fn missing_shell_tool_warns_and_skips_remote_commands() {
    let (ssh, _ssh_task) = open_port().await;
    let http = reqwest::Client::new();
    let report = report::run(
        &settings(ssh, closed_port().await, closed_port().await),
        RemoteShell::Unavailable("sshpass not available".into()),
        &http,
    )
    .await;

    let remote = &report.sections[3];
    assert_eq!(remote.lines.len(), 1);
    assert_eq!(remote.lines[0].mark, Mark::Warn);
    assert!(remote.lines[0].message.contains("sshpass not available"));
    assert!(!report.stopped_early);
}

#[tokio::test]
async fn missing_password_still_runs_port_checks() {
    let config = AppConfig::load_from_str(
        r#"
[server]
port = 8091
host = "127.0.0.1"

[monitoring]
sample_interval_ms = 5000
broadcast_capacity = 10
stats_log_interval_secs = 60

[remote]
host = "127.0.0.1"
user = "pi"
auth = "password"
password_env = "PIMON_TEST_UNSET_PASSWORD_VAR"
"#,
    )
    .unwrap();
    let reason = match report::open_remote_shell(&config.remote).await {
        Ok(_) => panic!("no password is configured"),
        Err(reason) => reason,
    };
    assert!(reason.contains("PIMON_TEST_UNSET_PASSWORD_VAR"));

    let (ssh, _ssh_task) = open_port().await;
    let http = reqwest::Client::new();
    let report = report::run(
        &settings(ssh, closed_port().await, closed_port().await),
        RemoteShell::Unavailable(reason),
        &http,
    )
    .await;
    assert!(!report.stopped_early);
    assert_eq!(report.sections[0].lines[0].mark, Mark::Pass);
    let remote = &report.sections[3].lines;
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].mark, Mark::Warn);
    assert!(remote[0].message.contains("skipping remote commands"));
    assert_eq!(report.summary.len(), 4);
}

#[tokio::test]
async fn failed_remote_commands_are_marked_and_summary_still_printed() {
    let (ssh, _ssh_task) = open_port().await;
    let shell = ScriptedShell::new(vec![(
        "whoami",
        CommandResult::exited(5, "", "Permission denied, please try again."),
    )]);
    let http = reqwest::Client::new();
    let report = report::run(
        &settings(ssh, closed_port().await, closed_port().await),
        RemoteShell::Ready(&shell),
        &http,
    )
    .await;

    let remote = &report.sections[3].lines;
    assert_eq!(remote[0].mark, Mark::Fail);
    assert!(remote[0].message.contains("auth failure"));
    assert_eq!(remote[1].mark, Mark::Warn);
    assert_eq!(remote[2].mark, Mark::Fail);

    let text = report.to_string();
    assert!(text.contains("5. Summary:"));
    assert!(text.contains(&format!("ssh -p {ssh} pi@127.0.0.1")));
    let seen = shell.seen.lock().unwrap();
    assert!(seen.iter().any(|s| s.contains("grep raspberry-pi-gui | grep -v grep")));
}
