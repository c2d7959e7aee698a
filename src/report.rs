// Console connectivity check: ports, dashboard HTTP, remote shell commands

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::{AuthMode, RemoteConfig};
use crate::remote::{CommandRunner, RemoteExecutor, RemoteRunner, probe};

const HTTP_FOLLOW_UP_TIMEOUT: Duration = Duration::from_secs(5);
const RUNNING_SERVICES_FILTER: &str = "systemctl list-units --type=service --state=running \
     | grep -E '(airplay|shairport|google-cast|remote-control|ssh)'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Pass,
    Fail,
    Warn,
}

impl Mark {
    fn tag(&self) -> &'static str {
        match self {
            Mark::Pass => "[ OK ]",
            Mark::Fail => "[FAIL]",
            Mark::Warn => "[WARN]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckLine {
    pub mark: Mark,
    pub message: String,
    /// Extra indented output lines (command output etc.).
    pub details: Vec<String>,
}

impl CheckLine {
    fn new(mark: Mark, message: impl Into<String>) -> Self {
        Self {
            mark,
            message: message.into(),
            details: Vec::new(),
        }
    }

    fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub lines: Vec<CheckLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    pub host: String,
    pub sections: Vec<ReportSection>,
    /// Set when the remote shell port was closed and later steps were skipped.
    pub stopped_early: bool,
    pub summary: Vec<String>,
}

impl ConnectivityReport {
    pub fn count(&self, mark: Mark) -> usize {
        self.lines().filter(|l| l.mark == mark).count()
    }

    pub fn lines(&self) -> impl Iterator<Item = &CheckLine> {
        self.sections.iter().flat_map(|s| s.lines.iter())
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().any(|l| l.message.contains(needle))
    }
}

impl fmt::Display for ConnectivityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pi Service Checker")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "Checking host: {}", self.host)?;
        for (i, section) in self.sections.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "{}. {}", i + 1, section.title)?;
            for line in &section.lines {
                writeln!(f, "   {} {}", line.mark.tag(), line.message)?;
                for detail in &line.details {
                    writeln!(f, "     {detail}")?;
                }
            }
        }
        writeln!(f)?;
        if self.stopped_early {
            writeln!(f, "Stopped early:")?;
        } else {
            writeln!(f, "{}. Summary:", self.sections.len() + 1)?;
        }
        for line in &self.summary {
            writeln!(f, "   {line}")?;
        }
        writeln!(
            f,
            "   ({} passed, {} failed, {} warnings)",
            self.count(Mark::Pass),
            self.count(Mark::Fail),
            self.count(Mark::Warn)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub host: String,
    pub user: String,
    pub ssh_port: u16,
    pub web_port: u16,
    pub cast_port: u16,
    pub probe_timeout: Duration,
    pub command_timeout: Duration,
    pub dashboard_process: String,
}

impl ReportSettings {
    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self {
            host: remote.host.clone(),
            user: remote.user.clone(),
            ssh_port: remote.ssh_port,
            web_port: remote.web_port,
            cast_port: remote.cast_port,
            probe_timeout: Duration::from_millis(remote.probe_timeout_ms),
            command_timeout: Duration::from_millis(remote.command_timeout_ms),
            dashboard_process: remote.dashboard_process.clone(),
        }
    }

    fn dashboard_url(&self) -> String {
        format!("http://{}:{}", self.host, self.web_port)
    }

    fn ssh_hint(&self) -> String {
        if self.ssh_port == 22 {
            format!("ssh {}@{}", self.user, self.host)
        } else {
            format!("ssh -p {} {}@{}", self.ssh_port, self.user, self.host)
        }
    }
}

/// Runner for the remote command step, or why there is none.
pub enum RemoteShell<'a> {
    Ready(&'a dyn CommandRunner),
    Unavailable(String),
}

/// Builds the remote shell from config. Fails with a printable reason when no
/// password is configured for password auth or `sshpass` is missing; the
/// port checks do not need either.
pub async fn open_remote_shell(remote: &RemoteConfig) -> Result<RemoteRunner, String> {
    let target = remote.target().map_err(|e| e.to_string())?;
    if remote.auth == AuthMode::Password && !RemoteExecutor::new().sshpass_available().await {
        return Err("sshpass not available".into());
    }
    Ok(RemoteRunner::new(target))
}

/// Runs every check in order. Without a remote shell the remote command step
/// is reported as a warning and skipped.
pub async fn run(
    settings: &ReportSettings,
    shell: RemoteShell<'_>,
    http: &reqwest::Client,
) -> ConnectivityReport {
    let mut sections = Vec::new();

    let ssh = probe(&settings.host, settings.ssh_port, settings.probe_timeout).await;
    let connectivity = if ssh.reachable {
        CheckLine::new(Mark::Pass, format!("SSH port ({}) is open", ssh.port))
    } else {
        CheckLine::new(Mark::Fail, format!("SSH port ({}) is not accessible", ssh.port))
    };
    sections.push(ReportSection {
        title: "Checking connectivity...".into(),
        lines: vec![connectivity],
    });
    if !ssh.reachable {
        tracing::debug!(host = %settings.host, port = ssh.port, "remote shell port closed; stopping");
        return ConnectivityReport {
            host: settings.host.clone(),
            sections,
            stopped_early: true,
            summary: vec![format!(
                "- {} is not reachable on port {}; remaining checks skipped",
                settings.host, settings.ssh_port
            )],
        };
    }

    sections.push(ReportSection {
        title: "Checking web dashboard...".into(),
        lines: check_dashboard(settings, http).await,
    });

    let cast = probe(&settings.host, settings.cast_port, settings.probe_timeout).await;
    let cast_line = if cast.reachable {
        CheckLine::new(
            Mark::Pass,
            format!("Cast service (port {}) is accessible", cast.port),
        )
    } else {
        CheckLine::new(
            Mark::Fail,
            format!("Cast service (port {}) is not accessible", cast.port),
        )
    };
    sections.push(ReportSection {
        title: "Checking cast service...".into(),
        lines: vec![cast_line],
    });

    let shell_lines = match shell {
        RemoteShell::Ready(runner) => check_remote_shell(settings, runner).await,
        RemoteShell::Unavailable(reason) => vec![CheckLine::new(
            Mark::Warn,
            format!("{reason}, skipping remote commands"),
        )],
    };
    sections.push(ReportSection {
        title: "Checking services via SSH...".into(),
        lines: shell_lines,
    });

    ConnectivityReport {
        host: settings.host.clone(),
        sections,
        stopped_early: false,
        summary: vec![
            format!("- {} is reachable via SSH", settings.host),
            format!("- Check the web dashboard at: {}", settings.dashboard_url()),
            format!("- SSH access: {}", settings.ssh_hint()),
            "- If services aren't running, you may need to start them manually".into(),
        ],
    }
}

async fn check_dashboard(settings: &ReportSettings, http: &reqwest::Client) -> Vec<CheckLine> {
    let web = probe(&settings.host, settings.web_port, settings.probe_timeout).await;
    if !web.reachable {
        return vec![CheckLine::new(
            Mark::Fail,
            format!("Web dashboard (port {}) is not accessible", web.port),
        )];
    }
    let mut lines = vec![CheckLine::new(
        Mark::Pass,
        format!("Web dashboard (port {}) is accessible", web.port),
    )];
    let follow_up = http
        .get(settings.dashboard_url())
        .timeout(HTTP_FOLLOW_UP_TIMEOUT)
        .send()
        .await;
    lines.push(match follow_up {
        Ok(resp) if resp.status().as_u16() == 200 => {
            CheckLine::new(Mark::Pass, "Web dashboard is responding")
        }
        Ok(resp) => CheckLine::new(
            Mark::Warn,
            format!("Web dashboard returned status {}", resp.status().as_u16()),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "dashboard HTTP follow-up failed");
            CheckLine::new(
                Mark::Warn,
                "Web dashboard port open but not responding properly",
            )
        }
    });
    lines
}

async fn check_remote_shell(settings: &ReportSettings, runner: &dyn CommandRunner) -> Vec<CheckLine> {
    let timeout = settings.command_timeout;
    let mut lines = Vec::with_capacity(3);

    let whoami = runner.run(&["sh", "-c", "uptime && whoami"], timeout).await;
    lines.push(match whoami.failure_kind() {
        None => CheckLine::new(Mark::Pass, "SSH connection successful")
            .with_details(vec![format!("System: {}", flatten(&whoami.stdout))]),
        Some(kind) => CheckLine::new(
            Mark::Fail,
            format!("SSH connection failed ({kind}): {}", whoami.detail()),
        ),
    });

    let services = runner.run(&["sh", "-c", RUNNING_SERVICES_FILTER], timeout).await;
    lines.push(if services.success() {
        CheckLine::new(Mark::Pass, "Services check:").with_details(
            services
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        )
    } else {
        CheckLine::new(Mark::Warn, "Could not check services via SSH")
    });

    let grep = format!(
        "ps aux | grep {} | grep -v grep",
        crate::remote::shell_join(&[settings.dashboard_process.as_str()])
    );
    let gui = runner.run(&["sh", "-c", grep.as_str()], timeout).await;
    lines.push(if gui.success() && !gui.stdout.trim().is_empty() {
        CheckLine::new(Mark::Pass, "Custom GUI is running")
    } else {
        CheckLine::new(Mark::Fail, "Custom GUI is not running")
    });

    lines
}

/// Multi-line command output on one line.
fn flatten(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}
