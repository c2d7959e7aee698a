// Shared test helpers: an in-memory systemd stand-in and a fixed metrics source

#![allow(dead_code)]

use async_trait::async_trait;
use pimon::collector::MetricsSource;
use pimon::models::{CommandResult, HealthSnapshot, LocalMetrics};
use pimon::registry::{DASHBOARD_PROCESS, ServiceRegistry};
use pimon::remote::CommandRunner;
use pimon::scheduler::{self, SchedulerConfig, SchedulerDeps, SchedulerHandle};
use pimon::services::ServiceStatusAggregator;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Answers `systemctl is-active|start|stop` and `pgrep -f` from memory.
/// `sudo -n` prefixes are accepted and stripped.
#[derive(Default)]
pub struct FakeSystemd {
    units: Mutex<HashMap<String, bool>>,
    processes: Mutex<HashSet<String>>,
    hung: Mutex<HashSet<String>>,
    commands: Mutex<Vec<Vec<String>>>,
    launches: Mutex<Vec<Vec<String>>>,
    unreachable: AtomicBool,
    launch_fails: AtomicBool,
}

impl FakeSystemd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units of the built-in registry; smbd and lightdm stopped, dashboard running.
    pub fn for_default_registry() -> Self {
        Self::new()
            .with_unit("ssh", true)
            .with_unit("shairport-sync", true)
            .with_unit("avahi-daemon", true)
            .with_unit("smbd", false)
            .with_unit("nginx", true)
            .with_unit("lightdm", false)
            .with_process(DASHBOARD_PROCESS)
    }

    pub fn with_unit(self, unit: &str, active: bool) -> Self {
        self.units.lock().unwrap().insert(unit.into(), active);
        self
    }

    pub fn with_process(self, pattern: &str) -> Self {
        self.processes.lock().unwrap().insert(pattern.into());
        self
    }

    /// Queries for `unit` behave as if they hit their timeout.
    pub fn hang(&self, unit: &str) {
        self.hung.lock().unwrap().insert(unit.into());
    }

    /// Every command fails the way ssh does when the host is down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_launch_fails(&self, fails: bool) {
        self.launch_fails.store(fails, Ordering::SeqCst);
    }

    pub fn is_active(&self, unit: &str) -> Option<bool> {
        self.units.lock().unwrap().get(unit).copied()
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }

    pub fn launches(&self) -> Vec<Vec<String>> {
        self.launches.lock().unwrap().clone()
    }
}

fn owned(argv: &[&str]) -> Vec<String> {
    argv.iter().map(|s| s.to_string()).collect()
}

fn strip_sudo<'a, 'b>(argv: &'a [&'b str]) -> &'a [&'b str] {
    match argv {
        ["sudo", "-n", rest @ ..] => rest,
        _ => argv,
    }
}

#[async_trait]
impl CommandRunner for FakeSystemd {
    async fn run(&self, argv: &[&str], timeout: Duration) -> CommandResult {
        self.commands.lock().unwrap().push(owned(argv));
        if self.unreachable.load(Ordering::SeqCst) {
            return CommandResult::exited(
                255,
                "",
                "ssh: connect to host 10.0.0.2 port 22: Connection refused",
            );
        }
        match strip_sudo(argv) {
            ["systemctl", "is-active", unit] => {
                if self.hung.lock().unwrap().contains(*unit) {
                    return CommandResult::timeout(timeout.as_millis() as u64);
                }
                match self.is_active(unit) {
                    Some(true) => CommandResult::exited(0, "active\n", ""),
                    Some(false) => CommandResult::exited(3, "inactive\n", ""),
                    None => CommandResult::exited(4, "", format!("Unit {unit}.service could not be found.")),
                }
            }
            ["systemctl", action @ ("start" | "stop"), unit] => {
                let mut units = self.units.lock().unwrap();
                match units.get_mut(*unit) {
                    Some(active) => {
                        *active = *action == "start";
                        CommandResult::exited(0, "", "")
                    }
                    None => CommandResult::exited(
                        1,
                        "",
                        format!("Failed to {action} {unit}.service: Unit {unit}.service not found."),
                    ),
                }
            }
            ["pgrep", "-f", pattern] => {
                if self.processes.lock().unwrap().contains(*pattern) {
                    CommandResult::exited(0, "4242\n", "")
                } else {
                    CommandResult::exited(1, "", "")
                }
            }
            other => CommandResult::exited(127, "", format!("fake: unsupported command {other:?}")),
        }
    }

    async fn launch(&self, argv: &[&str]) -> Result<(), String> {
        if self.launch_fails.load(Ordering::SeqCst) {
            return Err(format!("failed to spawn {}: No such file or directory", argv[0]));
        }
        self.launches.lock().unwrap().push(owned(argv));
        Ok(())
    }

    fn describe(&self) -> String {
        "fake".into()
    }
}

/// Fixed readings; counts how often it was sampled.
pub struct StubMetrics {
    pub cpu_percent: f64,
    pub samples: AtomicU64,
}

impl StubMetrics {
    pub fn new(cpu_percent: f64) -> Self {
        Self {
            cpu_percent,
            samples: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl MetricsSource for StubMetrics {
    async fn sample(&self) -> LocalMetrics {
        self.samples.fetch_add(1, Ordering::SeqCst);
        LocalMetrics {
            cpu_percent: self.cpu_percent,
            memory_percent: 40.0,
            disk_percent: 62.5,
            temperature_c: Some(48.3),
            uptime_secs: 3 * 3600 + 25 * 60,
            hostname: "raspberrypi".into(),
            ip_address: "192.168.1.42".into(),
            degraded: vec![],
        }
    }
}

pub struct RunningScheduler {
    pub handle: SchedulerHandle,
    pub task: JoinHandle<()>,
    pub shutdown_tx: oneshot::Sender<()>,
}

impl RunningScheduler {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.task.await.unwrap();
    }
}

pub fn spawn_scheduler(
    metrics: Arc<dyn MetricsSource>,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<ServiceRegistry>,
    sample_interval_ms: u64,
) -> RunningScheduler {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let aggregator = Arc::new(ServiceStatusAggregator::new(
        runner,
        Duration::from_millis(500),
    ));
    let (handle, task) = scheduler::spawn(
        SchedulerDeps {
            metrics,
            aggregator,
            registry,
            shutdown_rx,
        },
        SchedulerConfig {
            sample_interval_ms,
            stats_log_interval_secs: 3600,
            broadcast_capacity: 16,
        },
    );
    RunningScheduler {
        handle,
        task,
        shutdown_tx,
    }
}

/// Waits until the current snapshot satisfies `pred`; panics after `within`.
pub async fn wait_for_snapshot<F>(
    handle: &SchedulerHandle,
    within: Duration,
    pred: F,
) -> Arc<HealthSnapshot>
where
    F: Fn(&HealthSnapshot) -> bool,
{
    let mut rx = handle.watch();
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Some(snapshot) = rx.borrow_and_update().clone() {
            if pred(&snapshot) {
                return snapshot;
            }
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => panic!("scheduler stopped before the expected snapshot"),
            Err(_) => panic!("timed out waiting for snapshot"),
        }
    }
}
