// User-triggered actions: service toggle, reboot, shutdown.
// Errors go back to the caller; nothing is retried here.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ActionError, ErrorKind};
use crate::models::{Ack, ActionKind, ActionRequest, ServiceState};
use crate::registry::{ServiceCheck, ServiceRegistry};
use crate::remote::CommandRunner;
use crate::scheduler::{DeferredRefresh, SchedulerHandle};
use crate::services::classify_unit;

pub struct DispatcherConfig {
    /// Prefix privileged commands with `sudo -n`.
    pub use_sudo: bool,
    pub query_timeout: Duration,
    pub action_timeout: Duration,
    /// Delay before the re-aggregation that follows a toggle.
    pub refresh_delay: Duration,
}

pub struct ActionDispatcher {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<ServiceRegistry>,
    scheduler: SchedulerHandle,
    config: DispatcherConfig,
    pending_refresh: Mutex<Option<DeferredRefresh>>,
}

impl ActionDispatcher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<ServiceRegistry>,
        scheduler: SchedulerHandle,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            runner,
            registry,
            scheduler,
            config,
            pending_refresh: Mutex::new(None),
        }
    }

    pub async fn dispatch(&self, request: ActionRequest) -> Result<Ack, ActionError> {
        let result = match request.kind {
            ActionKind::ToggleService => self.toggle(request.target.as_deref()).await,
            ActionKind::Refresh => Ok(self.refresh()),
            ActionKind::Reboot => self.power(ActionKind::Reboot, "reboot", &["reboot"]).await,
            ActionKind::Shutdown => {
                self.power(ActionKind::Shutdown, "shutdown", &["shutdown", "-h", "now"])
                    .await
            }
        };
        match &result {
            Ok(ack) => tracing::info!(
                kind = ?ack.kind,
                service = ack.target.as_deref().unwrap_or("-"),
                action = %ack.action,
                "action dispatched"
            ),
            Err(e) => tracing::warn!(
                kind = ?request.kind,
                service = request.target.as_deref().unwrap_or("-"),
                error = %e,
                "action failed"
            ),
        }
        result
    }

    /// Out-of-band re-aggregation as soon as the scheduler is free.
    pub fn refresh(&self) -> Ack {
        let scheduled = self.scheduler.refresh();
        Ack {
            kind: ActionKind::Refresh,
            target: None,
            action: "refresh".into(),
            refresh_scheduled: scheduled,
        }
    }

    /// Cancels a deferred re-aggregation that has not fired yet.
    pub fn cancel_pending_refresh(&self) {
        let mut pending = self
            .pending_refresh
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(deferred) = pending.take() {
            deferred.cancel();
        }
    }

    async fn toggle(&self, target: Option<&str>) -> Result<Ack, ActionError> {
        let name = target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ActionError::invalid("toggle requires a service name"))?;
        let entry = self
            .registry
            .find(name)
            .ok_or_else(|| ActionError::invalid(format!("unknown service {name:?}")))?;
        let ServiceCheck::Unit(unit) = &entry.check else {
            return Err(ActionError::invalid(format!(
                "{} is checked by process and has no unit to toggle",
                entry.display_name
            )));
        };

        let current = self
            .runner
            .run(
                &["systemctl", "is-active", unit.as_str()],
                self.config.query_timeout,
            )
            .await;
        let action = match classify_unit(&current) {
            ServiceState::Running => "stop",
            ServiceState::Stopped => "start",
            ServiceState::Unknown => {
                return Err(ActionError::new(
                    current.failure_kind().unwrap_or(ErrorKind::Unknown),
                    format!("could not determine state of {unit}: {}", current.detail()),
                ));
            }
        };

        let argv = self.privileged(&["systemctl", action, unit.as_str()]);
        let result = self.runner.run(&argv, self.config.action_timeout).await;
        if let Some(kind) = result.failure_kind() {
            return Err(ActionError::new(
                kind,
                format!("systemctl {action} {unit} failed: {}", result.detail()),
            ));
        }

        self.schedule_refresh();
        Ok(Ack {
            kind: ActionKind::ToggleService,
            target: Some(entry.display_name.clone()),
            action: action.to_string(),
            refresh_scheduled: true,
        })
    }

    /// Launches a power action and returns without waiting for it.
    async fn power(
        &self,
        kind: ActionKind,
        action: &str,
        command: &[&str],
    ) -> Result<Ack, ActionError> {
        let argv = self.privileged(command);
        self.runner
            .launch(&argv)
            .await
            .map_err(|e| ActionError::new(ErrorKind::ExecutionFailure, e))?;
        Ok(Ack {
            kind,
            target: None,
            action: action.to_string(),
            refresh_scheduled: false,
        })
    }

    fn privileged<'a>(&self, command: &[&'a str]) -> Vec<&'a str> {
        let mut argv = Vec::with_capacity(command.len() + 2);
        if self.config.use_sudo {
            argv.extend(["sudo", "-n"]);
        }
        argv.extend_from_slice(command);
        argv
    }

    /// Replaces any pending deferred refresh; the newer one covers both.
    fn schedule_refresh(&self) {
        let deferred = self.scheduler.refresh_after(self.config.refresh_delay);
        let mut pending = self
            .pending_refresh
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(deferred) {
            previous.cancel();
        }
    }
}
