// Service state aggregation: one isolated, timeout-bounded query per registry entry

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{CommandResult, ServiceState, ServiceStatus, now_millis};
use crate::registry::{ServiceCheck, ServiceEntry, ServiceRegistry};
use crate::remote::CommandRunner;

pub struct ServiceStatusAggregator {
    runner: Arc<dyn CommandRunner>,
    query_timeout: Duration,
}

impl ServiceStatusAggregator {
    pub fn new(runner: Arc<dyn CommandRunner>, query_timeout: Duration) -> Self {
        Self {
            runner,
            query_timeout,
        }
    }

    /// Queries every entry concurrently. The result has exactly one status per
    /// entry, in registry order; failed queries yield `Unknown`.
    pub async fn refresh(&self, registry: &ServiceRegistry) -> Vec<ServiceStatus> {
        let statuses = join_all(registry.entries().iter().map(|e| self.query(e))).await;
        let unknown = statuses
            .iter()
            .filter(|s| s.state == ServiceState::Unknown)
            .count();
        if unknown > 0 {
            tracing::debug!(
                runner = %self.runner.describe(),
                unknown,
                total = statuses.len(),
                operation = "refresh_services",
                "some service states unknown"
            );
        }
        statuses
    }

    /// State of a single entry.
    pub async fn query(&self, entry: &ServiceEntry) -> ServiceStatus {
        let state = match &entry.check {
            ServiceCheck::Unit(unit) => {
                let result = self
                    .runner
                    .run(&["systemctl", "is-active", unit.as_str()], self.query_timeout)
                    .await;
                classify_unit(&result)
            }
            ServiceCheck::Process(pattern) => {
                let result = self
                    .runner
                    .run(&["pgrep", "-f", pattern.as_str()], self.query_timeout)
                    .await;
                classify_process(&result)
            }
        };
        ServiceStatus {
            display_name: entry.display_name.clone(),
            unit_name: entry.unit_name().to_string(),
            state,
            last_checked: now_millis(),
        }
    }
}

/// `systemctl is-active` outcome -> state. Only a clean "active" is Running;
/// a clean exit with other output, or an "inactive" report, is Stopped;
/// everything else is Unknown.
pub fn classify_unit(result: &CommandResult) -> ServiceState {
    if result.timed_out {
        return ServiceState::Unknown;
    }
    let out = result.stdout.trim();
    match result.exit_code {
        0 if out == "active" => ServiceState::Running,
        0 => ServiceState::Stopped,
        _ if out == "inactive" => ServiceState::Stopped,
        _ => ServiceState::Unknown,
    }
}

/// `pgrep -f` outcome -> state. Exit 1 means no match.
pub fn classify_process(result: &CommandResult) -> ServiceState {
    if result.timed_out {
        return ServiceState::Unknown;
    }
    match result.exit_code {
        0 if !result.stdout.trim().is_empty() => ServiceState::Running,
        0 | 1 => ServiceState::Stopped,
        _ => ServiceState::Unknown,
    }
}
