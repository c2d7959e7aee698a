// Domain models

mod action;
mod metrics;
mod remote;
mod service;
mod snapshot;

pub use action::{Ack, ActionKind, ActionRequest};
pub use metrics::{
    LastKnownGood, LocalMetrics, MetricField, NOT_AVAILABLE, RawMetrics, format_uptime,
};
pub use remote::{CommandResult, NO_EXIT_CODE, ProbeResult};
pub use service::{ServiceState, ServiceStatus};
pub use snapshot::HealthSnapshot;

/// Milliseconds since the Unix epoch; 0 if the clock is before the epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
