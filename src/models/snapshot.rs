// Health snapshot: metrics + service states published by the scheduler

use serde::{Deserialize, Serialize};

use super::{LastKnownGood, LocalMetrics, MetricField, ServiceState, ServiceStatus, format_uptime};

/// One published cycle. Shared as `Arc<HealthSnapshot>` and never mutated after publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Increases by one per published snapshot.
    pub sequence: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub temperature_c: Option<f64>,
    pub uptime_secs: u64,
    /// `uptime_secs` as "Xh Ym".
    pub uptime: String,
    pub hostname: String,
    pub ip_address: String,
    pub services: Vec<ServiceStatus>,
    /// Metric fields holding a sentinel rather than a reading.
    pub degraded: Vec<MetricField>,
    /// Previous real readings of the degraded fields, for display alongside
    /// the stale marker. Empty when nothing is degraded.
    #[serde(default, skip_serializing_if = "LastKnownGood::is_empty")]
    pub last_known_good: LastKnownGood,
}

impl HealthSnapshot {
    pub fn assemble(
        sequence: u64,
        timestamp: u64,
        metrics: LocalMetrics,
        services: Vec<ServiceStatus>,
    ) -> Self {
        let LocalMetrics {
            cpu_percent,
            memory_percent,
            disk_percent,
            temperature_c,
            uptime_secs,
            hostname,
            ip_address,
            degraded,
        } = metrics;
        Self {
            sequence,
            timestamp,
            cpu_percent,
            memory_percent,
            disk_percent,
            temperature_c,
            uptime_secs,
            uptime: format_uptime(uptime_secs),
            hostname,
            ip_address,
            services,
            degraded,
            last_known_good: LastKnownGood::default(),
        }
    }

    /// Attaches the remembered values of this snapshot's degraded fields.
    pub fn with_last_known_good(mut self, remembered: &LastKnownGood) -> Self {
        self.last_known_good = remembered.restricted_to(&self.degraded);
        self
    }

    pub fn is_stale(&self, field: MetricField) -> bool {
        self.degraded.contains(&field)
    }

    /// Lookup by display name or unit name.
    pub fn service(&self, name: &str) -> Option<&ServiceStatus> {
        self.services
            .iter()
            .find(|s| s.display_name == name || s.unit_name == name)
    }

    pub fn count_in_state(&self, state: ServiceState) -> usize {
        self.services.iter().filter(|s| s.state == state).count()
    }
}
