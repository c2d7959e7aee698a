// Local metric models: typed per-field readings and their sentinel-collapsed form

use serde::{Deserialize, Serialize};

use crate::error::ReadError;

/// Placeholder for text readings that could not be taken.
pub const NOT_AVAILABLE: &str = "N/A";

/// Names a metric field; listed in `degraded` when the field holds a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    Cpu,
    Memory,
    Disk,
    Temperature,
    Uptime,
    Hostname,
    IpAddress,
}

/// One sampling pass before sentinel substitution. Each field is independent.
#[derive(Debug, Clone)]
pub struct RawMetrics {
    pub cpu_percent: Result<f64, ReadError>,
    pub memory_percent: Result<f64, ReadError>,
    pub disk_percent: Result<f64, ReadError>,
    pub temperature_c: Result<f64, ReadError>,
    pub uptime_secs: Result<u64, ReadError>,
    pub hostname: Result<String, ReadError>,
    pub ip_address: Result<String, ReadError>,
}

/// Metric half of a snapshot. Always complete; failed readings hold sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub temperature_c: Option<f64>,
    pub uptime_secs: u64,
    pub hostname: String,
    pub ip_address: String,
    pub degraded: Vec<MetricField>,
}

impl LocalMetrics {
    /// Collapses per-field errors: 0.0 for percentages, `None` for temperature,
    /// 0 for uptime, "N/A" for text. Collapsed fields are listed in `degraded`.
    pub fn from_raw(raw: RawMetrics) -> Self {
        let mut degraded = Vec::new();

        let cpu_percent = percent_or_zero(raw.cpu_percent, MetricField::Cpu, &mut degraded);
        let memory_percent =
            percent_or_zero(raw.memory_percent, MetricField::Memory, &mut degraded);
        let disk_percent = percent_or_zero(raw.disk_percent, MetricField::Disk, &mut degraded);
        let temperature_c = match raw.temperature_c {
            Ok(t) => Some(t),
            Err(e) => {
                note(MetricField::Temperature, &e, &mut degraded);
                None
            }
        };
        let uptime_secs = match raw.uptime_secs {
            Ok(u) => u,
            Err(e) => {
                note(MetricField::Uptime, &e, &mut degraded);
                0
            }
        };
        let hostname = text_or_na(raw.hostname, MetricField::Hostname, &mut degraded);
        let ip_address = text_or_na(raw.ip_address, MetricField::IpAddress, &mut degraded);

        Self {
            cpu_percent,
            memory_percent,
            disk_percent,
            temperature_c,
            uptime_secs,
            hostname,
            ip_address,
            degraded,
        }
    }

    pub fn is_degraded(&self, field: MetricField) -> bool {
        self.degraded.contains(&field)
    }
}

/// Last real reading of each metric field. Only fields that have been read
/// successfully at least once are `Some`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnownGood {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl LastKnownGood {
    /// Remembers every field of `metrics` that is not degraded.
    pub fn record(&mut self, metrics: &LocalMetrics) {
        let ok = |field| !metrics.is_degraded(field);
        if ok(MetricField::Cpu) {
            self.cpu_percent = Some(metrics.cpu_percent);
        }
        if ok(MetricField::Memory) {
            self.memory_percent = Some(metrics.memory_percent);
        }
        if ok(MetricField::Disk) {
            self.disk_percent = Some(metrics.disk_percent);
        }
        if ok(MetricField::Temperature) {
            self.temperature_c = metrics.temperature_c.or(self.temperature_c);
        }
        if ok(MetricField::Uptime) {
            self.uptime_secs = Some(metrics.uptime_secs);
        }
        if ok(MetricField::Hostname) {
            self.hostname = Some(metrics.hostname.clone());
        }
        if ok(MetricField::IpAddress) {
            self.ip_address = Some(metrics.ip_address.clone());
        }
    }

    /// The remembered values of the given fields only; everything else is `None`.
    pub fn restricted_to(&self, fields: &[MetricField]) -> Self {
        let mut out = Self::default();
        for field in fields {
            match field {
                MetricField::Cpu => out.cpu_percent = self.cpu_percent,
                MetricField::Memory => out.memory_percent = self.memory_percent,
                MetricField::Disk => out.disk_percent = self.disk_percent,
                MetricField::Temperature => out.temperature_c = self.temperature_c,
                MetricField::Uptime => out.uptime_secs = self.uptime_secs,
                MetricField::Hostname => out.hostname = self.hostname.clone(),
                MetricField::IpAddress => out.ip_address = self.ip_address.clone(),
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn note(field: MetricField, err: &ReadError, degraded: &mut Vec<MetricField>) {
    tracing::debug!(field = ?field, error = %err, "metric reading unavailable, using sentinel");
    degraded.push(field);
}

fn percent_or_zero(
    value: Result<f64, ReadError>,
    field: MetricField,
    degraded: &mut Vec<MetricField>,
) -> f64 {
    match value {
        Ok(v) => v,
        Err(e) => {
            note(field, &e, degraded);
            0.0
        }
    }
}

fn text_or_na(
    value: Result<String, ReadError>,
    field: MetricField,
    degraded: &mut Vec<MetricField>,
) -> String {
    match value {
        Ok(v) if !v.trim().is_empty() => v,
        Ok(_) => {
            note(
                field,
                &ReadError::unavailable("text reading", "empty value"),
                degraded,
            );
            NOT_AVAILABLE.to_string()
        }
        Err(e) => {
            note(field, &e, degraded);
            NOT_AVAILABLE.to_string()
        }
    }
}

/// Uptime as "Xh Ym", the way the dashboards show it.
pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{hours}h {minutes}m")
}
