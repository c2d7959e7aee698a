// Local metrics via sysinfo

mod linux;

use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use sysinfo::{Components, Disks, Networks, System};
use tracing::instrument;

use crate::error::ReadError;
use crate::models::{LocalMetrics, RawMetrics};

/// Labels of hardware sensors that report the CPU/SoC temperature.
const CPU_SENSOR_MARKERS: [&str; 5] = ["cpu", "soc", "package", "coretemp", "k10temp"];

/// Anything that can produce one metrics sample. The scheduler depends on this.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> LocalMetrics;
}

pub struct MetricsCollector {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    networks: Arc<Mutex<Networks>>,
    components: Arc<Mutex<Components>>,
    cpu_interval: Duration,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
    }
}

impl MetricsCollector {
    /// `cpu_interval` is the gap between the two CPU counter reads of every
    /// sample; it is raised to sysinfo's minimum when shorter.
    pub fn new(cpu_interval: Duration) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
            components: Arc::new(Mutex::new(Components::new_with_refreshed_list())),
            cpu_interval: cpu_interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn cpu_interval(&self) -> Duration {
        self.cpu_interval
    }

    /// Takes every reading on its own blocking task; a failed or panicking
    /// reading leaves the others intact.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sample_raw"))]
    pub async fn sample_raw(&self) -> RawMetrics {
        let cpu_sys = self.sys.clone();
        let memory_sys = self.sys.clone();
        let disks = self.disks.clone();
        let networks = self.networks.clone();
        let components = self.components.clone();
        let cpu_interval = self.cpu_interval;
        let (
            cpu_percent,
            memory_percent,
            disk_percent,
            temperature_c,
            uptime_secs,
            hostname,
            ip_address,
        ) = tokio::join!(
            guarded("cpu", move || read_cpu(&cpu_sys, cpu_interval)),
            guarded("memory", move || read_memory(&memory_sys)),
            guarded("disk", move || read_root_disk(&disks)),
            guarded("temperature", move || {
                linux::read_thermal_zone().or_else(|_| read_cpu_component(&components))
            }),
            guarded("uptime", || {
                linux::read_proc_uptime().or_else(|_| read_sysinfo_uptime())
            }),
            guarded("hostname", || {
                System::host_name().ok_or_else(|| ReadError::unavailable("hostname", "not reported"))
            }),
            guarded("ip address", move || read_primary_ipv4(&networks)),
        );
        RawMetrics {
            cpu_percent,
            memory_percent,
            disk_percent,
            temperature_c,
            uptime_secs,
            hostname,
            ip_address,
        }
    }
}

#[async_trait]
impl MetricsSource for MetricsCollector {
    async fn sample(&self) -> LocalMetrics {
        LocalMetrics::from_raw(self.sample_raw().await)
    }
}

/// Runs one reading on the blocking pool. A panic becomes a `Fault` for that reading only.
async fn guarded<T, F>(source_name: &'static str, read: F) -> Result<T, ReadError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ReadError> + Send + 'static,
{
    match tokio::task::spawn_blocking(read).await {
        Ok(reading) => reading,
        Err(e) => {
            tracing::warn!(
                error = %e,
                source = source_name,
                operation = "sample_raw",
                "metric reading task failed"
            );
            Err(ReadError::Fault(format!("{source_name} reading: {e}")))
        }
    }
}

/// Locks a sysinfo handle, recovering it if an earlier reader panicked.
fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    m.lock().unwrap_or_else(|e| {
        tracing::debug!(lock = what, "recovering poisoned sysinfo lock");
        e.into_inner()
    })
}

fn read_cpu(sys: &Mutex<System>, interval: Duration) -> Result<f64, ReadError> {
    let mut sys = lock(sys, "system");
    sys.refresh_cpu_all();
    std::thread::sleep(interval);
    sys.refresh_cpu_all();
    let usage = sys.global_cpu_usage() as f64;
    if !usage.is_finite() {
        return Err(ReadError::Parse {
            source_name: "global_cpu_usage",
            value: usage.to_string(),
        });
    }
    Ok(usage.clamp(0.0, 100.0))
}

fn read_memory(sys: &Mutex<System>) -> Result<f64, ReadError> {
    let mut sys = lock(sys, "system");
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return Err(ReadError::unavailable("memory", "total memory reported as 0"));
    }
    let used = total.saturating_sub(sys.available_memory());
    Ok((used as f64 / total as f64) * 100.0)
}

fn read_root_disk(disks: &Mutex<Disks>) -> Result<f64, ReadError> {
    let mut disks = lock(disks, "disks");
    disks.refresh(false);
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .ok_or_else(|| ReadError::unavailable("disk", "no disk mounted at /"))?;
    let total = root.total_space();
    if total == 0 {
        return Err(ReadError::unavailable("disk", "root filesystem size is 0"));
    }
    let used = total.saturating_sub(root.available_space());
    Ok((used as f64 / total as f64) * 100.0)
}

fn read_cpu_component(components: &Mutex<Components>) -> Result<f64, ReadError> {
    let mut components = lock(components, "components");
    components.refresh(false);
    components
        .list()
        .iter()
        .filter(|c| {
            let label = c.label().to_lowercase();
            CPU_SENSOR_MARKERS.iter().any(|m| label.contains(m))
        })
        .filter_map(|c| c.temperature())
        .map(f64::from)
        .filter(|t| t.is_finite())
        .max_by(|a, b| a.total_cmp(b))
        .ok_or_else(|| ReadError::unavailable("temperature", "no CPU sensor found"))
}

fn read_sysinfo_uptime() -> Result<u64, ReadError> {
    match System::uptime() {
        0 => Err(ReadError::unavailable("uptime", "not reported")),
        secs => Ok(secs),
    }
}

/// First non-loopback, non-link-local IPv4 address, by interface name.
fn read_primary_ipv4(networks: &Mutex<Networks>) -> Result<String, ReadError> {
    let mut networks = lock(networks, "networks");
    networks.refresh(true);
    let mut candidates: Vec<(String, IpAddr)> = networks
        .list()
        .iter()
        .flat_map(|(name, data)| {
            data.ip_networks()
                .iter()
                .map(move |n| (name.clone(), n.addr))
        })
        .filter(|(_, addr)| match addr {
            IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local() && !v4.is_unspecified(),
            IpAddr::V6(_) => false,
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates
        .first()
        .map(|(_, addr)| addr.to_string())
        .ok_or_else(|| ReadError::unavailable("ip address", "no non-loopback IPv4 address"))
}
