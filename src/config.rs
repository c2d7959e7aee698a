use serde::Deserialize;

use crate::registry::{ServiceEntry, ServiceRegistry};
use crate::remote::{AuthStrategy, RemoteTarget};

/// Upper bound for a single service state query.
pub const MAX_SERVICE_QUERY_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub sample_interval_ms: u64,
    /// Gap between the two CPU counter reads of one sample.
    #[serde(default = "default_cpu_sample_interval_ms")]
    pub cpu_sample_interval_ms: u64,
    #[serde(default = "default_service_query_timeout_ms")]
    pub service_query_timeout_ms: u64,
    /// Delay before the re-aggregation that follows a service toggle.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
    /// Max number of snapshots buffered for slow /ws/snapshot clients.
    pub broadcast_capacity: usize,
    /// How often to log scheduler stats at INFO level.
    pub stats_log_interval_secs: u64,
}

fn default_cpu_sample_interval_ms() -> u64 {
    200
}

fn default_service_query_timeout_ms() -> u64 {
    MAX_SERVICE_QUERY_TIMEOUT_MS
}

fn default_refresh_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Password,
    Key,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    pub user: String,
    pub auth: AuthMode,
    /// Environment variable holding the password; checked before `password`.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub identity_file: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_web_port")]
    pub web_port: u16,
    #[serde(default = "default_cast_port")]
    pub cast_port: u16,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_dashboard_process")]
    pub dashboard_process: String,
}

fn default_password_env() -> String {
    "PIMON_REMOTE_PASSWORD".into()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_web_port() -> u16 {
    8080
}

fn default_cast_port() -> u16 {
    8008
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_dashboard_process() -> String {
    crate::registry::DASHBOARD_PROCESS.into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            use_sudo: default_use_sudo(),
            action_timeout_ms: default_action_timeout_ms(),
        }
    }
}

fn default_use_sudo() -> bool {
    true
}

fn default_action_timeout_ms() -> u64 {
    5000
}

/// Where service queries and actions run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTarget {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub target: ServiceTarget,
    /// Replaces the built-in registry when non-empty.
    #[serde(default)]
    pub entries: Vec<ServiceEntryConfig>,
}

/// Exactly one of `unit` or `process` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntryConfig {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.cpu_sample_interval_ms > 0
                && self.monitoring.cpu_sample_interval_ms < self.monitoring.sample_interval_ms,
            "monitoring.cpu_sample_interval_ms must be > 0 and below sample_interval_ms, got {}",
            self.monitoring.cpu_sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.service_query_timeout_ms > 0
                && self.monitoring.service_query_timeout_ms <= MAX_SERVICE_QUERY_TIMEOUT_MS,
            "monitoring.service_query_timeout_ms must be in 1..={}, got {}",
            MAX_SERVICE_QUERY_TIMEOUT_MS,
            self.monitoring.service_query_timeout_ms
        );
        anyhow::ensure!(
            self.monitoring.refresh_delay_ms > 0,
            "monitoring.refresh_delay_ms must be > 0, got {}",
            self.monitoring.refresh_delay_ms
        );
        anyhow::ensure!(
            self.monitoring.broadcast_capacity > 0,
            "monitoring.broadcast_capacity must be > 0, got {}",
            self.monitoring.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(!self.remote.host.is_empty(), "remote.host must be non-empty");
        anyhow::ensure!(!self.remote.user.is_empty(), "remote.user must be non-empty");
        anyhow::ensure!(
            self.remote.probe_timeout_ms > 0,
            "remote.probe_timeout_ms must be > 0, got {}",
            self.remote.probe_timeout_ms
        );
        anyhow::ensure!(
            self.remote.command_timeout_ms > 0,
            "remote.command_timeout_ms must be > 0, got {}",
            self.remote.command_timeout_ms
        );
        if self.remote.auth == AuthMode::Key {
            anyhow::ensure!(
                self.remote.identity_file.as_deref().is_some_and(|f| !f.is_empty()),
                "remote.identity_file is required when remote.auth = \"key\""
            );
        }
        anyhow::ensure!(
            self.actions.action_timeout_ms > 0,
            "actions.action_timeout_ms must be > 0, got {}",
            self.actions.action_timeout_ms
        );
        for (i, entry) in self.services.entries.iter().enumerate() {
            anyhow::ensure!(
                !entry.name.is_empty(),
                "services.entries[{}].name must be non-empty",
                i
            );
            anyhow::ensure!(
                entry.unit.is_some() != entry.process.is_some(),
                "services.entries[{}] ({}) must set exactly one of unit or process",
                i,
                entry.name
            );
        }
        Ok(())
    }

    /// Configured entries, or the built-in registry when none are configured.
    pub fn registry(&self) -> ServiceRegistry {
        if self.services.entries.is_empty() {
            return ServiceRegistry::default();
        }
        let entries = self
            .services
            .entries
            .iter()
            .map(|e| match (&e.unit, &e.process) {
                (Some(unit), _) => ServiceEntry::unit(&e.name, unit),
                (None, Some(pattern)) => ServiceEntry::process(&e.name, pattern),
                (None, None) => ServiceEntry::unit(&e.name, &e.name),
            })
            .collect();
        ServiceRegistry::new(entries)
    }
}

impl RemoteConfig {
    /// Builds the remote target, resolving the password from `password_env` first.
    pub fn target(&self) -> anyhow::Result<RemoteTarget> {
        let auth = match self.auth {
            AuthMode::Key => AuthStrategy::Key {
                identity_file: self.identity_file.clone().unwrap_or_default(),
            },
            AuthMode::Password => {
                let from_env = std::env::var(&self.password_env)
                    .ok()
                    .filter(|v| !v.trim().is_empty());
                let from_cfg = self.password.clone().filter(|v| !v.trim().is_empty());
                let password = from_env.or(from_cfg).ok_or_else(|| {
                    anyhow::anyhow!(
                        "no remote password: set ${} or remote.password",
                        self.password_env
                    )
                })?;
                AuthStrategy::Password { password }
            }
        };
        Ok(RemoteTarget {
            host: self.host.clone(),
            port: self.ssh_port,
            user: self.user.clone(),
            auth,
        })
    }
}
