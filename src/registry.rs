// Service registry: display name -> systemd unit (or process pattern)

use serde::{Deserialize, Serialize};

/// How an entry's state is determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCheck {
    /// `systemctl is-active <unit>`.
    Unit(String),
    /// `pgrep -f <pattern>`; for programs not managed by systemd.
    Process(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub display_name: String,
    pub check: ServiceCheck,
}

impl ServiceEntry {
    pub fn unit(display_name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            check: ServiceCheck::Unit(unit.into()),
        }
    }

    pub fn process(display_name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            check: ServiceCheck::Process(pattern.into()),
        }
    }

    /// Unit name, or the process pattern for process entries.
    pub fn unit_name(&self) -> &str {
        match &self.check {
            ServiceCheck::Unit(u) => u,
            ServiceCheck::Process(p) => p,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.check, ServiceCheck::Unit(_))
    }
}

/// Ordered list of monitored services. Snapshot order follows registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

pub const DASHBOARD_PROCESS: &str = "raspberry-pi-gui";

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(vec![
            ServiceEntry::unit("SSH Server", "ssh"),
            ServiceEntry::unit("AirPlay Receiver", "shairport-sync"),
            ServiceEntry::unit("Network Discovery", "avahi-daemon"),
            ServiceEntry::unit("File Sharing", "smbd"),
            ServiceEntry::unit("Web Server", "nginx"),
            ServiceEntry::unit("Desktop Manager", "lightdm"),
            ServiceEntry::process("GUI Dashboard", DASHBOARD_PROCESS),
        ])
    }
}

impl ServiceRegistry {
    pub fn new(entries: Vec<ServiceEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entry by display name (case-insensitive) or exact unit name.
    pub fn find(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries
            .iter()
            .find(|e| e.display_name.eq_ignore_ascii_case(name) || e.unit_name() == name)
    }
}
