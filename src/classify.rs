// Severity tiers for numeric metrics

use serde::{Deserialize, Serialize};

use crate::models::HealthSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// CPU, memory and disk usage.
    Percentage,
    /// Degrees Celsius.
    Temperature,
}

impl MetricKind {
    /// (medium_from, high_from); both bounds belong to the upper tier.
    const fn bounds(self) -> (f64, f64) {
        match self {
            MetricKind::Percentage => (50.0, 75.0),
            MetricKind::Temperature => (60.0, 75.0),
        }
    }
}

/// Maps a reading to a tier. NaN and anything below the medium bound are `Low`.
pub fn classify(value: f64, kind: MetricKind) -> Tier {
    let (medium, high) = kind.bounds();
    if value >= high {
        Tier::High
    } else if value >= medium {
        Tier::Medium
    } else {
        Tier::Low
    }
}

/// Tiers for the numeric fields of a snapshot, as a GUI-style consumer colours them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTiers {
    pub cpu: Tier,
    pub memory: Tier,
    pub disk: Tier,
    pub temperature: Option<Tier>,
}

impl SnapshotTiers {
    pub fn of(snapshot: &HealthSnapshot) -> Self {
        Self {
            cpu: classify(snapshot.cpu_percent, MetricKind::Percentage),
            memory: classify(snapshot.memory_percent, MetricKind::Percentage),
            disk: classify(snapshot.disk_percent, MetricKind::Percentage),
            temperature: snapshot
                .temperature_c
                .map(|t| classify(t, MetricKind::Temperature)),
        }
    }
}
