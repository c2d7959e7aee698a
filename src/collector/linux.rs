// Linux-specific readings: thermal zone, /proc/uptime.

use crate::error::ReadError;

const THERMAL_ZONE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
const PROC_UPTIME_PATH: &str = "/proc/uptime";

/// SoC temperature in degrees Celsius from the first thermal zone.
pub(super) fn read_thermal_zone() -> Result<f64, ReadError> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string(THERMAL_ZONE_PATH)
            .map_err(|e| ReadError::unavailable(THERMAL_ZONE_PATH, e.to_string()))?;
        parse_millidegrees(&content)
    }
    #[cfg(not(target_os = "linux"))]
    Err(ReadError::unavailable(THERMAL_ZONE_PATH, "not linux"))
}

/// Seconds since boot from /proc/uptime.
pub(super) fn read_proc_uptime() -> Result<u64, ReadError> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string(PROC_UPTIME_PATH)
            .map_err(|e| ReadError::unavailable(PROC_UPTIME_PATH, e.to_string()))?;
        parse_proc_uptime(&content)
    }
    #[cfg(not(target_os = "linux"))]
    Err(ReadError::unavailable(PROC_UPTIME_PATH, "not linux"))
}

/// "48312\n" -> 48.312
pub(super) fn parse_millidegrees(content: &str) -> Result<f64, ReadError> {
    let raw = content.trim();
    raw.parse::<i64>()
        .map(|m| m as f64 / 1000.0)
        .map_err(|_| ReadError::Parse {
            source_name: THERMAL_ZONE_PATH,
            value: raw.to_string(),
        })
}

/// "7380.52 28891.10\n" -> 7380
pub(super) fn parse_proc_uptime(content: &str) -> Result<u64, ReadError> {
    let first = content.split_whitespace().next().unwrap_or_default();
    first
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s as u64)
        .ok_or_else(|| ReadError::Parse {
            source_name: PROC_UPTIME_PATH,
            value: first.to_string(),
        })
}
