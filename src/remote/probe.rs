// TCP reachability probe

use std::io;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::models::ProbeResult;

/// Reference timeout for port probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Tries to open a TCP connection to `host:port`. Name resolution and every
/// connect attempt share the single `timeout` budget. Never fails: refused,
/// timed out, unresolvable and any other error all yield `reachable = false`.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    let reachable = match tokio::time::timeout(timeout, connect_any(host, port)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(host, port, error = %e, operation = "probe", "port not reachable");
            false
        }
        Err(_) => {
            tracing::debug!(
                host,
                port,
                timeout_ms = timeout.as_millis() as u64,
                operation = "probe",
                "port probe timed out"
            );
            false
        }
    };
    ProbeResult {
        host: host.to_string(),
        port,
        reachable,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

pub async fn is_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    probe(host, port, timeout).await.reachable
}

async fn connect_any(host: &str, port: u16) -> io::Result<()> {
    let mut last_err = None;
    for addr in tokio::net::lookup_host((host, port)).await? {
        match TcpStream::connect(addr).await {
            Ok(_stream) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses found")))
}
