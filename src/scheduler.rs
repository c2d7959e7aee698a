// Periodic sampling loop. Owns the current snapshot; publishes in tick order.
// Sampling and publishing run in one task, so cycles never overlap.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::Instrument;

use crate::collector::MetricsSource;
use crate::models::{HealthSnapshot, LastKnownGood, now_millis};
use crate::registry::ServiceRegistry;
use crate::services::ServiceStatusAggregator;

/// Rate limit for the "no subscribers" log line.
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Sampling,
    Published,
    Stopped,
}

/// Sources, registry and shutdown for the scheduler.
pub struct SchedulerDeps {
    pub metrics: Arc<dyn MetricsSource>,
    pub aggregator: Arc<ServiceStatusAggregator>,
    pub registry: Arc<ServiceRegistry>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct SchedulerConfig {
    pub sample_interval_ms: u64,
    pub stats_log_interval_secs: u64,
    pub broadcast_capacity: usize,
}

/// Read side of the scheduler plus the refresh trigger. Cheap to clone.
#[derive(Clone)]
pub struct SchedulerHandle {
    current: watch::Receiver<Option<Arc<HealthSnapshot>>>,
    state: watch::Receiver<SchedulerState>,
    tx: broadcast::Sender<Arc<HealthSnapshot>>,
    refresh_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Last published snapshot, `None` before the first cycle completes.
    pub fn current(&self) -> Option<Arc<HealthSnapshot>> {
        self.current.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot (intermediate ones may be skipped).
    pub fn watch(&self) -> watch::Receiver<Option<Arc<HealthSnapshot>>> {
        self.current.clone()
    }

    /// Every snapshot published from now on, in tick order.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<HealthSnapshot>> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Requests an out-of-band cycle. Requests made while one is pending
    /// coalesce. `false` once the scheduler has stopped.
    pub fn refresh(&self) -> bool {
        match self.refresh_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// Requests a cycle after `delay`, without blocking the caller.
    pub fn refresh_after(&self, delay: Duration) -> DeferredRefresh {
        let handle = self.clone();
        DeferredRefresh {
            task: tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if !handle.refresh() {
                    tracing::debug!("deferred refresh dropped: scheduler stopped");
                }
            }),
        }
    }
}

/// A scheduled one-shot refresh. Dropping it does not cancel it.
#[derive(Debug)]
pub struct DeferredRefresh {
    task: JoinHandle<()>,
}

impl DeferredRefresh {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Tick,
    Refresh,
}

pub fn spawn(deps: SchedulerDeps, config: SchedulerConfig) -> (SchedulerHandle, JoinHandle<()>) {
    let SchedulerDeps {
        metrics,
        aggregator,
        registry,
        mut shutdown_rx,
    } = deps;
    let SchedulerConfig {
        sample_interval_ms,
        stats_log_interval_secs,
        broadcast_capacity,
    } = config;

    let (current_tx, current_rx) = watch::channel(None);
    let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
    let (tx, _) = broadcast::channel(broadcast_capacity);
    let (refresh_tx, mut refresh_rx) = mpsc::channel(1);

    let handle = SchedulerHandle {
        current: current_rx,
        state: state_rx,
        tx: tx.clone(),
        refresh_tx,
    };

    let period = Duration::from_millis(sample_interval_ms);
    let stats_log_interval = Duration::from_secs(stats_log_interval_secs);

    let task = async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sequence: u64 = 0;
        let mut refreshes_total: u64 = 0;
        let mut overruns_total: u64 = 0;
        let mut last_no_receivers_log: Option<Instant> = None;
        let mut last_known_good = LastKnownGood::default();

        loop {
            let trigger = tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("Scheduler shutting down");
                    break;
                }
                _ = tick.tick() => Trigger::Tick,
                Some(()) = refresh_rx.recv() => Trigger::Refresh,
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        published_total = sequence,
                        refreshes_total,
                        overruns_total,
                        subscribers = tx.receiver_count(),
                        "scheduler stats"
                    );
                    continue;
                }
            };

            state_tx.send_replace(SchedulerState::Sampling);
            let started = Instant::now();
            let (metrics, services) =
                tokio::join!(metrics.sample(), aggregator.refresh(&registry));
            sequence += 1;
            last_known_good.record(&metrics);
            let snapshot = Arc::new(
                HealthSnapshot::assemble(sequence, now_millis(), metrics, services)
                    .with_last_known_good(&last_known_good),
            );

            state_tx.send_replace(SchedulerState::Published);
            current_tx.send_replace(Some(snapshot.clone()));
            if tx.send(snapshot).is_err() {
                let should_log = last_no_receivers_log
                    .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                if should_log {
                    tracing::debug!(
                        operation = "broadcast_snapshot",
                        "No active subscribers; broadcast channel has no receivers"
                    );
                    last_no_receivers_log = Some(Instant::now());
                }
            }
            state_tx.send_replace(SchedulerState::Idle);

            let elapsed = started.elapsed();
            if matches!(trigger, Trigger::Refresh) {
                refreshes_total += 1;
            }
            if elapsed > period {
                overruns_total += 1;
                tracing::debug!(
                    sequence,
                    elapsed_ms = elapsed.as_millis() as u64,
                    operation = "sample",
                    "sampling overran its period; ticks that came due were skipped"
                );
            }
            tracing::trace!(sequence, ?trigger, "snapshot published");
        }
        state_tx.send_replace(SchedulerState::Stopped);
    }
    .instrument(tracing::debug_span!("scheduler", sample_interval_ms));
    let task = tokio::spawn(task);

    (handle, task)
}
