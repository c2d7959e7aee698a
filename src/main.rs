use anyhow::Result;
use pimon::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let monitoring = &app_config.monitoring;

    let runner: Arc<dyn remote::CommandRunner> = match app_config.services.target {
        config::ServiceTarget::Local => Arc::new(remote::LocalRunner),
        config::ServiceTarget::Remote => {
            Arc::new(remote::RemoteRunner::new(app_config.remote.target()?))
        }
    };
    tracing::info!(runner = %runner.describe(), "Service queries and actions target");

    let registry = Arc::new(app_config.registry());
    let metrics = Arc::new(collector::MetricsCollector::new(Duration::from_millis(
        monitoring.cpu_sample_interval_ms,
    )));
    let aggregator = Arc::new(services::ServiceStatusAggregator::new(
        runner.clone(),
        Duration::from_millis(monitoring.service_query_timeout_ms),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let (scheduler, scheduler_task) = scheduler::spawn(
        scheduler::SchedulerDeps {
            metrics,
            aggregator,
            registry: registry.clone(),
            shutdown_rx,
        },
        scheduler::SchedulerConfig {
            sample_interval_ms: monitoring.sample_interval_ms,
            stats_log_interval_secs: monitoring.stats_log_interval_secs,
            broadcast_capacity: monitoring.broadcast_capacity,
        },
    );

    let dispatcher = Arc::new(dispatcher::ActionDispatcher::new(
        runner,
        registry,
        scheduler.clone(),
        dispatcher::DispatcherConfig {
            use_sudo: app_config.actions.use_sudo,
            query_timeout: Duration::from_millis(monitoring.service_query_timeout_ms),
            action_timeout: Duration::from_millis(app_config.actions.action_timeout_ms),
            refresh_delay: Duration::from_millis(monitoring.refresh_delay_ms),
        },
    ));

    let app = routes::app(scheduler, dispatcher.clone(), app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            dispatcher.cancel_pending_refresh();
            let _ = shutdown_tx.send(());
            let _ = scheduler_task.await;
        }
    }

    Ok(())
}
