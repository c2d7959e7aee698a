// One-shot connectivity check against the configured remote host

use anyhow::Result;
use pimon::config::AppConfig;
use pimon::report::{self, RemoteShell, ReportSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = AppConfig::load()?;
    let remote = &app_config.remote;
    let settings = ReportSettings::from_config(remote);

    let runner = report::open_remote_shell(remote).await;
    let shell = match &runner {
        Ok(runner) => RemoteShell::Ready(runner),
        Err(reason) => {
            tracing::warn!(reason = %reason, "remote commands will be skipped");
            RemoteShell::Unavailable(reason.clone())
        }
    };

    let http = reqwest::Client::builder()
        .user_agent(format!("{}/{}", pimon::version::NAME, pimon::version::VERSION))
        .build()?;

    let report = report::run(&settings, shell, &http).await;
    print!("{report}");

    if report.stopped_early {
        std::process::exit(1);
    }
    Ok(())
}
