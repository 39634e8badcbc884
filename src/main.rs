use anyhow::Context;
use govwatch::config::{config_path, Config};
use govwatch::monitor::{spawn_scheduler, Monitor, RunGate, Services};
use govwatch::server::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let path = config_path(&args);
    let config = Config::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    govwatch::init_logging(&config.logging);
    info!(
        config = %path.display(),
        chains = config.chains.len(),
        "govwatch v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let services = Services::from_config(&config).await?;
    let config = Arc::new(config);
    let monitor = Arc::new(Monitor::new(config.clone(), services));
    let gate = RunGate::new();

    if let Some(secs) = config.schedule.interval_secs {
        spawn_scheduler(monitor.clone(), gate.clone(), Duration::from_secs(secs));
    } else {
        info!("no schedule configured, runs only on POST /trigger-monitor");
    }

    server::serve(AppState { monitor, gate }, &config.server.bind).await
}
