//! Run a single monitoring pass and print the report.
//!
//! Usage:
//!   govwatch-once                     # govwatch.toml or $CONFIG_FILE
//!   govwatch-once --config path.toml
//!   govwatch-once --mock              # canned proposals instead of the chain APIs
//!
//! Exits non-zero only when the run itself could not happen (config, state
//! store). Per-chain fetch or delivery failures are in the report.

use anyhow::{Context, Result};
use chrono::Utc;
use govwatch::config::{config_path, Config};
use govwatch::monitor::{Monitor, Services};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let mock = args.iter().any(|a| a == "--mock");
    let path = config_path(&args);

    let config = Config::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    govwatch::init_logging(&config.logging);

    let services = Services::from_config(&config).await?;
    let monitor = Monitor::new(Arc::new(config), services);

    let report = monitor.run(mock, Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
