//! Governance proposal watcher for Cosmos chains.
//!
//! Polls each configured chain's gov module, alerts Discord once per new
//! proposal and once when a voting period is about to close, and keeps the
//! "already alerted" bookkeeping in a persistent store.

pub mod config;
pub mod engine;
pub mod monitor;
pub mod notify;
pub mod proposal;
pub mod server;
pub mod store;
#[cfg(test)]
mod testing;

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init_logging(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }
}
