//! Persisted alert state.
//!
//! Three documents, whatever the backend:
//!   last_checked_proposals        → chain → highest id alerted as new
//!   alerted_proposals             → chain → ids alerted as new
//!   voting_end_alerted_proposals  → chain → ids alerted as nearing vote end
//!
//! A missing document loads as an empty map, never an error.

pub mod file;
pub mod kv;
pub mod memory;
pub mod redis;

use crate::config::{StorageBackend, StorageConfig};
use crate::engine::AlertKind;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use self::redis::RedisStateStore;

/// chain → highest proposal id alerted as new.
pub type Watermarks = BTreeMap<String, u64>;
/// chain → proposal ids already alerted for one event kind.
pub type AlertedMap = BTreeMap<String, BTreeSet<u64>>;

pub const DOC_LAST_CHECKED: &str = "last_checked_proposals";
pub const DOC_ALERTED: &str = "alerted_proposals";
pub const DOC_VOTING_END_ALERTED: &str = "voting_end_alerted_proposals";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode state document: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Document name holding the alerted set for `kind`.
pub fn alerted_doc(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::NewProposal => DOC_ALERTED,
        AlertKind::VotingNearing => DOC_VOTING_END_ALERTED,
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_watermarks(&self) -> Result<Watermarks, StateError>;

    async fn save_watermarks(&self, watermarks: &Watermarks) -> Result<(), StateError>;

    async fn load_alerted(&self, kind: AlertKind) -> Result<AlertedMap, StateError>;

    async fn save_alerted(&self, kind: AlertKind, alerted: &AlertedMap) -> Result<(), StateError>;
}

/// Open the configured backend.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn StateStore>, StateError> {
    let store: Arc<dyn StateStore> = match config.backend {
        StorageBackend::Redis => {
            let store = RedisStateStore::connect(&config.url, &config.prefix).await?;
            store.ping().await?;
            Arc::new(store)
        }
        StorageBackend::File => Arc::new(FileStateStore::new(&config.dir)),
        StorageBackend::Memory => Arc::new(MemoryStateStore::new()),
    };
    Ok(store)
}
