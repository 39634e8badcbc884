//! Valkey (Redis-compatible) state store.
//!
//! Data model:
//!   {prefix}:last_checked_proposals        → JSON watermark document
//!   {prefix}:alerted_proposals             → JSON alerted document
//!   {prefix}:voting_end_alerted_proposals  → JSON alerted document
//!
//! No TTLs: alerted ids are permanent.

use super::kv;
use super::{alerted_doc, AlertedMap, StateError, StateStore, Watermarks, DOC_LAST_CHECKED};
use crate::engine::AlertKind;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Valkey-backed state store.
///
/// All keys are namespaced under a configurable prefix so several deployments
/// can share one Valkey. Default prefix: "govwatch".
#[derive(Clone)]
pub struct RedisStateStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisStateStore {
    /// Connect to Valkey/Redis.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, StateError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = url, prefix = prefix, "connected to Valkey");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    /// Build a namespaced key: "{prefix}:{suffix}"
    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    /// Test connectivity.
    pub async fn ping(&self) -> Result<(), StateError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(response = %pong, "Valkey ping");
        Ok(())
    }

    async fn get_doc(&self, doc: &str) -> Result<Option<String>, StateError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(self.key(doc)).await?;
        Ok(json)
    }

    async fn set_doc(&self, doc: &str, json: &str) -> Result<(), StateError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.key(doc), json).await?;
        debug!(doc = doc, bytes = json.len(), "stored state document");
        Ok(())
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn load_watermarks(&self) -> Result<Watermarks, StateError> {
        match self.get_doc(DOC_LAST_CHECKED).await? {
            Some(json) => kv::decode_watermarks(&json),
            None => Ok(Watermarks::new()),
        }
    }

    async fn save_watermarks(&self, watermarks: &Watermarks) -> Result<(), StateError> {
        let json = kv::encode_watermarks(watermarks)?;
        self.set_doc(DOC_LAST_CHECKED, &json).await
    }

    async fn load_alerted(&self, kind: AlertKind) -> Result<AlertedMap, StateError> {
        match self.get_doc(alerted_doc(kind)).await? {
            Some(json) => kv::decode_alerted(&json),
            None => Ok(AlertedMap::new()),
        }
    }

    async fn save_alerted(&self, kind: AlertKind, alerted: &AlertedMap) -> Result<(), StateError> {
        let json = kv::encode_alerted(alerted)?;
        self.set_doc(alerted_doc(kind), &json).await
    }
}
