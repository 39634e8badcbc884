use super::kv;
use super::{alerted_doc, AlertedMap, StateError, StateStore, Watermarks, DOC_LAST_CHECKED};
use crate::engine::AlertKind;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store for mock runs and tests. Documents are kept encoded so
/// the same serialization path as the durable backends is exercised.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw encoded document, if one was saved.
    pub fn document(&self, doc: &str) -> Option<String> {
        self.lock().ok()?.get(doc).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StateError> {
        self.docs
            .lock()
            .map_err(|_| StateError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn read(&self, doc: &str) -> Result<Option<String>, StateError> {
        Ok(self.lock()?.get(doc).cloned())
    }

    fn write(&self, doc: &str, json: String) -> Result<(), StateError> {
        self.lock()?.insert(doc.to_string(), json);
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_watermarks(&self) -> Result<Watermarks, StateError> {
        match self.read(DOC_LAST_CHECKED)? {
            Some(json) => kv::decode_watermarks(&json),
            None => Ok(Watermarks::new()),
        }
    }

    async fn save_watermarks(&self, watermarks: &Watermarks) -> Result<(), StateError> {
        self.write(DOC_LAST_CHECKED, kv::encode_watermarks(watermarks)?)
    }

    async fn load_alerted(&self, kind: AlertKind) -> Result<AlertedMap, StateError> {
        match self.read(alerted_doc(kind))? {
            Some(json) => kv::decode_alerted(&json),
            None => Ok(AlertedMap::new()),
        }
    }

    async fn save_alerted(&self, kind: AlertKind, alerted: &AlertedMap) -> Result<(), StateError> {
        self.write(alerted_doc(kind), kv::encode_alerted(alerted)?)
    }
}
