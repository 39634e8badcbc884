//! JSON-file state store: one `{doc}.json` per document under a directory.
//! Writes go to a temp file that is fsynced before being renamed into place,
//! and the directory is fsynced after the rename. A crash at any point leaves
//! either the previous document or the new one, never a torn file.

use super::kv;
use super::{alerted_doc, AlertedMap, StateError, StateStore, Watermarks, DOC_LAST_CHECKED};
use crate::engine::AlertKind;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, doc: &str) -> PathBuf {
        self.dir.join(format!("{doc}.json"))
    }

    fn tmp_path(&self, doc: &str) -> PathBuf {
        self.dir.join(format!(".{doc}.json.tmp"))
    }

    /// Persist the rename itself. Directories cannot be opened for sync on Windows.
    #[cfg(unix)]
    async fn sync_dir(&self) -> Result<(), StateError> {
        tokio::fs::File::open(&self.dir).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> Result<(), StateError> {
        Ok(())
    }

    async fn read_doc(&self, doc: &str) -> Result<Option<String>, StateError> {
        match tokio::fs::read_to_string(self.path(doc)).await {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_doc(&self, doc: &str, json: &str) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.path(doc);
        let tmp = self.tmp_path(doc);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        // Data on disk BEFORE the rename makes it visible
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &target).await?;
        self.sync_dir().await?;
        debug!(path = %target.display(), "wrote state document");
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load_watermarks(&self) -> Result<Watermarks, StateError> {
        match self.read_doc(DOC_LAST_CHECKED).await? {
            Some(json) => kv::decode_watermarks(&json),
            None => Ok(Watermarks::new()),
        }
    }

    async fn save_watermarks(&self, watermarks: &Watermarks) -> Result<(), StateError> {
        let json = kv::encode_watermarks(watermarks)?;
        self.write_doc(DOC_LAST_CHECKED, &json).await
    }

    async fn load_alerted(&self, kind: AlertKind) -> Result<AlertedMap, StateError> {
        match self.read_doc(alerted_doc(kind)).await? {
            Some(json) => kv::decode_alerted(&json),
            None => Ok(AlertedMap::new()),
        }
    }

    async fn save_alerted(&self, kind: AlertKind, alerted: &AlertedMap) -> Result<(), StateError> {
        let json = kv::encode_alerted(alerted)?;
        self.write_doc(alerted_doc(kind), &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_documents_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("never-created"));

        assert!(store.load_watermarks().await.unwrap().is_empty());
        assert!(store
            .load_alerted(AlertKind::VotingNearing)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_documents_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let mut watermarks = Watermarks::new();
        watermarks.insert("Juno".to_string(), 7);
        store.save_watermarks(&watermarks).await.unwrap();

        let mut new_alerted = AlertedMap::new();
        new_alerted.entry("Juno".to_string()).or_default().insert(7);
        store
            .save_alerted(AlertKind::NewProposal, &new_alerted)
            .await
            .unwrap();

        assert_eq!(store.load_watermarks().await.unwrap(), watermarks);
        assert_eq!(
            store.load_alerted(AlertKind::NewProposal).await.unwrap(),
            new_alerted
        );
        assert!(store
            .load_alerted(AlertKind::VotingNearing)
            .await
            .unwrap()
            .is_empty());
        assert!(dir.path().join("alerted_proposals.json").exists());
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_replaced_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let mut watermarks = Watermarks::new();
        watermarks.insert("Juno".to_string(), 3);
        store.save_watermarks(&watermarks).await.unwrap();

        // Leftover from an interrupted write
        let tmp = store.tmp_path(DOC_LAST_CHECKED);
        std::fs::write(&tmp, "{\"proposals\":[{\"key\":\"Ju").unwrap();

        watermarks.insert("Juno".to_string(), 4);
        store.save_watermarks(&watermarks).await.unwrap();

        assert!(!tmp.exists());
        assert_eq!(store.load_watermarks().await.unwrap()["Juno"], 4);
        let on_disk = std::fs::read_to_string(dir.path().join("last_checked_proposals.json")).unwrap();
        assert_eq!(on_disk, kv::encode_watermarks(&watermarks).unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("last_checked_proposals.json"), "{oops").unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(matches!(
            store.load_watermarks().await,
            Err(StateError::Decode(_))
        ));
    }
}
