//! File-backed session storage
//!
//! Layout on disk:
//!
//! ```text
//! <root>/
//!   <session_id>/
//!     0000000001.json        payload (extension follows the snapshot format)
//!     0000000001.meta.json   metadata, written last
//!     0000000002.bin
//!     0000000002.meta.json
//! ```
//!
//! A version exists once its metadata file exists. Payload and metadata are
//! each written to a temporary file and renamed into place, so a crash
//! mid-write never leaves a half-written version visible. Leftover temporary
//! files are ignored and overwritten by the next write.

use crate::{
    error::{Result, StoreError},
    snapshot::{SessionMetadata, SessionSnapshot},
    traits::{SessionSaver, SnapshotStream},
};
use async_trait::async_trait;
use futures::stream;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

const META_SUFFIX: &str = ".meta.json";
const META_TMP_SUFFIX: &str = ".meta.tmp";

/// Session saver that persists snapshots under a root directory
#[derive(Debug)]
pub struct FileSessionSaver {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionSaver {
    /// Create a saver rooted at `root`, creating the directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id != "."
            && session_id != ".."
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Invalid(format!(
                "session id '{}' is not usable as a directory name",
                session_id
            )));
        }
        Ok(self.root.join(session_id))
    }

    /// Committed versions of a session in ascending order
    async fn versions(&self, dir: &Path) -> Result<Vec<u64>> {
        if !fs::try_exists(dir).await? {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(META_SUFFIX) {
                if let Ok(version) = stem.parse::<u64>() {
                    versions.push(version);
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn read_version(
        &self,
        session_id: &str,
        dir: &Path,
        version: u64,
    ) -> Result<Option<SessionSnapshot>> {
        let meta_path = dir.join(format!("{:010}{}", version, META_SUFFIX));
        if !fs::try_exists(&meta_path).await? {
            return Ok(None);
        }

        let metadata: SessionMetadata = serde_json::from_slice(&fs::read(&meta_path).await?)?;
        let payload_path = dir.join(format!("{:010}.{}", version, metadata.format.extension()));
        let payload = fs::read(&payload_path).await.map_err(|e| {
            StoreError::Storage(format!(
                "payload for {} v{} unreadable: {}",
                session_id, version, e
            ))
        })?;

        Ok(Some(SessionSnapshot {
            session_id: session_id.to_string(),
            version,
            metadata,
            payload,
        }))
    }
}

#[async_trait]
impl SessionSaver for FileSessionSaver {
    async fn put(
        &self,
        session_id: &str,
        payload: Vec<u8>,
        metadata: SessionMetadata,
    ) -> Result<SessionSnapshot> {
        let dir = self.session_dir(session_id)?;
        let _guard = self.write_lock.lock().await;

        fs::create_dir_all(&dir).await?;
        let version = self.versions(&dir).await?.last().map(|v| v + 1).unwrap_or(1);

        let payload_path = dir.join(format!("{:010}.{}", version, metadata.format.extension()));
        let tmp_path = dir.join(format!("{:010}.tmp", version));
        fs::write(&tmp_path, &payload).await?;
        fs::rename(&tmp_path, &payload_path).await?;

        let meta_path = dir.join(format!("{:010}{}", version, META_SUFFIX));
        let meta_tmp_path = dir.join(format!("{:010}{}", version, META_TMP_SUFFIX));
        fs::write(&meta_tmp_path, serde_json::to_vec_pretty(&metadata)?).await?;
        fs::rename(&meta_tmp_path, &meta_path).await?;

        debug!(
            session_id = %session_id,
            version = version,
            stage = %metadata.stage,
            "Snapshot written"
        );

        Ok(SessionSnapshot {
            session_id: session_id.to_string(),
            version,
            metadata,
            payload,
        })
    }

    async fn get_latest(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let dir = self.session_dir(session_id)?;
        match self.versions(&dir).await?.last() {
            Some(&version) => self.read_version(session_id, &dir, version).await,
            None => Ok(None),
        }
    }

    async fn get_version(
        &self,
        session_id: &str,
        version: u64,
    ) -> Result<Option<SessionSnapshot>> {
        let dir = self.session_dir(session_id)?;
        self.read_version(session_id, &dir, version).await
    }

    async fn list(&self, session_id: &str, limit: Option<usize>) -> Result<SnapshotStream> {
        let dir = self.session_dir(session_id)?;
        let mut results = Vec::new();

        for version in self
            .versions(&dir)
            .await?
            .into_iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
        {
            match self.read_version(session_id, &dir, version).await {
                Ok(Some(snapshot)) => results.push(Ok(snapshot)),
                Ok(None) => {}
                Err(e) => results.push(Err(e)),
            }
        }

        Ok(Box::pin(stream::iter(results)))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let dir = self.session_dir(session_id)?;
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(&dir).await? {
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::SnapshotFormat;
    use futures::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshots_survive_new_saver_instance() {
        let temp_dir = TempDir::new().unwrap();

        {
            let saver = FileSessionSaver::new(temp_dir.path()).await.unwrap();
            let meta = SessionMetadata::new("awaiting_answers", 0, SnapshotFormat::Bincode);
            let stored = saver.put("session-1", vec![1, 2, 3], meta).await.unwrap();
            assert_eq!(stored.version, 1);
        }

        let reopened = FileSessionSaver::new(temp_dir.path()).await.unwrap();
        let latest = reopened.get_latest("session-1").await.unwrap().unwrap();
        assert_eq!(latest.payload, vec![1, 2, 3]);
        assert_eq!(latest.metadata.stage, "awaiting_answers");
        assert_eq!(latest.metadata.format, SnapshotFormat::Bincode);
        assert!(temp_dir.path().join("session-1/0000000001.bin").exists());
    }

    #[tokio::test]
    async fn test_versions_and_listing() {
        let temp_dir = TempDir::new().unwrap();
        let saver = FileSessionSaver::new(temp_dir.path()).await.unwrap();

        for cursor in 0..3 {
            let meta = SessionMetadata::new("quizzing", cursor, SnapshotFormat::Json);
            saver.put("s", vec![cursor as u8], meta).await.unwrap();
        }

        let second = saver.get_version("s", 2).await.unwrap().unwrap();
        assert_eq!(second.payload, vec![1]);

        let listed: Vec<u64> = saver
            .list("s", None)
            .await
            .unwrap()
            .map(|s| s.unwrap().version)
            .collect()
            .await;
        assert_eq!(listed, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_interrupted_write_keeps_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let saver = FileSessionSaver::new(temp_dir.path()).await.unwrap();
        let meta = SessionMetadata::new("quizzing", 0, SnapshotFormat::Json);
        saver.put("crashy", vec![7], meta).await.unwrap();

        // A write of version 2 that died before either rename
        let dir = temp_dir.path().join("crashy");
        std::fs::write(dir.join("0000000002.tmp"), b"{\"half").unwrap();
        std::fs::write(dir.join("0000000002.meta.tmp"), b"{\"version\": 2, \"sta").unwrap();

        let latest = saver.get_latest("crashy").await.unwrap().unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.payload, vec![7]);

        let meta = SessionMetadata::new("evaluating", 0, SnapshotFormat::Json);
        let stored = saver.put("crashy", vec![8], meta).await.unwrap();
        assert_eq!(stored.version, 2);
        assert!(!dir.join("0000000002.meta.tmp").exists());

        let latest = saver.get_latest("crashy").await.unwrap().unwrap();
        assert_eq!(latest.payload, vec![8]);
        assert_eq!(latest.metadata.stage, "evaluating");
    }

    #[tokio::test]
    async fn test_rejects_path_like_session_ids() {
        let temp_dir = TempDir::new().unwrap();
        let saver = FileSessionSaver::new(temp_dir.path()).await.unwrap();
        let meta = SessionMetadata::new("quizzing", 0, SnapshotFormat::Json);

        let result = saver.put("../escape", vec![], meta).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_delete_session_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let saver = FileSessionSaver::new(temp_dir.path()).await.unwrap();
        let meta = SessionMetadata::new("done", 1, SnapshotFormat::Json);
        saver.put("gone", vec![0], meta).await.unwrap();

        saver.delete_session("gone").await.unwrap();
        assert!(!temp_dir.path().join("gone").exists());
        assert!(saver.get_latest("gone").await.unwrap().is_none());
        saver.delete_session("gone").await.unwrap();
    }
}
