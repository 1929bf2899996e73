//! In-memory session storage for development and testing
//!
//! [`InMemorySessionSaver`] keeps every version of every session in a
//! `Arc<RwLock<HashMap>>`. Clones share the same storage, so a saver handed to
//! a service and kept by a test observe the same data. Nothing survives a
//! process restart; use [`FileSessionSaver`](crate::FileSessionSaver) for that.

use crate::{
    error::Result,
    snapshot::{SessionMetadata, SessionSnapshot},
    traits::{SessionSaver, SnapshotStream},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory snapshot storage, keyed by session id
type SnapshotStorage = Arc<RwLock<HashMap<String, Vec<SessionSnapshot>>>>;

/// In-memory session saver
#[derive(Debug, Clone)]
pub struct InMemorySessionSaver {
    storage: SnapshotStorage,
}

impl InMemorySessionSaver {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions being tracked
    pub async fn session_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of snapshots across all sessions
    pub async fn snapshot_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Drop everything (test isolation)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

impl Default for InMemorySessionSaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionSaver for InMemorySessionSaver {
    async fn put(
        &self,
        session_id: &str,
        payload: Vec<u8>,
        metadata: SessionMetadata,
    ) -> Result<SessionSnapshot> {
        let mut storage = self.storage.write().await;
        let entries = storage.entry(session_id.to_string()).or_default();

        let version = entries.last().map(|s| s.version + 1).unwrap_or(1);
        let snapshot = SessionSnapshot {
            session_id: session_id.to_string(),
            version,
            metadata,
            payload,
        };
        entries.push(snapshot.clone());

        Ok(snapshot)
    }

    async fn get_latest(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(session_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn get_version(
        &self,
        session_id: &str,
        version: u64,
    ) -> Result<Option<SessionSnapshot>> {
        let storage = self.storage.read().await;
        Ok(storage.get(session_id).and_then(|entries| {
            entries.iter().find(|s| s.version == version).cloned()
        }))
    }

    async fn list(&self, session_id: &str, limit: Option<usize>) -> Result<SnapshotStream> {
        let storage = self.storage.read().await;
        let results: Vec<Result<SessionSnapshot>> = storage
            .get(session_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .map(Ok)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::pin(stream::iter(results)))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.storage.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::SnapshotFormat;
    use futures::StreamExt;

    fn meta(stage: &str, cursor: usize) -> SessionMetadata {
        SessionMetadata::new(stage, cursor, SnapshotFormat::Json)
    }

    #[tokio::test]
    async fn test_put_assigns_increasing_versions() {
        let saver = InMemorySessionSaver::new();

        let first = saver.put("s1", b"a".to_vec(), meta("quizzing", 0)).await.unwrap();
        let second = saver.put("s1", b"b".to_vec(), meta("evaluating", 0)).await.unwrap();
        let other = saver.put("s2", b"c".to_vec(), meta("structuring", 0)).await.unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(other.version, 1);
        assert_eq!(saver.session_count().await, 2);
        assert_eq!(saver.snapshot_count().await, 3);
    }

    #[tokio::test]
    async fn test_get_latest_and_version() {
        let saver = InMemorySessionSaver::new();
        saver.put("s1", b"old".to_vec(), meta("quizzing", 0)).await.unwrap();
        saver.put("s1", b"new".to_vec(), meta("quizzing", 1)).await.unwrap();

        let latest = saver.get_latest("s1").await.unwrap().unwrap();
        assert_eq!(latest.payload, b"new");
        assert_eq!(latest.metadata.cursor, 1);

        let first = saver.get_version("s1", 1).await.unwrap().unwrap();
        assert_eq!(first.payload, b"old");

        assert!(saver.get_version("s1", 9).await.unwrap().is_none());
        assert!(saver.get_latest("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let saver = InMemorySessionSaver::new();
        for cursor in 0..4 {
            saver
                .put("s1", vec![cursor as u8], meta("quizzing", cursor))
                .await
                .unwrap();
        }

        let versions: Vec<u64> = saver
            .list("s1", Some(2))
            .await
            .unwrap()
            .map(|s| s.unwrap().version)
            .collect()
            .await;
        assert_eq!(versions, vec![4, 3]);

        let empty: Vec<_> = saver.list("missing", None).await.unwrap().collect().await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let saver = InMemorySessionSaver::new();
        saver.put("s1", vec![], meta("done", 2)).await.unwrap();
        saver.put("s2", vec![], meta("done", 2)).await.unwrap();

        saver.delete_session("s1").await.unwrap();
        saver.delete_session("s1").await.unwrap();
        assert!(saver.get_latest("s1").await.unwrap().is_none());
        assert_eq!(saver.session_count().await, 1);

        saver.clear().await;
        assert_eq!(saver.snapshot_count().await, 0);
    }
}
