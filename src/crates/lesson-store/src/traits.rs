//! Storage trait for session snapshot backends
//!
//! [`SessionSaver`] is the seam between the learning workflow and whatever holds
//! its state between a suspend and the matching resume. Two backends ship with
//! this crate ([`InMemorySessionSaver`](crate::InMemorySessionSaver) and
//! [`FileSessionSaver`](crate::FileSessionSaver)); a database backend only needs
//! to implement the five methods below.
//!
//! # Contract
//!
//! - `put` appends a new version; versions start at 1 and increase by one.
//! - `get_latest` returns the highest version, or `None` for an unknown session.
//! - `list` yields snapshots newest first.
//! - `delete_session` is idempotent.
//!
//! ```rust,ignore
//! use lesson_store::{SessionSaver, SessionMetadata, SnapshotFormat};
//!
//! let meta = SessionMetadata::new("awaiting_answers", 0, SnapshotFormat::Json);
//! let snapshot = saver.put("session-1", payload, meta).await?;
//! assert_eq!(snapshot.version, 1);
//! ```

use crate::error::Result;
use crate::snapshot::{SessionMetadata, SessionSnapshot};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Async stream of snapshots returned by [`SessionSaver::list`]
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<SessionSnapshot>> + Send>>;

/// Persistence backend for learner sessions
#[async_trait]
pub trait SessionSaver: Send + Sync {
    /// Store a new version of a session and return the stored snapshot
    async fn put(
        &self,
        session_id: &str,
        payload: Vec<u8>,
        metadata: SessionMetadata,
    ) -> Result<SessionSnapshot>;

    /// Latest snapshot of a session
    async fn get_latest(&self, session_id: &str) -> Result<Option<SessionSnapshot>>;

    /// A specific version of a session
    async fn get_version(&self, session_id: &str, version: u64)
        -> Result<Option<SessionSnapshot>>;

    /// Snapshot history for a session, newest first
    async fn list(&self, session_id: &str, limit: Option<usize>) -> Result<SnapshotStream>;

    /// Remove every snapshot of a session
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}
