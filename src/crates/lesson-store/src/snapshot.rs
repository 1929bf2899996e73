//! Snapshot data structures
//!
//! A [`SessionSnapshot`] is one saved copy of a learner session. The payload is
//! opaque to the store; the metadata is kept readable so backends can list
//! and filter history without decoding state.

use crate::serializer::SnapshotFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive information written with every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Workflow stage the session was in when saved
    pub stage: String,

    /// Checkpoint cursor at save time
    pub cursor: usize,

    /// Encoding of the payload
    pub format: SnapshotFormat,

    /// Wall-clock time of the save
    pub saved_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn new(stage: impl Into<String>, cursor: usize, format: SnapshotFormat) -> Self {
        Self {
            stage: stage.into(),
            cursor,
            format,
            saved_at: Utc::now(),
        }
    }
}

/// A stored session state at one version
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Session this snapshot belongs to
    pub session_id: String,

    /// Monotonic per-session version, starting at 1
    pub version: u64,

    pub metadata: SessionMetadata,

    /// Encoded session state
    pub payload: Vec<u8>,
}

impl SessionSnapshot {
    /// Decode the payload with the format recorded in the metadata
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        self.metadata.format.decode(&self.payload)
    }
}
