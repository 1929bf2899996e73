//! # lesson-store - Session persistence for learning workflows
//!
//! A learning session suspends every time it waits for quiz answers. Between
//! that suspend and the matching resume the process may restart, so the
//! session state has to live somewhere else. This crate provides that
//! somewhere.
//!
//! ## Core Concepts
//!
//! - [`SessionSaver`] - async trait implemented by storage backends
//! - [`SessionSnapshot`] - one stored version of a session (opaque payload + metadata)
//! - [`SessionMetadata`] - stage, cursor, encoding and save time
//! - [`SnapshotFormat`] - JSON or bincode encoding for payloads
//!
//! ## Backends
//!
//! - [`InMemorySessionSaver`] - tests and single-process use
//! - [`FileSessionSaver`] - one directory per session, survives restarts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lesson_store::{InMemorySessionSaver, SessionMetadata, SessionSaver, SnapshotFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = InMemorySessionSaver::new();
//!     let format = SnapshotFormat::Json;
//!
//!     let payload = format.encode(&vec!["state"; 2])?;
//!     let meta = SessionMetadata::new("awaiting_answers", 0, format);
//!     saver.put("session-123", payload, meta).await?;
//!
//!     if let Some(snapshot) = saver.get_latest("session-123").await? {
//!         let restored: Vec<String> = snapshot.decode()?;
//!         println!("v{} -> {:?}", snapshot.version, restored);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod serializer;
pub mod snapshot;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::FileSessionSaver;
pub use memory::InMemorySessionSaver;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol, SnapshotFormat};
pub use snapshot::{SessionMetadata, SessionSnapshot};
pub use traits::{SessionSaver, SnapshotStream};
