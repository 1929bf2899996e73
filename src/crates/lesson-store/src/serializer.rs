//! Serialization protocol for session snapshots
//!
//! The store itself only moves bytes around. Callers pick a [`SnapshotFormat`]
//! and use it to turn their state into a payload and back.

use crate::error::{Result, StoreError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol for serializing and deserializing snapshot payloads
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T>;
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Binary serializer using bincode
///
/// Payload types must avoid self-describing serde features
/// (`#[serde(tag)]`, `untagged`, `skip_serializing_if`).
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn loads<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Encoding recorded alongside every snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Bincode,
}

impl SnapshotFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bincode",
        }
    }

    /// File extension used by file-backed savers
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bin",
        }
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => JsonSerializer.dumps(value),
            Self::Bincode => BincodeSerializer.dumps(value),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            Self::Json => JsonSerializer.loads(data),
            Self::Bincode => BincodeSerializer.loads(data),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "bincode" | "bin" => Ok(Self::Bincode),
            other => Err(StoreError::Invalid(format!(
                "unknown snapshot format '{}'",
                other
            ))),
        }
    }
}
