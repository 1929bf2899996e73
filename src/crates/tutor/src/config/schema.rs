//! Configuration schema for the tutor service

use crate::error::{Result, TutorError};
use crate::retry::RetryPolicy;
use lesson_engine::EngineConfig;
use lesson_store::SnapshotFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main tutor configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TutorConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub reports: ReportsSection,
}

/// One configuration file as written on disk
///
/// Sections absent from the file stay `None` so they do not override an
/// earlier layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    pub engine: Option<EngineSection>,
    pub storage: Option<StorageSection>,
    pub retry: Option<RetrySection>,
    pub logging: Option<LoggingSection>,
    pub reports: Option<ReportsSection>,
}

/// Workflow variant and collaborator limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Clarify a free-form request into a brief before structuring
    pub clarification: bool,

    /// Keep simplified material after the checkpoint is retried
    pub persist_remediation: bool,

    /// Maximum concurrent content generation calls
    pub content_concurrency: usize,

    /// Per-call collaborator deadline in seconds
    pub call_timeout_secs: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            clarification: false,
            persist_remediation: true,
            content_concurrency: 4,
            call_timeout_secs: None,
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new()
            .with_clarification(self.clarification)
            .with_persist_remediation(self.persist_remediation)
            .with_content_concurrency(self.content_concurrency);
        if let Some(secs) = self.call_timeout_secs {
            config = config.with_call_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Where and how session snapshots are stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Storage backend: "memory" or "file"
    pub backend: String,

    /// Root directory for the file backend (relative to ~/.tutor or absolute)
    pub path: String,

    /// Snapshot encoding: "json" or "bincode"
    pub format: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            path: "sessions".to_string(),
            format: "json".to_string(),
        }
    }
}

impl StorageSection {
    pub fn snapshot_format(&self) -> Result<SnapshotFormat> {
        self.format
            .parse::<SnapshotFormat>()
            .map_err(|e| TutorError::Config(format!("invalid storage format: {}", e)))
    }

    /// Resolved storage directory
    ///
    /// Relative paths are resolved against ~/.tutor.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        let path = PathBuf::from(&self.path);
        if path.is_absolute() {
            return Ok(path);
        }
        dirs::home_dir()
            .map(|home| home.join(".tutor").join(path))
            .ok_or_else(|| TutorError::Config("cannot determine home directory".to_string()))
    }
}

/// Caller-side retry of failed evaluation and remediation calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetrySection {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.multiplier,
        )
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level or filter directive, e.g. "info" or "lesson_engine=debug"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsSection {
    /// Directory searched for the newest markdown report
    pub directory: String,
}

impl Default for ReportsSection {
    fn default() -> Self {
        Self {
            directory: "reports".to_string(),
        }
    }
}

const BACKENDS: &[&str] = &["memory", "file"];
const LOG_FORMATS: &[&str] = &["compact", "pretty", "json"];

impl TutorConfig {
    /// Apply a layer on top of this config; sections present in the layer
    /// replace the current ones
    pub fn merge(&mut self, layer: ConfigLayer) {
        if let Some(engine) = layer.engine {
            self.engine = engine;
        }
        if let Some(storage) = layer.storage {
            self.storage = storage;
        }
        if let Some(retry) = layer.retry {
            self.retry = retry;
        }
        if let Some(logging) = layer.logging {
            self.logging = logging;
        }
        if let Some(reports) = layer.reports {
            self.reports = reports;
        }
    }

    /// Resolve `${VAR_NAME}` values in string fields from the environment
    pub fn resolve_env_vars(&mut self) {
        self.resolve_vars_with(|name| std::env::var(name).ok());
    }

    fn resolve_vars_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for field in [
            &mut self.storage.path,
            &mut self.storage.backend,
            &mut self.logging.level,
            &mut self.reports.directory,
        ] {
            *field = Self::expand_var(field, &lookup);
        }
    }

    /// Unset variables leave the value unchanged
    fn expand_var(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
        value
            .strip_prefix("${")
            .and_then(|v| v.strip_suffix('}'))
            .and_then(|name| lookup(name))
            .unwrap_or_else(|| value.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.content_concurrency == 0 {
            return Err(TutorError::Config(
                "engine.content_concurrency must be at least 1".to_string(),
            ));
        }
        if self.engine.call_timeout_secs == Some(0) {
            return Err(TutorError::Config(
                "engine.call_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(TutorError::Config(format!(
                "unknown storage backend '{}' (expected one of: {})",
                self.storage.backend,
                BACKENDS.join(", ")
            )));
        }
        self.storage.snapshot_format()?;
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(TutorError::Config(format!(
                "unknown log format '{}' (expected one of: {})",
                self.logging.format,
                LOG_FORMATS.join(", ")
            )));
        }
        if self.retry.multiplier < 1.0 {
            return Err(TutorError::Config(
                "retry.multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
