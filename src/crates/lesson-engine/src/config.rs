//! Engine configuration

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Flags that select the workflow variant and bound collaborator calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run the clarify / write-brief sub-flow before structuring
    pub clarification: bool,

    /// Keep simplified material on a checkpoint after it is presented
    ///
    /// When false the remediation text is shown for one attempt and cleared
    /// once that attempt is evaluated.
    pub persist_remediation: bool,

    /// Maximum concurrent content generation calls
    pub content_concurrency: usize,

    /// Deadline for each collaborator call
    pub call_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clarification: false,
            persist_remediation: true,
            content_concurrency: 4,
            call_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clarification(mut self, enabled: bool) -> Self {
        self.clarification = enabled;
        self
    }

    pub fn with_persist_remediation(mut self, enabled: bool) -> Self {
        self.persist_remediation = enabled;
        self
    }

    pub fn with_content_concurrency(mut self, limit: usize) -> Self {
        self.content_concurrency = limit;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.content_concurrency == 0 {
            return Err(WorkflowError::Configuration(
                "content_concurrency must be at least 1".to_string(),
            ));
        }
        if self.call_timeout == Some(Duration::ZERO) {
            return Err(WorkflowError::Configuration(
                "call_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
