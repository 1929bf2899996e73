//! Error types for the learning workflow
//!
//! Two layers:
//!
//! - [`GenerationError`] - what a collaborator reports. The engine treats it as
//!   opaque and never inspects it beyond its message.
//! - [`WorkflowError`] - what the engine reports to its caller. Every variant
//!   names the stage it came from and, where one applies, the checkpoint.
//!
//! # Error Categories
//!
//! | Kind | Variants | Caller action |
//! |------|----------|---------------|
//! | Fatal | `StructuringFailed`, `ContentGenerationFailed` | restart the run (state is untouched, `run` may be called again) |
//! | Retryable | `EvaluationFailed`, `SimplificationFailed`, `ClarificationFailed`, `BriefFailed` | call `run` again, pre-call fields are intact |
//! | Usage | `AnswerCountMismatch`, `InvalidResumeState`, `Configuration` | fix the call, nothing was mutated |
//!
//! A failed quiz is **not** an error: remediation is an ordinary branch of the
//! state machine.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Failure reported by a collaborator behind a port
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The collaborator rejected or failed the request
    #[error("{0}")]
    Failed(String),

    /// The collaborator answered with something unusable
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The call did not finish within the configured deadline
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Any other error raised by the collaborator implementation
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Content generation failure for a single checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFailure {
    pub checkpoint_id: String,
    pub reason: String,
}

impl fmt::Display for ContentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.checkpoint_id, self.reason)
    }
}

fn join_failures(failures: &[ContentFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the workflow engine
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Structuring call failed or produced no checkpoints
    #[error("Structuring failed: {reason}")]
    StructuringFailed { reason: String },

    /// One or more batch content calls failed; no content was committed
    #[error("Content generation failed for {} checkpoint(s): {}", .failures.len(), join_failures(.failures))]
    ContentGenerationFailed { failures: Vec<ContentFailure> },

    /// Resume payload length differs from the presented question count
    #[error("Expected {expected} answers, got {actual}")]
    AnswerCountMismatch { expected: usize, actual: usize },

    /// Evaluation call failed; score, feedback and verdict are unchanged
    #[error("Evaluation failed for checkpoint '{checkpoint_id}': {reason}")]
    EvaluationFailed {
        checkpoint_id: String,
        reason: String,
    },

    /// Simplification call failed; the checkpoint is still awaiting remediation
    #[error("Simplification failed for checkpoint '{checkpoint_id}': {reason}")]
    SimplificationFailed {
        checkpoint_id: String,
        reason: String,
    },

    /// Resume attempted while the run is not suspended for answers
    #[error("Cannot resume: run is in stage '{stage}', not awaiting answers")]
    InvalidResumeState { stage: String },

    /// Clarification call failed
    #[error("Clarification failed: {reason}")]
    ClarificationFailed { reason: String },

    /// Brief writing call failed
    #[error("Brief writing failed: {reason}")]
    BriefFailed { reason: String },

    /// Engine or session configured inconsistently
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    pub fn evaluation(checkpoint_id: impl Into<String>, error: GenerationError) -> Self {
        Self::EvaluationFailed {
            checkpoint_id: checkpoint_id.into(),
            reason: error.to_string(),
        }
    }

    pub fn simplification(checkpoint_id: impl Into<String>, error: GenerationError) -> Self {
        Self::SimplificationFailed {
            checkpoint_id: checkpoint_id.into(),
            reason: error.to_string(),
        }
    }

    /// Name of the stage the error originated in
    pub fn stage(&self) -> &str {
        match self {
            Self::StructuringFailed { .. } => "structuring",
            Self::ContentGenerationFailed { .. } => "contenting",
            Self::AnswerCountMismatch { .. } => "awaiting_answers",
            Self::EvaluationFailed { .. } => "evaluating",
            Self::SimplificationFailed { .. } => "remediating",
            Self::InvalidResumeState { stage } => stage.as_str(),
            Self::ClarificationFailed { .. } => "clarifying",
            Self::BriefFailed { .. } => "writing_brief",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Checkpoint the error concerns, when there is exactly one
    pub fn checkpoint_id(&self) -> Option<&str> {
        match self {
            Self::EvaluationFailed { checkpoint_id, .. }
            | Self::SimplificationFailed { checkpoint_id, .. } => Some(checkpoint_id.as_str()),
            Self::ContentGenerationFailed { failures } if failures.len() == 1 => {
                Some(failures[0].checkpoint_id.as_str())
            }
            _ => None,
        }
    }

    /// Whether re-driving the run without new input may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EvaluationFailed { .. }
                | Self::SimplificationFailed { .. }
                | Self::ClarificationFailed { .. }
                | Self::BriefFailed { .. }
        )
    }

    /// Whether the run cannot continue past this stage
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StructuringFailed { .. } | Self::ContentGenerationFailed { .. }
        )
    }
}
