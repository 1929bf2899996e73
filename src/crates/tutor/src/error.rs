//! Error types for the tutor service
//!
//! Provides a unified error type for session, configuration and report
//! operations.

use lesson_engine::WorkflowError;
use lesson_store::StoreError;
use std::fmt;

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, TutorError>;

/// Main error type for tutor operations
#[derive(Debug)]
pub enum TutorError {
    /// Configuration error
    Config(String),

    /// Workflow engine rejected a call or a collaborator failed
    Workflow(WorkflowError),

    /// A new session stopped on a failure; its state is stored under
    /// `session_id` and can be re-driven with `SessionService::retry`
    Session {
        session_id: String,
        source: WorkflowError,
    },

    /// Session persistence error
    Store(StoreError),

    /// No stored session with this id
    SessionNotFound(String),

    /// Report could not be located or read
    Report(String),

    /// IO error
    Io(std::io::Error),

    /// TOML parse error
    Toml(toml::de::Error),
}

impl TutorError {
    /// The engine error behind this failure, if any
    pub fn workflow(&self) -> Option<&WorkflowError> {
        match self {
            Self::Workflow(err) => Some(err),
            Self::Session { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Stored session the failure belongs to, when the caller could not
    /// otherwise know it
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Session { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

impl fmt::Display for TutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Workflow(err) => write!(f, "Workflow error: {}", err),
            Self::Session { session_id, source } => {
                write!(f, "Session {} failed: {}", session_id, source)
            }
            Self::Store(err) => write!(f, "Storage error: {}", err),
            Self::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            Self::Report(msg) => write!(f, "Report error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Toml(err) => write!(f, "TOML error: {}", err),
        }
    }
}

impl std::error::Error for TutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Workflow(err) => Some(err),
            Self::Session { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Toml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WorkflowError> for TutorError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

impl From<StoreError> for TutorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<std::io::Error> for TutorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for TutorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err)
    }
}
