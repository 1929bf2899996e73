//! # tutor - Running learning sessions
//!
//! Glue between the workflow engine and the outside world:
//!
//! - [`config`] - layered TOML configuration (`~/.tutor/tutor.toml`, then
//!   `./.tutor/tutor.toml`)
//! - [`logging`] - tracing subscriber setup
//! - [`report`] - loading the newest markdown report from a directory
//! - [`retry`] - backoff policy for re-driving failed collaborator calls
//! - [`service`] - [`SessionService`], which serializes calls per session and
//!   persists state after each one
//!
//! ```rust,ignore
//! let config = tutor::config::load_config().await?;
//! tutor::logging::init(&config.logging)?;
//!
//! let report = tutor::report::load_latest_report(&config.reports.directory).await?;
//! let service = SessionService::from_config(&config, port, None).await?;
//!
//! let turn = service.begin(&report, "Focus on chapter 2").await?;
//! if let Some(prompt) = turn.status.prompt() {
//!     let answers = ask_learner(prompt);
//!     service.resume(&turn.session_id, answers).await?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod retry;
pub mod service;

pub use config::{load_config, ConfigLoader, TutorConfig};
pub use error::{Result, TutorError};
pub use retry::RetryPolicy;
pub use service::{SessionService, Turn};
