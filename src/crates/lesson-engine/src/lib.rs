//! # lesson-engine - Adaptive checkpoint-and-quiz workflow
//!
//! Turns a source document into an ordered set of learning checkpoints, each
//! gated by a three-question quiz. A failed quiz triggers remediation: the
//! topic is re-explained in simpler terms and the same questions are asked
//! again. The run is a resumable state machine that suspends in exactly one
//! place, while waiting for the learner's answers.
//!
//! ## Core Concepts
//!
//! - [`WorkflowState`] - everything a session needs to continue, serializable at
//!   every stage boundary
//! - [`Checkpoint`] - one topic with its material, quiz and progress
//! - [`GenerationPort`] - the injected collaborator that writes all content
//! - [`WorkflowEngine`] - drives the state through [`Stage`]s
//! - [`BriefFlow`] / [`ClarificationPort`] - optional clarification of a
//!   free-form request before structuring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lesson_engine::testing::ScriptedPort;
//! use lesson_engine::{RunStatus, WorkflowEngine, WorkflowState};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = Arc::new(ScriptedPort::new().with_outline(&["Ownership"]).with_scores(&[85]));
//!     let engine = WorkflowEngine::new(port);
//!     let mut state = WorkflowState::new("...report...", "Learn ownership");
//!
//!     let mut status = engine.run(&mut state).await?;
//!     while let RunStatus::Suspended(prompt) = status {
//!         let answers = vec![String::from("answer"); prompt.expected_answers()];
//!         status = engine.resume(&mut state, answers).await?;
//!     }
//!
//!     if let RunStatus::Completed(outcome) = status {
//!         println!("average score {:.1}", outcome.average_score());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - every checkpoint carries exactly three questions once content exists
//! - `passed` is derived by the engine as `score >= 70`
//! - the checkpoint cursor never moves backwards
//! - a rejected resume never mutates state

mod batch;
pub mod brief;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod outcome;
pub mod port;
pub mod stage;
pub mod testing;
pub mod timeout;
pub mod transition;

pub use brief::{BriefFlow, BriefOutcome};
pub use config::EngineConfig;
pub use engine::WorkflowEngine;
pub use error::{ContentFailure, GenerationError, Result, WorkflowError};
pub use model::{
    transcript, Checkpoint, Message, Role, Transition, WorkflowState, PASS_THRESHOLD,
    QUESTIONS_PER_CHECKPOINT,
};
pub use outcome::{CheckpointSummary, QuizPrompt, RunOutcome, RunStatus};
pub use port::{
    CheckpointOutline, ClarificationPort, ClarifyResponse, ContentRequest, EvaluationRequest,
    Evaluation, GeneratedContent, GenerationPort, SimplifyRequest,
};
pub use stage::Stage;
