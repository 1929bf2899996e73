//! Collaborator ports
//!
//! The engine owns no content logic. Everything that needs natural-language
//! generation goes through one of two traits:
//!
//! - [`GenerationPort`] - structuring, content authoring, evaluation and
//!   simplification. Required.
//! - [`ClarificationPort`] - the optional clarify / write-brief sub-flow.
//!
//! Implementations are injected into [`WorkflowEngine`](crate::WorkflowEngine)
//! as `Arc<dyn ...>`, which is also how tests substitute scripted fakes
//! (see [`crate::testing`]).
//!
//! ```rust,ignore
//! struct LlmBackedPort { client: MyClient }
//!
//! #[async_trait]
//! impl GenerationPort for LlmBackedPort {
//!     async fn generate_structure(&self, report: &str)
//!         -> Result<Vec<CheckpointOutline>, GenerationError> {
//!         let reply = self.client.structured(report).await
//!             .map_err(|e| GenerationError::failed(e.to_string()))?;
//!         Ok(reply.checkpoints)
//!     }
//!     // ...
//! }
//! ```

use crate::error::GenerationError;
use crate::model::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Name and objective of one checkpoint, as proposed by structuring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointOutline {
    pub name: String,
    pub objective: String,
}

impl CheckpointOutline {
    pub fn new(name: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objective: objective.into(),
        }
    }
}

/// Input for authoring one checkpoint's content
#[derive(Debug, Clone, Copy)]
pub struct ContentRequest<'a> {
    pub report: &'a str,
    pub user_request: &'a str,
    pub checkpoint_id: &'a str,
    pub name: &'a str,
    pub objective: &'a str,
}

/// Material and questions for one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub study_material: String,
    pub quiz_questions: Vec<String>,
}

/// Input for grading one quiz attempt
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub name: &'a str,
    pub quiz_questions: &'a [String],
    pub user_answers: &'a [String],
}

/// Grade reported by the evaluator
///
/// `passed` is advisory: the engine derives the verdict from `score` itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: i32,
    pub feedback: String,
    pub passed: bool,
}

/// Input for re-explaining a topic after a failed attempt
#[derive(Debug, Clone, Copy)]
pub struct SimplifyRequest<'a> {
    pub name: &'a str,
    pub study_material: &'a str,
    pub quiz_questions: &'a [String],
    pub user_answers: &'a [String],
    pub feedback: &'a str,
}

/// The four content-producing operations the engine drives
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Split a report into checkpoints. An empty list aborts the run.
    async fn generate_structure(
        &self,
        report: &str,
    ) -> Result<Vec<CheckpointOutline>, GenerationError>;

    /// Author study material and exactly three questions for one checkpoint
    ///
    /// Called concurrently for distinct checkpoints; implementations must not
    /// depend on call order.
    async fn generate_content(
        &self,
        request: ContentRequest<'_>,
    ) -> Result<GeneratedContent, GenerationError>;

    /// Grade the learner's answers (pass mark is 70)
    async fn evaluate(&self, request: EvaluationRequest<'_>)
        -> Result<Evaluation, GenerationError>;

    /// Produce a plain-language explanation for a learner who failed
    async fn simplify(&self, request: SimplifyRequest<'_>) -> Result<String, GenerationError>;
}

/// Clarification decision reported by the collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyResponse {
    pub need_clarification: bool,
    /// Question for the learner, used when clarification is needed
    pub question: String,
    /// Acknowledgement sent when the request is clear enough
    pub verification: String,
}

/// Operations behind the clarification / brief sub-flow
#[async_trait]
pub trait ClarificationPort: Send + Sync {
    /// Decide whether the conversation needs a follow-up question
    async fn clarify(
        &self,
        messages: &[Message],
        today: &str,
    ) -> Result<ClarifyResponse, GenerationError>;

    /// Condense the conversation into a single brief
    async fn write_brief(&self, messages: &[Message], today: &str)
        -> Result<String, GenerationError>;
}
