//! Checkpoint model and workflow state
//!
//! Both types are plain data: fields are readable through accessors and only
//! the transition functions in [`crate::transition`] change them. That keeps
//! every mutation in one auditable place.

use crate::error::{Result, WorkflowError};
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum score for a passing attempt
pub const PASS_THRESHOLD: u8 = 70;

/// Number of quiz questions every checkpoint carries
pub const QUESTIONS_PER_CHECKPOINT: usize = 3;

/// One unit of learning and its progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) objective: String,
    pub(crate) study_material: String,
    pub(crate) quiz_questions: Vec<String>,
    pub(crate) user_answers: Vec<String>,
    pub(crate) score: u8,
    pub(crate) passed: bool,
    pub(crate) feedback: String,
    pub(crate) simplified_material: Option<String>,
    pub(crate) attempts: u32,
}

impl Checkpoint {
    pub(crate) fn new(name: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            objective: objective.into(),
            study_material: String::new(),
            quiz_questions: Vec::new(),
            user_answers: Vec::new(),
            score: 0,
            passed: false,
            feedback: String::new(),
            simplified_material: None,
            attempts: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn study_material(&self) -> &str {
        &self.study_material
    }

    pub fn quiz_questions(&self) -> &[String] {
        &self.quiz_questions
    }

    pub fn user_answers(&self) -> &[String] {
        &self.user_answers
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn simplified_material(&self) -> Option<&str> {
        self.simplified_material.as_deref()
    }

    /// Number of evaluated quiz attempts
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Material to present: simplified text when there is any, else the original
    pub fn effective_material(&self) -> &str {
        match self.simplified_material.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => &self.study_material,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.passed
    }

    pub fn has_content(&self) -> bool {
        self.quiz_questions.len() == QUESTIONS_PER_CHECKPOINT
    }
}

/// Who authored a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

/// One turn of the clarification conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Render a conversation as `Human: ...` / `AI: ...` lines
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| match m.role {
            Role::Human => format!("Human: {}", m.content),
            Role::Assistant => format!("AI: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Audit record written every time the run enters a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub stage: String,
    pub cursor: usize,
    pub at: DateTime<Utc>,
}

/// Full state of one learner session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub(crate) session_id: String,
    pub(crate) report: String,
    pub(crate) messages: Vec<Message>,
    pub(crate) research_brief: Option<String>,
    pub(crate) user_request: String,
    pub(crate) checkpoints: Vec<Checkpoint>,
    pub(crate) current_checkpoint_index: usize,
    pub(crate) stage: Stage,
    pub(crate) history: Vec<Transition>,
    pub(crate) created_at: DateTime<Utc>,
}

impl WorkflowState {
    fn blank(report: String, stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            report,
            messages: Vec::new(),
            research_brief: None,
            user_request: String::new(),
            checkpoints: Vec::new(),
            current_checkpoint_index: 0,
            history: vec![Transition {
                stage: stage.name().to_string(),
                cursor: 0,
                at: now,
            }],
            stage,
            created_at: now,
        }
    }

    /// Session driven by a finished request; starts at structuring
    pub fn new(report: impl Into<String>, user_request: impl Into<String>) -> Self {
        let mut state = Self::blank(report.into(), Stage::Structuring);
        state.user_request = user_request.into();
        state
    }

    /// Session that first clarifies a free-form conversation into a brief
    pub fn with_conversation(report: impl Into<String>, messages: Vec<Message>) -> Self {
        let mut state = Self::blank(report.into(), Stage::Clarifying);
        state.messages = messages;
        state
    }

    /// Replace the generated session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Continue a run that stopped to ask a clarifying question
    ///
    /// The reply is appended as a human message and the run goes back to
    /// clarifying. Only valid in the `NeedsClarification` stage.
    pub fn reopen_with_reply(&mut self, reply: impl Into<String>) -> Result<()> {
        if !matches!(self.stage, Stage::NeedsClarification { .. }) {
            return Err(WorkflowError::InvalidResumeState {
                stage: self.stage.name().to_string(),
            });
        }
        self.messages.push(Message::human(reply));
        self.enter(Stage::Clarifying);
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn research_brief(&self) -> Option<&str> {
        self.research_brief.as_deref()
    }

    pub fn user_request(&self) -> &str {
        &self.user_request
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn current_checkpoint_index(&self) -> usize {
        self.current_checkpoint_index
    }

    /// Checkpoint under the cursor, if the run is not past the end
    pub fn current_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.get(self.current_checkpoint_index)
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    pub(crate) fn current_checkpoint_mut(&mut self) -> Option<&mut Checkpoint> {
        self.checkpoints.get_mut(self.current_checkpoint_index)
    }

    /// Move to a new stage and record it
    pub(crate) fn enter(&mut self, stage: Stage) {
        self.history.push(Transition {
            stage: stage.name().to_string(),
            cursor: self.current_checkpoint_index,
            at: Utc::now(),
        });
        self.stage = stage;
    }
}
