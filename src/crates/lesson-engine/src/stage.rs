//! Workflow stages
//!
//! The stage is persisted with the session, so a process that restarts between
//! a suspend and a resume picks up exactly where the previous one stopped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a run in the workflow state machine
///
/// ```text
/// Clarifying ──► WritingBrief ──► Structuring ──► Contenting ──► Quizzing ◄──────────┐
///      │                                                           │    │            │
///      ▼                                                           │    ▼            │
/// NeedsClarification                                               │  AwaitingAnswers│
///                                                                  │    │            │
///                                                                  ▼    ▼            │
///                                                                Done  Evaluating ───┤ passed
///                                                                         │          │
///                                                                         ▼          │
///                                                                     Remediating ───┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Deciding whether the learner's request needs a follow-up question
    Clarifying,
    /// Turning the conversation into the brief that drives content
    WritingBrief,
    /// Breaking the report into checkpoints
    Structuring,
    /// Generating material and questions for every checkpoint
    Contenting,
    /// Selecting the checkpoint under the cursor, or finishing
    Quizzing,
    /// Suspended until the learner answers the presented quiz
    AwaitingAnswers { checkpoint_id: String },
    /// Grading the submitted answers
    Evaluating,
    /// Producing simplified material after a failed attempt
    Remediating,
    /// Terminal: the run stopped to ask the learner a question
    NeedsClarification { question: String },
    /// Terminal: every checkpoint passed
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clarifying => "clarifying",
            Self::WritingBrief => "writing_brief",
            Self::Structuring => "structuring",
            Self::Contenting => "contenting",
            Self::Quizzing => "quizzing",
            Self::AwaitingAnswers { .. } => "awaiting_answers",
            Self::Evaluating => "evaluating",
            Self::Remediating => "remediating",
            Self::NeedsClarification { .. } => "needs_clarification",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::NeedsClarification { .. })
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::AwaitingAnswers { .. })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
