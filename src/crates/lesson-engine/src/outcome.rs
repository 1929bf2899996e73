//! What the engine hands back to its caller
//!
//! - [`QuizPrompt`] - the suspend payload shown to the learner
//! - [`RunStatus`] - where a `run`/`resume` call stopped
//! - [`RunOutcome`] - final results once every checkpoint passed

use crate::model::{Checkpoint, WorkflowState};
use serde::{Deserialize, Serialize};

/// Payload presented when the run suspends for answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPrompt {
    pub checkpoint_id: String,
    pub title: String,
    /// Simplified material after a failed attempt, else the study material
    pub material: String,
    pub questions: Vec<String>,
    /// Zero-based index of the checkpoint
    pub position: usize,
    pub total: usize,
    /// One-based number of the attempt being presented
    pub attempt: u32,
}

impl QuizPrompt {
    pub(crate) fn for_checkpoint(checkpoint: &Checkpoint, position: usize, total: usize) -> Self {
        Self {
            checkpoint_id: checkpoint.id().to_string(),
            title: checkpoint.name().to_string(),
            material: checkpoint.effective_material().to_string(),
            questions: checkpoint.quiz_questions().to_vec(),
            position,
            total,
            attempt: checkpoint.attempts() + 1,
        }
    }

    /// Number of answers the matching resume must carry
    pub fn expected_answers(&self) -> usize {
        self.questions.len()
    }
}

/// Where a call into the engine stopped
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Waiting for the learner's answers
    Suspended(QuizPrompt),
    /// All checkpoints passed
    Completed(RunOutcome),
    /// The run ended early with a question for the learner
    NeedsClarification { question: String },
}

impl RunStatus {
    pub fn prompt(&self) -> Option<&QuizPrompt> {
        match self {
            Self::Suspended(prompt) => Some(prompt),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Per-checkpoint line of a completion report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub name: String,
    pub score: u8,
    pub passed: bool,
    pub feedback: String,
    pub attempts: u32,
    /// Whether the learner needed simplified material on the way
    pub remediated: bool,
}

/// Final results of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub session_id: String,
    pub checkpoints: Vec<Checkpoint>,
}

impl RunOutcome {
    pub(crate) fn from_state(state: &WorkflowState) -> Self {
        Self {
            session_id: state.session_id().to_string(),
            checkpoints: state.checkpoints().to_vec(),
        }
    }

    pub fn summaries(&self) -> Vec<CheckpointSummary> {
        self.checkpoints
            .iter()
            .map(|cp| CheckpointSummary {
                name: cp.name().to_string(),
                score: cp.score(),
                passed: cp.passed(),
                feedback: cp.feedback().to_string(),
                attempts: cp.attempts(),
                remediated: cp.attempts() > 1,
            })
            .collect()
    }

    /// Mean of the final scores, 0.0 for an empty run
    pub fn average_score(&self) -> f64 {
        if self.checkpoints.is_empty() {
            return 0.0;
        }
        let total: u32 = self.checkpoints.iter().map(|cp| cp.score() as u32).sum();
        total as f64 / self.checkpoints.len() as f64
    }

    pub fn total_attempts(&self) -> u32 {
        self.checkpoints.iter().map(|cp| cp.attempts()).sum()
    }
}
