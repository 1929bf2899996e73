//! Clarification and brief sub-flow
//!
//! Before a free-form conversation can be structured it is either answered
//! with a follow-up question or condensed into a research brief.
//! [`BriefFlow`] runs that exchange standalone; the engine drives the same
//! steps when [`EngineConfig::clarification`](crate::EngineConfig) is on.

use crate::error::{Result, WorkflowError};
use crate::model::Message;
use crate::port::{ClarificationPort, ClarifyResponse};
use crate::timeout::with_deadline;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;

/// Today's date as handed to the clarification collaborator, e.g. `Mon Jan 6, 2025`
pub fn today() -> String {
    Local::now().format("%a %b %-d, %Y").to_string()
}

/// Result of one pass through the sub-flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BriefOutcome {
    /// The learner must answer a question before a brief can be written
    NeedsClarification { question: String },
    /// The request was clear; `verification` acknowledges it
    Brief { verification: String, brief: String },
}

pub struct BriefFlow {
    port: Arc<dyn ClarificationPort>,
    deadline: Option<Duration>,
}

impl BriefFlow {
    pub fn new(port: Arc<dyn ClarificationPort>) -> Self {
        Self {
            port,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn clarify(&self, messages: &[Message]) -> Result<ClarifyResponse> {
        let today = today();
        with_deadline(self.deadline, self.port.clarify(messages, &today))
            .await
            .map_err(|e| WorkflowError::ClarificationFailed {
                reason: e.to_string(),
            })
    }

    pub async fn write_brief(&self, messages: &[Message]) -> Result<String> {
        let today = today();
        let brief = with_deadline(self.deadline, self.port.write_brief(messages, &today))
            .await
            .map_err(|e| WorkflowError::BriefFailed {
                reason: e.to_string(),
            })?;
        if brief.trim().is_empty() {
            return Err(WorkflowError::BriefFailed {
                reason: "collaborator returned an empty brief".to_string(),
            });
        }
        Ok(brief)
    }

    /// Clarify, then write the brief if no question is needed
    ///
    /// The brief is written from the conversation including the verification
    /// message.
    pub async fn run(&self, messages: &[Message]) -> Result<BriefOutcome> {
        let response = self.clarify(messages).await?;
        if response.need_clarification {
            return Ok(BriefOutcome::NeedsClarification {
                question: response.question,
            });
        }

        let mut conversation = messages.to_vec();
        conversation.push(Message::assistant(response.verification.clone()));
        let brief = self.write_brief(&conversation).await?;
        Ok(BriefOutcome::Brief {
            verification: response.verification,
            brief,
        })
    }
}
