//! Workflow engine
//!
//! [`WorkflowEngine`] drives a [`WorkflowState`] from its current stage until
//! the run either suspends for answers, finishes, or stops to ask a
//! clarifying question.
//!
//! See [`Stage`] for the full transition graph.
//!
//! The state is the only thing that survives between calls. It can be
//! serialized at any stage boundary and handed to a fresh engine in another
//! process; `run` continues from wherever it stopped.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = WorkflowEngine::new(port).with_config(EngineConfig::default());
//! let mut state = WorkflowState::new(report, "Learn the key ideas");
//!
//! let mut status = engine.run(&mut state).await?;
//! while let RunStatus::Suspended(prompt) = status {
//!     let answers = ask_learner(&prompt);
//!     status = engine.resume(&mut state, answers).await?;
//! }
//! ```

use crate::batch::{self, BatchContext};
use crate::brief::BriefFlow;
use crate::config::EngineConfig;
use crate::error::{Result, WorkflowError};
use crate::model::WorkflowState;
use crate::outcome::{QuizPrompt, RunOutcome, RunStatus};
use crate::port::{ClarificationPort, EvaluationRequest, GenerationPort, SimplifyRequest};
use crate::stage::Stage;
use crate::timeout::with_deadline;
use crate::transition;
use std::sync::Arc;

pub struct WorkflowEngine {
    port: Arc<dyn GenerationPort>,
    clarifier: Option<Arc<dyn ClarificationPort>>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(port: Arc<dyn GenerationPort>) -> Self {
        Self {
            port,
            clarifier: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clarifier(mut self, clarifier: Arc<dyn ClarificationPort>) -> Self {
        self.clarifier = Some(clarifier);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drive the run until it suspends, completes or needs clarification
    ///
    /// Calling `run` on a suspended state returns the same prompt again
    /// without side effects. After a collaborator failure the state is left
    /// at the failing stage, so calling `run` again retries exactly that
    /// step.
    #[tracing::instrument(skip(self, state), fields(session_id = %state.session_id()))]
    pub async fn run(&self, state: &mut WorkflowState) -> Result<RunStatus> {
        self.check_ready()?;
        loop {
            if let Some(status) = self.step(state).await? {
                return Ok(status);
            }
        }
    }

    /// Submit answers for the suspended checkpoint and continue the run
    ///
    /// Rejects with [`WorkflowError::InvalidResumeState`] unless the run is
    /// awaiting answers, and with [`WorkflowError::AnswerCountMismatch`] when
    /// the answer count differs from the question count. Neither rejection
    /// mutates the state.
    pub async fn resume(
        &self,
        state: &mut WorkflowState,
        answers: Vec<String>,
    ) -> Result<RunStatus> {
        self.check_ready()?;
        transition::apply_answers(state, answers)?;
        tracing::debug!(
            session_id = %state.session_id(),
            cursor = state.current_checkpoint_index(),
            "Answers recorded"
        );
        self.run(state).await
    }

    /// Prompt of a suspended run
    pub fn prompt(state: &WorkflowState) -> Option<QuizPrompt> {
        transition::pending_prompt(state)
    }

    /// Results of a finished run
    pub fn outcome(state: &WorkflowState) -> Option<RunOutcome> {
        state.is_complete().then(|| RunOutcome::from_state(state))
    }

    fn check_ready(&self) -> Result<()> {
        self.config.validate()?;
        if self.config.clarification && self.clarifier.is_none() {
            return Err(WorkflowError::Configuration(
                "clarification is enabled but no clarification port was supplied".to_string(),
            ));
        }
        Ok(())
    }

    /// The clarification sub-flow only runs when the config enables it,
    /// whatever constructor built the state
    fn brief_flow(&self, stage: &Stage) -> Result<BriefFlow> {
        if !self.config.clarification {
            return Err(WorkflowError::Configuration(format!(
                "run is at {} but clarification is disabled",
                stage
            )));
        }
        let clarifier = self.clarifier.clone().ok_or_else(|| {
            WorkflowError::Configuration(
                "run is clarifying but no clarification port was supplied".to_string(),
            )
        })?;
        Ok(BriefFlow::new(clarifier).with_deadline(self.config.call_timeout))
    }

    /// Execute one stage. `Some` means control returns to the caller.
    async fn step(&self, state: &mut WorkflowState) -> Result<Option<RunStatus>> {
        let deadline = self.config.call_timeout;
        tracing::debug!(
            stage = %state.stage(),
            cursor = state.current_checkpoint_index(),
            "Entering stage"
        );

        match state.stage().clone() {
            Stage::Clarifying => {
                let response = self
                    .brief_flow(state.stage())?
                    .clarify(state.messages())
                    .await?;
                transition::apply_clarification(state, response);
                Ok(None)
            }

            Stage::WritingBrief => {
                let brief = self
                    .brief_flow(state.stage())?
                    .write_brief(state.messages())
                    .await?;
                transition::apply_brief(state, brief)?;
                tracing::info!(session_id = %state.session_id(), "Research brief written");
                Ok(None)
            }

            Stage::NeedsClarification { question } => {
                tracing::info!(session_id = %state.session_id(), "Run needs clarification");
                Ok(Some(RunStatus::NeedsClarification { question }))
            }

            Stage::Structuring => {
                if state.user_request().trim().is_empty() {
                    return Err(WorkflowError::Configuration(
                        "user request must be set before structuring".to_string(),
                    ));
                }
                let outlines = with_deadline(deadline, self.port.generate_structure(state.report()))
                    .await
                    .map_err(|e| WorkflowError::StructuringFailed {
                        reason: e.to_string(),
                    })?;
                transition::apply_structure(state, outlines)?;
                tracing::info!(
                    session_id = %state.session_id(),
                    checkpoints = state.checkpoints().len(),
                    "Checkpoints structured"
                );
                Ok(None)
            }

            Stage::Contenting => {
                let ctx = BatchContext {
                    report: state.report(),
                    user_request: state.user_request(),
                    limit: self.config.content_concurrency,
                    deadline,
                };
                let mut result =
                    batch::generate_all(self.port.as_ref(), state.checkpoints(), ctx).await;
                if !result.failures.is_empty() {
                    let order = |id: &str| {
                        state
                            .checkpoints()
                            .iter()
                            .position(|cp| cp.id() == id)
                            .unwrap_or(usize::MAX)
                    };
                    result
                        .failures
                        .sort_by_key(|f| order(f.checkpoint_id.as_str()));
                    return Err(WorkflowError::ContentGenerationFailed {
                        failures: result.failures,
                    });
                }
                transition::apply_content(state, result.generated)?;
                tracing::info!(session_id = %state.session_id(), "Checkpoint content generated");
                Ok(None)
            }

            Stage::Quizzing => match transition::present(state) {
                Some(prompt) => {
                    tracing::info!(
                        session_id = %state.session_id(),
                        checkpoint_id = %prompt.checkpoint_id,
                        cursor = prompt.position,
                        attempt = prompt.attempt,
                        "Suspended for answers"
                    );
                    Ok(Some(RunStatus::Suspended(prompt)))
                }
                None => Ok(None),
            },

            Stage::AwaitingAnswers { checkpoint_id } => transition::pending_prompt(state)
                .map(|prompt| Some(RunStatus::Suspended(prompt)))
                .ok_or_else(|| {
                    WorkflowError::Configuration(format!(
                        "awaiting answers for '{}' but the cursor does not point at it",
                        checkpoint_id
                    ))
                }),

            Stage::Evaluating => {
                let (checkpoint_id, evaluation) = {
                    let cp = state.current_checkpoint().ok_or_else(|| {
                        WorkflowError::Configuration("evaluating past the last checkpoint".to_string())
                    })?;
                    let request = EvaluationRequest {
                        name: cp.name(),
                        quiz_questions: cp.quiz_questions(),
                        user_answers: cp.user_answers(),
                    };
                    let evaluation = with_deadline(deadline, self.port.evaluate(request))
                        .await
                        .map_err(|e| WorkflowError::evaluation(cp.id(), e))?;
                    (cp.id().to_string(), evaluation)
                };
                let verdict =
                    transition::apply_evaluation(state, evaluation, self.config.persist_remediation)?;
                tracing::info!(
                    session_id = %state.session_id(),
                    checkpoint_id = %checkpoint_id,
                    score = verdict.score,
                    passed = verdict.passed,
                    "Attempt evaluated"
                );
                Ok(None)
            }

            Stage::Remediating => {
                let material = {
                    let cp = state.current_checkpoint().ok_or_else(|| {
                        WorkflowError::Configuration("remediating past the last checkpoint".to_string())
                    })?;
                    let request = SimplifyRequest {
                        name: cp.name(),
                        study_material: cp.study_material(),
                        quiz_questions: cp.quiz_questions(),
                        user_answers: cp.user_answers(),
                        feedback: cp.feedback(),
                    };
                    with_deadline(deadline, self.port.simplify(request))
                        .await
                        .map_err(|e| WorkflowError::simplification(cp.id(), e))?
                };
                transition::apply_simplification(state, material)?;
                tracing::debug!(
                    session_id = %state.session_id(),
                    cursor = state.current_checkpoint_index(),
                    "Simplified material ready"
                );
                Ok(None)
            }

            Stage::Done => {
                tracing::info!(session_id = %state.session_id(), "Run complete");
                Ok(Some(RunStatus::Completed(RunOutcome::from_state(state))))
            }
        }
    }
}
