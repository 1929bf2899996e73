//! Session service
//!
//! [`SessionService`] is the caller side of the workflow engine. For every
//! call it:
//!
//! 1. takes the per-session lock, so two resumes of one session never overlap;
//!    the lock entry is dropped again once no call holds or waits for it
//! 2. loads the latest snapshot
//! 3. drives the engine, re-driving retryable failures under the retry policy
//! 4. saves the resulting state, whether the call succeeded or not
//!
//! The stored snapshot therefore always matches what the engine last saw.

use crate::config::TutorConfig;
use crate::error::{Result, TutorError};
use crate::retry::RetryPolicy;
use lesson_engine::{
    ClarificationPort, GenerationPort, Message, QuizPrompt, RunOutcome, RunStatus,
    WorkflowEngine, WorkflowError, WorkflowState,
};
use lesson_store::{
    FileSessionSaver, InMemorySessionSaver, SessionMetadata, SessionSaver, SnapshotFormat,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

type LockTable = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Held per-session lock
///
/// Dropping it releases the session and removes the table entry when no
/// other call holds a reference to it.
struct SessionLock<'a> {
    table: &'a LockTable,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.table.lock();
        let idle = table
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            table.remove(&self.session_id);
        }
    }
}

/// Result of a service call that drove the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub session_id: String,
    pub status: RunStatus,
}

pub struct SessionService {
    engine: WorkflowEngine,
    saver: Arc<dyn SessionSaver>,
    format: SnapshotFormat,
    retry: RetryPolicy,
    locks: LockTable,
}

impl SessionService {
    pub fn new(engine: WorkflowEngine, saver: Arc<dyn SessionSaver>) -> Self {
        Self {
            engine,
            saver,
            format: SnapshotFormat::default(),
            retry: RetryPolicy::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_format(mut self, format: SnapshotFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build engine, storage backend and retry policy from configuration
    pub async fn from_config(
        config: &TutorConfig,
        port: Arc<dyn GenerationPort>,
        clarifier: Option<Arc<dyn ClarificationPort>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut engine = WorkflowEngine::new(port).with_config(config.engine.to_engine_config());
        if let Some(clarifier) = clarifier {
            engine = engine.with_clarifier(clarifier);
        }

        let saver: Arc<dyn SessionSaver> = match config.storage.backend.as_str() {
            "memory" => Arc::new(InMemorySessionSaver::new()),
            "file" => Arc::new(FileSessionSaver::new(config.storage.resolved_path()?).await?),
            other => {
                return Err(TutorError::Config(format!("unknown storage backend '{}'", other)));
            }
        };

        info!(
            backend = %config.storage.backend,
            format = %config.storage.format,
            "Session service ready"
        );
        Ok(Self::new(engine, saver)
            .with_format(config.storage.snapshot_format()?)
            .with_retry_policy(config.retry.to_policy()))
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Start a session for a finished request
    ///
    /// With clarification enabled the request becomes the opening message of
    /// the conversation instead. When the run stops on a failure the error is
    /// [`TutorError::Session`], carrying the id of the stored session.
    pub async fn begin(&self, report: &str, request: &str) -> Result<Turn> {
        let state = if self.engine.config().clarification {
            WorkflowState::with_conversation(report, vec![Message::human(request)])
        } else {
            WorkflowState::new(report, request)
        };
        self.start(state).await
    }

    /// Start a session from a free-form conversation
    ///
    /// The conversation is clarified into a brief first, so the engine must
    /// have clarification enabled.
    pub async fn begin_with_conversation(
        &self,
        report: &str,
        messages: Vec<Message>,
    ) -> Result<Turn> {
        self.start(WorkflowState::with_conversation(report, messages)).await
    }

    /// A failed start reports [`TutorError::Session`] so the stored state can
    /// still be reached through [`retry`](Self::retry)
    async fn start(&self, mut state: WorkflowState) -> Result<Turn> {
        let session_id = state.session_id().to_string();
        let _lock = self.lock_session(&session_id).await;

        info!(session_id = %session_id, "Starting session");
        let result = self.engine.run(&mut state).await;
        let result = self.redrive(&mut state, result).await;
        match self.finish(&state, result).await {
            Err(TutorError::Workflow(source)) => Err(TutorError::Session { session_id, source }),
            other => other,
        }
    }

    /// Submit answers for the suspended checkpoint
    pub async fn resume(&self, session_id: &str, answers: Vec<String>) -> Result<Turn> {
        let _lock = self.lock_session(session_id).await;

        let mut state = self.load(session_id).await?;
        let result = match self.engine.resume(&mut state, answers).await {
            // Rejected before any mutation, nothing new to store
            Err(
                err @ (WorkflowError::AnswerCountMismatch { .. }
                | WorkflowError::InvalidResumeState { .. }),
            ) => return Err(err.into()),
            other => other,
        };
        let result = self.redrive(&mut state, result).await;
        self.finish(&state, result).await
    }

    /// Re-drive a session that stopped on a collaborator failure
    pub async fn retry(&self, session_id: &str) -> Result<Turn> {
        let _lock = self.lock_session(session_id).await;

        let mut state = self.load(session_id).await?;
        let result = self.engine.run(&mut state).await;
        let result = self.redrive(&mut state, result).await;
        self.finish(&state, result).await
    }

    /// Answer the question a session stopped on and continue
    pub async fn reply_to_clarification(&self, session_id: &str, reply: &str) -> Result<Turn> {
        let _lock = self.lock_session(session_id).await;

        let mut state = self.load(session_id).await?;
        state.reopen_with_reply(reply)?;
        let result = self.engine.run(&mut state).await;
        let result = self.redrive(&mut state, result).await;
        self.finish(&state, result).await
    }

    /// Prompt the session is waiting on, if it is suspended
    pub async fn current_prompt(&self, session_id: &str) -> Result<Option<QuizPrompt>> {
        let state = self.load(session_id).await?;
        Ok(WorkflowEngine::prompt(&state))
    }

    /// Final results, once the session is done
    pub async fn outcome(&self, session_id: &str) -> Result<Option<RunOutcome>> {
        let state = self.load(session_id).await?;
        Ok(WorkflowEngine::outcome(&state))
    }

    /// Latest stored state of a session
    pub async fn state(&self, session_id: &str) -> Result<WorkflowState> {
        self.load(session_id).await
    }

    /// Drop a session and all of its snapshots
    pub async fn abandon(&self, session_id: &str) -> Result<()> {
        let _lock = self.lock_session(session_id).await;

        self.saver.delete_session(session_id).await?;
        info!(session_id = %session_id, "Session abandoned");
        Ok(())
    }

    /// Number of sessions with a call in flight or waiting
    pub fn active_sessions(&self) -> usize {
        self.locks.lock().len()
    }

    async fn lock_session(&self, session_id: &str) -> SessionLock<'_> {
        let mut held = SessionLock {
            table: &self.locks,
            session_id: session_id.to_string(),
            guard: None,
        };
        let lock = self
            .locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        held.guard = Some(lock.lock_owned().await);
        held
    }

    async fn load(&self, session_id: &str) -> Result<WorkflowState> {
        let snapshot = self
            .saver
            .get_latest(session_id)
            .await?
            .ok_or_else(|| TutorError::SessionNotFound(session_id.to_string()))?;
        debug!(
            session_id = %session_id,
            version = snapshot.version,
            stage = %snapshot.metadata.stage,
            "Loaded session"
        );
        Ok(snapshot.decode()?)
    }

    async fn persist(&self, state: &WorkflowState) -> Result<()> {
        let payload = self.format.encode(state)?;
        let metadata = SessionMetadata::new(
            state.stage().name(),
            state.current_checkpoint_index(),
            self.format,
        );
        let snapshot = self.saver.put(state.session_id(), payload, metadata).await?;
        debug!(
            session_id = %state.session_id(),
            version = snapshot.version,
            stage = %state.stage(),
            "Saved session"
        );
        Ok(())
    }

    /// Re-run the engine while the failure is retryable and retries remain
    async fn redrive(
        &self,
        state: &mut WorkflowState,
        first: lesson_engine::Result<RunStatus>,
    ) -> lesson_engine::Result<RunStatus> {
        let mut result = first;
        let mut attempt = 0;
        while let Err(err) = &result {
            if !self.retry.should_retry(attempt, err) {
                break;
            }
            let delay = self.retry.calculate_delay(attempt);
            warn!(
                session_id = %state.session_id(),
                stage = err.stage(),
                attempt = attempt + 1,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after failure"
            );
            // Save the failed stage before backing off
            if let Err(e) = self.persist(state).await {
                warn!(session_id = %state.session_id(), error = %e, "Failed to save session");
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
            result = self.engine.run(state).await;
        }
        result
    }

    async fn finish(
        &self,
        state: &WorkflowState,
        result: lesson_engine::Result<RunStatus>,
    ) -> Result<Turn> {
        self.persist(state).await?;
        match result {
            Ok(status) => Ok(Turn {
                session_id: state.session_id().to_string(),
                status,
            }),
            Err(err) => {
                warn!(
                    session_id = %state.session_id(),
                    stage = err.stage(),
                    error = %err,
                    "Session stopped on failure"
                );
                Err(err.into())
            }
        }
    }
}
