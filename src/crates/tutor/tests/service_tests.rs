//! Session service: persistence, retries and per-session serialization

use lesson_engine::testing::{PortCall, ScriptedClarifier, ScriptedPort};
use lesson_engine::{EngineConfig, RunStatus, Stage, WorkflowEngine, WorkflowError};
use lesson_store::{FileSessionSaver, InMemorySessionSaver, SnapshotFormat};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tutor::{RetryPolicy, SessionService, TutorConfig, TutorError};

const REPORT: &str = "# Rust\nOwnership, borrowing and lifetimes.";

fn answers() -> Vec<String> {
    vec!["one".into(), "two".into(), "three".into()]
}

fn service_with(port: Arc<ScriptedPort>, saver: Arc<InMemorySessionSaver>) -> SessionService {
    SessionService::new(WorkflowEngine::new(port), saver)
        .with_retry_policy(RetryPolicy::none())
}

fn workflow_error(err: &TutorError) -> &WorkflowError {
    err.workflow().unwrap_or_else(|| panic!("expected workflow error, got {err}"))
}

#[tokio::test]
async fn test_session_persists_every_turn() {
    let port = Arc::new(
        ScriptedPort::new()
            .with_outline(&["Ownership", "Borrowing"])
            .with_scores(&[50, 80, 90]),
    );
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = service_with(port, saver.clone());

    let turn = service.begin(REPORT, "Learn ownership").await.unwrap();
    let id = turn.session_id.clone();
    assert_eq!(turn.status.prompt().unwrap().title, "Ownership");
    assert_eq!(saver.snapshot_count().await, 1);

    let turn = service.resume(&id, answers()).await.unwrap();
    assert_eq!(turn.status.prompt().unwrap().attempt, 2);
    assert_eq!(
        service.current_prompt(&id).await.unwrap().unwrap().material,
        "Ownership made simple"
    );

    service.resume(&id, answers()).await.unwrap();
    let turn = service.resume(&id, answers()).await.unwrap();
    assert!(turn.status.is_completed());
    assert_eq!(saver.snapshot_count().await, 4);

    let outcome = service.outcome(&id).await.unwrap().unwrap();
    assert_eq!(outcome.session_id, id);
    assert!(outcome.checkpoints.iter().all(|cp| cp.passed()));
}

#[tokio::test]
async fn test_rejected_resume_is_not_stored() {
    let port = Arc::new(ScriptedPort::new().with_outline(&["Ownership"]).with_scores(&[90]));
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = service_with(port, saver.clone());
    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;

    let err = service.resume(&id, vec!["only one".into()]).await.unwrap_err();
    assert!(matches!(
        workflow_error(&err),
        WorkflowError::AnswerCountMismatch {
            expected: 3,
            actual: 1
        }
    ));
    assert_eq!(saver.snapshot_count().await, 1);
    assert!(service.current_prompt(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(
        ScriptedPort::new()
            .with_outline(&["Ownership", "Borrowing"])
            .with_scores(&[90, 95]),
    );

    let id = {
        let saver = FileSessionSaver::new(dir.path()).await.unwrap();
        let service = SessionService::new(WorkflowEngine::new(port.clone()), Arc::new(saver))
            .with_format(SnapshotFormat::Bincode);
        let id = service.begin(REPORT, "Learn").await.unwrap().session_id;
        service.resume(&id, answers()).await.unwrap();
        id
    };

    let saver = FileSessionSaver::new(dir.path()).await.unwrap();
    let service = SessionService::new(WorkflowEngine::new(port.clone()), Arc::new(saver))
        .with_format(SnapshotFormat::Bincode);

    let prompt = service.current_prompt(&id).await.unwrap().unwrap();
    assert_eq!(prompt.title, "Borrowing");

    let turn = service.resume(&id, answers()).await.unwrap();
    assert!(turn.status.is_completed());
    assert_eq!(port.count_calls(|c| matches!(c, PortCall::Structure)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_evaluation_failure_is_retried() {
    let port = Arc::new(ScriptedPort::new().with_outline(&["Ownership"]).with_scores(&[85]));
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = SessionService::new(WorkflowEngine::new(port.clone()), saver)
        .with_retry_policy(RetryPolicy::new(
            2,
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
        ));
    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;

    port.fail_next_evaluation();
    let turn = service.resume(&id, answers()).await.unwrap();

    assert!(turn.status.is_completed());
    assert_eq!(port.count_calls(|c| matches!(c, PortCall::Evaluate { .. })), 2);
    // Answers were submitted once and reused by the retry
    let answered: Vec<_> = port
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            PortCall::Evaluate { answers, .. } => Some(answers),
            _ => None,
        })
        .collect();
    assert_eq!(answered[0], answered[1]);
}

#[tokio::test]
async fn test_exhausted_retries_leave_session_retryable() {
    let port = Arc::new(ScriptedPort::new().with_outline(&["Ownership"]).with_scores(&[85]));
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = service_with(port.clone(), saver);
    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;

    port.fail_next_evaluation();
    let err = service.resume(&id, answers()).await.unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::EvaluationFailed { .. }));

    let stored = service.state(&id).await.unwrap();
    assert_eq!(stored.stage(), &Stage::Evaluating);
    assert_eq!(stored.checkpoints()[0].user_answers().len(), 3);

    // The stored state no longer accepts answers, only a re-drive
    let err = service.resume(&id, answers()).await.unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::InvalidResumeState { .. }));

    let turn = service.retry(&id).await.unwrap();
    assert!(turn.status.is_completed());
}

#[tokio::test]
async fn test_concurrent_resumes_are_serialized() {
    let port = Arc::new(
        ScriptedPort::new()
            .with_outline(&["Ownership"])
            .with_scores(&[90, 90])
            .with_evaluation_delay(Duration::from_millis(20)),
    );
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = service_with(port.clone(), saver);
    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;

    let (first, second) = tokio::join!(
        service.resume(&id, answers()),
        service.resume(&id, answers())
    );

    let results = [first, second];
    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok(turn) if turn.status.is_completed()))
        .count();
    let rejected = results
        .iter()
        .filter(|r| {
            matches!(r, Err(TutorError::Workflow(WorkflowError::InvalidResumeState { .. })))
        })
        .count();

    assert_eq!(completed, 1);
    assert_eq!(rejected, 1);
    assert_eq!(port.count_calls(|c| matches!(c, PortCall::Evaluate { .. })), 1);
}

#[tokio::test]
async fn test_clarification_round_trip() {
    let port = Arc::new(ScriptedPort::new().with_outline(&["Chapter 2"]).with_scores(&[90]));
    let clarifier = Arc::new(ScriptedClarifier::new().asking("Which chapter?"));
    let engine = WorkflowEngine::new(port)
        .with_clarifier(clarifier)
        .with_config(EngineConfig::new().with_clarification(true));
    let service = SessionService::new(engine, Arc::new(InMemorySessionSaver::new()));

    let turn = service.begin(REPORT, "Teach me this").await.unwrap();
    assert_eq!(
        turn.status,
        RunStatus::NeedsClarification {
            question: "Which chapter?".to_string()
        }
    );

    let turn = service
        .reply_to_clarification(&turn.session_id, "Chapter 2")
        .await
        .unwrap();
    assert_eq!(turn.status.prompt().unwrap().title, "Chapter 2");

    let state = service.state(&turn.session_id).await.unwrap();
    assert_eq!(state.user_request(), "Brief: Chapter 2");
}

#[tokio::test]
async fn test_unknown_and_abandoned_sessions() {
    let port = Arc::new(ScriptedPort::new().with_outline(&["Ownership"]).with_scores(&[90]));
    let service = service_with(port, Arc::new(InMemorySessionSaver::new()));

    let err = service.current_prompt("missing").await.unwrap_err();
    assert!(matches!(err, TutorError::SessionNotFound(ref id) if id == "missing"));

    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;
    service.abandon(&id).await.unwrap();
    assert!(matches!(
        service.resume(&id, answers()).await,
        Err(TutorError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_structuring_failure_is_stored_and_reported() {
    let port = Arc::new(ScriptedPort::new());
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = service_with(port, saver.clone());

    let err = service.begin(REPORT, "Learn").await.unwrap_err();
    assert!(workflow_error(&err).is_fatal());
    assert_eq!(saver.session_count().await, 1);

    let id = err.session_id().unwrap();
    assert_eq!(service.state(id).await.unwrap().stage(), &Stage::Structuring);
}

#[tokio::test]
async fn test_failed_begin_can_be_retried_by_id() {
    let port = Arc::new(
        ScriptedPort::new()
            .with_outline(&["A", "B"])
            .with_scores(&[90, 90])
            .fail_content_for("B"),
    );
    let saver = Arc::new(InMemorySessionSaver::new());
    let service = service_with(port.clone(), saver.clone());

    let err = service.begin(REPORT, "Learn").await.unwrap_err();
    assert!(matches!(
        err,
        TutorError::Session {
            source: WorkflowError::ContentGenerationFailed { .. },
            ..
        }
    ));
    let id = err.session_id().unwrap().to_string();
    assert!(err.to_string().contains(&id));
    assert_eq!(service.state(&id).await.unwrap().stage(), &Stage::Contenting);

    port.clear_content_failures();
    let turn = service.retry(&id).await.unwrap();
    assert_eq!(turn.session_id, id);
    assert_eq!(turn.status.prompt().unwrap().title, "A");

    service.resume(&id, answers()).await.unwrap();
    let turn = service.resume(&id, answers()).await.unwrap();
    assert!(turn.status.is_completed());
    assert_eq!(saver.session_count().await, 1);
}

#[tokio::test]
async fn test_lock_table_is_pruned() {
    let port = Arc::new(ScriptedPort::new().with_outline(&["Ownership"]).with_scores(&[90]));
    let service = service_with(port, Arc::new(InMemorySessionSaver::new()));

    for i in 0..100 {
        let id = format!("unknown-{i}");
        assert!(matches!(
            service.resume(&id, answers()).await,
            Err(TutorError::SessionNotFound(_))
        ));
    }
    assert_eq!(service.active_sessions(), 0);

    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;
    assert_eq!(service.active_sessions(), 0);
    let turn = service.resume(&id, answers()).await.unwrap();
    assert!(turn.status.is_completed());
    assert_eq!(service.active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_call_keeps_lock_entry() {
    let port = Arc::new(
        ScriptedPort::new()
            .with_outline(&["Ownership"])
            .with_scores(&[90])
            .with_evaluation_delay(Duration::from_millis(20)),
    );
    let service = service_with(port, Arc::new(InMemorySessionSaver::new()));
    let id = service.begin(REPORT, "Learn").await.unwrap().session_id;

    let (first, second, _) = tokio::join!(
        service.resume(&id, answers()),
        service.resume(&id, answers()),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(service.active_sessions(), 1);
        }
    );

    assert!(first.is_ok() != second.is_ok());
    assert_eq!(service.active_sessions(), 0);
}

#[tokio::test]
async fn test_from_config_memory_backend() {
    let mut config = TutorConfig::default();
    config.storage.backend = "memory".to_string();
    config.engine.content_concurrency = 1;
    config.retry.max_retries = 0;

    let port = Arc::new(ScriptedPort::new().with_outline(&["A", "B"]).with_scores(&[90, 90]));
    let service = SessionService::from_config(&config, port.clone(), None)
        .await
        .unwrap();
    assert_eq!(service.engine().config().content_concurrency, 1);

    let turn = service.begin(REPORT, "Learn").await.unwrap();
    assert!(turn.status.is_suspended());
    assert_eq!(port.max_concurrent_content(), 1);
}

#[tokio::test]
async fn test_from_config_rejects_invalid_config() {
    let mut config = TutorConfig::default();
    config.storage.format = "xml".to_string();
    let port = Arc::new(ScriptedPort::new());

    assert!(matches!(
        SessionService::from_config(&config, port, None).await,
        Err(TutorError::Config(_))
    ));
}
