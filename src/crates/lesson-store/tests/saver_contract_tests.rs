//! Both shipped backends must honor the same SessionSaver contract

use futures::StreamExt;
use lesson_store::{
    FileSessionSaver, InMemorySessionSaver, SessionMetadata, SessionSaver, SnapshotFormat,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FakeState {
    cursor: usize,
    answers: Vec<String>,
}

async fn exercise_contract(saver: Arc<dyn SessionSaver>, format: SnapshotFormat) {
    assert!(saver.get_latest("learner-1").await.unwrap().is_none());

    for cursor in 0..3 {
        let state = FakeState {
            cursor,
            answers: vec![format!("answer-{}", cursor)],
        };
        let payload = format.encode(&state).unwrap();
        let meta = SessionMetadata::new("quizzing", cursor, format);
        let stored = saver.put("learner-1", payload, meta).await.unwrap();
        assert_eq!(stored.version, cursor as u64 + 1);
    }

    let latest = saver.get_latest("learner-1").await.unwrap().unwrap();
    let restored: FakeState = latest.decode().unwrap();
    assert_eq!(restored.cursor, 2);
    assert_eq!(restored.answers, vec!["answer-2".to_string()]);

    let history: Vec<usize> = saver
        .list("learner-1", Some(2))
        .await
        .unwrap()
        .map(|s| s.unwrap().metadata.cursor)
        .collect()
        .await;
    assert_eq!(history, vec![2, 1]);

    saver.delete_session("learner-1").await.unwrap();
    assert!(saver.get_latest("learner-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_in_memory_backend_contract() {
    exercise_contract(Arc::new(InMemorySessionSaver::new()), SnapshotFormat::Json).await;
}

#[tokio::test]
async fn test_file_backend_contract_json() {
    let temp_dir = TempDir::new().unwrap();
    let saver = FileSessionSaver::new(temp_dir.path()).await.unwrap();
    exercise_contract(Arc::new(saver), SnapshotFormat::Json).await;
}

#[tokio::test]
async fn test_file_backend_contract_bincode() {
    let temp_dir = TempDir::new().unwrap();
    let saver = FileSessionSaver::new(temp_dir.path().join("nested/store"))
        .await
        .unwrap();
    exercise_contract(Arc::new(saver), SnapshotFormat::Bincode).await;
}
