//! Deadlines for collaborator calls

use crate::error::GenerationError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;

/// Await a collaborator call, failing with [`GenerationError::Timeout`] once
/// `deadline` passes. `None` waits indefinitely.
pub async fn with_deadline<F, T>(
    deadline: Option<Duration>,
    operation: F,
) -> Result<T, GenerationError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    match deadline {
        None => operation.await,
        Some(duration) => match tokio_timeout(duration, operation).await {
            Ok(result) => result,
            Err(_elapsed) => Err(GenerationError::Timeout(duration)),
        },
    }
}
