//! Bounded concurrent content generation
//!
//! One `generate_content` call is issued per checkpoint. At most `limit`
//! calls are in flight at a time; results come back in completion order and
//! are keyed by checkpoint id so the caller can merge them without relying on
//! ordering. Every call runs to completion so all failures are reported
//! together.

use crate::error::{ContentFailure, GenerationError};
use crate::model::Checkpoint;
use crate::port::{ContentRequest, GeneratedContent, GenerationPort};
use crate::timeout::with_deadline;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Per-run inputs shared by every content call
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchContext<'a> {
    pub report: &'a str,
    pub user_request: &'a str,
    pub limit: usize,
    pub deadline: Option<Duration>,
}

/// Outcome of a batch: content for the checkpoints that succeeded, and the
/// failures for those that did not
#[derive(Debug, Default)]
pub(crate) struct BatchResult {
    pub generated: HashMap<String, GeneratedContent>,
    pub failures: Vec<ContentFailure>,
}

pub(crate) async fn generate_all(
    port: &dyn GenerationPort,
    checkpoints: &[Checkpoint],
    ctx: BatchContext<'_>,
) -> BatchResult {
    let total = checkpoints.len();
    let semaphore = Semaphore::new(ctx.limit.max(1));
    let mut tasks = FuturesUnordered::new();

    for (idx, cp) in checkpoints.iter().enumerate() {
        let semaphore = &semaphore;
        tasks.push(async move {
            let result = match semaphore.acquire().await {
                Ok(_permit) => {
                    tracing::debug!(
                        checkpoint_id = %cp.id(),
                        task = idx + 1,
                        total,
                        "Generating checkpoint content"
                    );
                    let request = ContentRequest {
                        report: ctx.report,
                        user_request: ctx.user_request,
                        checkpoint_id: cp.id(),
                        name: cp.name(),
                        objective: cp.objective(),
                    };
                    with_deadline(ctx.deadline, port.generate_content(request)).await
                }
                Err(_) => Err(GenerationError::failed("content semaphore closed")),
            };
            (cp.id().to_string(), result)
        });
    }

    let mut batch = BatchResult::default();
    while let Some((checkpoint_id, result)) = tasks.next().await {
        match result {
            Ok(content) => {
                batch.generated.insert(checkpoint_id, content);
            }
            Err(e) => {
                tracing::warn!(checkpoint_id = %checkpoint_id, error = %e, "Content generation failed");
                batch.failures.push(ContentFailure {
                    checkpoint_id,
                    reason: e.to_string(),
                });
            }
        }
    }
    batch
}
