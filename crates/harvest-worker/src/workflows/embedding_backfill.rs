// Embedding backfill: compute and save embeddings, either for an explicit
// entry list (ingestion scoping) or for everything missing one, walked in
// cursor-paginated batches.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{ComputeEmbeddings, GetEntriesForEmbedding};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

const DEFAULT_BATCH_SIZE: usize = 50;

pub struct EmbeddingBackfillWorkflow;

#[async_trait]
impl Workflow for EmbeddingBackfillWorkflow {
    const TYPE: &'static str = "embedding_backfill";
    type Input = EmbeddingBackfillInput;
    type Output = EmbeddingBackfillResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        let outcome = run_inner(&ctx, input, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

fn compute_options() -> ActivityOptions {
    ActivityOptions::long(Duration::from_secs(600))
        .with_heartbeat(Duration::from_secs(120))
        .with_retry(
            RetryPolicy::exponential()
                .with_max_attempts(2)
                .with_initial_interval(Duration::from_secs(5)),
        )
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: EmbeddingBackfillInput,
    progress: &ProgressHandle,
) -> Result<EmbeddingBackfillResult, WorkflowError> {
    let batch_size = if input.batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        input.batch_size
    };
    let mut result = EmbeddingBackfillResult {
        status: "completed".to_string(),
        ..Default::default()
    };

    match input.entry_ids {
        // Scoped: exactly these entries, chunked.
        Some(entry_ids) => {
            result.total_count = entry_ids.len() as u32;
            progress.update(|p| p.set_counter("total", entry_ids.len() as i64));
            for chunk in entry_ids.chunks(batch_size) {
                progress
                    .step(ctx, "embed", format!("Embedding {} entries", chunk.len()))
                    .await;
                let batch = ctx
                    .activity::<ComputeEmbeddings>(
                        ComputeEmbeddingsInput {
                            entry_ids: chunk.to_vec(),
                        },
                        compute_options(),
                    )
                    .await?;
                result.computed_count += batch.computed_count;
                result.saved_count += batch.saved_count;
                if !batch.error.is_empty() {
                    warn!(error = %batch.error, "embedding batch error");
                }
                let saved = result.saved_count;
                progress.update(|p| p.set_counter("saved", saved as i64));
                progress.notify(ctx).await;
            }
        }
        // Unscoped: walk entries missing an embedding.
        None => {
            let mut cursor: Option<String> = None;
            loop {
                let page = ctx
                    .activity::<GetEntriesForEmbedding>(
                        GetEntriesForEmbeddingInput {
                            batch_size: batch_size as u32,
                            after: cursor.clone(),
                        },
                        ActivityOptions::long(Duration::from_secs(120)),
                    )
                    .await?;
                if page.entry_ids.is_empty() {
                    break;
                }
                if cursor.is_none() {
                    result.total_count = page.total_count;
                    progress.update(|p| p.set_counter("total", page.total_count as i64));
                }

                progress
                    .step(ctx, "embed", format!("Embedding {} entries", page.entry_ids.len()))
                    .await;
                let batch = ctx
                    .activity::<ComputeEmbeddings>(
                        ComputeEmbeddingsInput {
                            entry_ids: page.entry_ids,
                        },
                        compute_options(),
                    )
                    .await?;
                result.computed_count += batch.computed_count;
                result.saved_count += batch.saved_count;
                if !batch.error.is_empty() {
                    warn!(error = %batch.error, "embedding batch error");
                }
                let saved = result.saved_count;
                progress.update(|p| p.set_counter("saved", saved as i64));
                progress.notify(ctx).await;

                if !page.has_more {
                    break;
                }
                cursor = page.end_cursor;
            }
        }
    }

    progress
        .complete(
            ctx,
            format!(
                "Embedded {} entries ({} computed)",
                result.saved_count, result.computed_count
            ),
        )
        .await;
    Ok(result)
}
