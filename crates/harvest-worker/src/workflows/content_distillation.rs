// Batch distillation: LLM-selected main-content ranges plus summaries,
// saved back per batch, with optional fire-and-forget summary evaluation.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{DistillEntriesBatch, SaveDistilledEntries};
use crate::models::*;
use crate::trace::batch_trace_id;
use crate::workflows::progress::ProgressHandle;
use crate::workflows::SummarizationEvaluationWorkflow;

const DEFAULT_BATCH_SIZE: usize = 5;

pub struct ContentDistillationWorkflow;

#[async_trait]
impl Workflow for ContentDistillationWorkflow {
    const TYPE: &'static str = "content_distillation";
    type Input = ContentDistillationInput;
    type Output = ContentDistillationResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        progress.update(|p| p.entity_ids = input.entry_ids.clone());
        let outcome = run_inner(&ctx, input, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: ContentDistillationInput,
    progress: &ProgressHandle,
) -> Result<ContentDistillationResult, WorkflowError> {
    let mut result = ContentDistillationResult {
        status: "completed".to_string(),
        ..Default::default()
    };
    if input.entry_ids.is_empty() {
        progress.complete(ctx, "Nothing to distill").await;
        return Ok(result);
    }

    let batch_size = if input.batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        input.batch_size
    };
    let trace_id = batch_trace_id(ctx.workflow_id());
    let total = input.entry_ids.len();
    progress.update(|p| p.set_counter("total", total as i64));

    let mut processed_ids: Vec<String> = Vec::new();
    for (batch_num, chunk) in input.entry_ids.chunks(batch_size).enumerate() {
        progress
            .step(
                ctx,
                "distill",
                format!("Distilling batch {} ({} entries)", batch_num + 1, chunk.len()),
            )
            .await;

        let distilled = ctx
            .activity::<DistillEntriesBatch>(
                DistillEntriesBatchInput {
                    entry_ids: chunk.to_vec(),
                    target_language: input.target_language.clone(),
                    batch_trace_id: trace_id.clone(),
                },
                ActivityOptions::long(Duration::from_secs(600))
                    .with_heartbeat(Duration::from_secs(120))
                    .with_retry(
                        RetryPolicy::exponential()
                            .with_max_attempts(2)
                            .with_initial_interval(Duration::from_secs(5)),
                    ),
            )
            .await?;

        result.failed_count += distilled.failed_count;
        if !distilled.error.is_empty() {
            warn!(batch = batch_num + 1, error = %distilled.error, "distillation batch error");
        }
        if distilled.processed.is_empty() {
            continue;
        }

        processed_ids.extend(distilled.processed.iter().map(|p| p.entry_id.clone()));
        let saved = ctx
            .activity::<SaveDistilledEntries>(
                SaveDistilledEntriesInput {
                    entries: distilled.processed,
                },
                ActivityOptions::long(Duration::from_secs(120)).with_heartbeat(Duration::from_secs(30)),
            )
            .await?;
        if !saved.error.is_empty() {
            warn!(batch = batch_num + 1, error = %saved.error, "distillation save error");
        }

        result.processed_count += saved.saved_count;
        let processed = result.processed_count;
        progress.update(|p| p.set_counter("processed", processed as i64));
        progress.notify(ctx).await;
    }

    // Score the new summaries out of band.
    if input.evaluate && !processed_ids.is_empty() {
        let items = processed_ids
            .into_iter()
            .map(|entry_id| SummarizeItem {
                entry_id,
                trace_id: String::new(),
            })
            .collect();
        let child_id = format!("{}-eval", ctx.workflow_id());
        if let Err(err) = ctx.start_child::<SummarizationEvaluationWorkflow>(
            SummarizationEvaluationInput {
                trace_id: trace_id.clone(),
                items,
            },
            &child_id,
        ) {
            warn!(error = %err, "failed to start summarization evaluation");
        }
    }

    progress
        .complete(
            ctx,
            format!(
                "Distilled {} entries ({} failed)",
                result.processed_count, result.failed_count
            ),
        )
        .await;
    Ok(result)
}
