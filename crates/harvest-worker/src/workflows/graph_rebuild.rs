// Global knowledge-graph rebuild: optional clean reset, then stream every
// entry with filtered content through bulk graph adds.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{FetchAndAddToGraphBulk, GetEntryIdsForIndexing, ResetGlobalGraph};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

const DEFAULT_BATCH_SIZE: usize = 20;

pub struct GraphRebuildWorkflow;

#[async_trait]
impl Workflow for GraphRebuildWorkflow {
    const TYPE: &'static str = "graph_rebuild";
    type Input = GraphRebuildInput;
    type Output = GraphRebuildResult;

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

fn bulk_options() -> ActivityOptions {
    // Graph extraction is the slowest stage in the system.
    ActivityOptions::long(Duration::from_secs(7200))
        .with_heartbeat(Duration::from_secs(120))
        .with_retry(RetryPolicy::exponential().with_max_attempts(2))
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: GraphRebuildInput,
    progress: &ProgressHandle,
) -> Result<GraphRebuildResult, WorkflowError> {
    let batch_size = if input.batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        input.batch_size
    };
    let mut result = GraphRebuildResult {
        status: "completed".to_string(),
        ..Default::default()
    };

    if input.clean {
        progress.step(ctx, "reset", "Resetting global graph").await;
        let reset = ctx
            .activity::<ResetGlobalGraph>(
                ResetGlobalGraphInput::default(),
                ActivityOptions::long(Duration::from_secs(300)),
            )
            .await?;
        if !reset.success {
            progress.fail(ctx, reset.error.clone()).await;
            result.status = "error".to_string();
            result.error = if reset.error.is_empty() {
                "failed to reset graph".to_string()
            } else {
                reset.error
            };
            return Ok(result);
        }
        result.deleted_count = reset.deleted_count;
        progress.update(|p| p.set_counter("deleted", reset.deleted_count as i64));
    }

    let mut cursor: Option<String> = None;
    let mut batch_num = 0;
    loop {
        batch_num += 1;
        let page = ctx
            .activity::<GetEntryIdsForIndexing>(
                GetEntryIdsForIndexingInput {
                    batch_size: batch_size as u32,
                    after: cursor.clone(),
                },
                ActivityOptions::long(Duration::from_secs(300)),
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
            .step(
                ctx,
                "graph",
                format!("Graph batch {batch_num}: {} entries", page.entry_ids.len()),
            )
            .await;
        let bulk = ctx
            .activity::<FetchAndAddToGraphBulk>(
                FetchAndAddToGraphBulkInput {
                    entry_ids: page.entry_ids,
                },
                bulk_options(),
            )
            .await?;
        if !bulk.error.is_empty() {
            warn!(batch = batch_num, error = %bulk.error, "graph batch error");
        }
        result.added_count += bulk.success_count;
        let added = result.added_count;
        progress.update(|p| p.set_counter("added", added as i64));
        progress.notify(ctx).await;

        if !page.has_more {
            break;
        }
        cursor = page.end_cursor;
    }

    progress
        .complete(
            ctx,
            format!("Graph rebuilt: {} of {} entries added", result.added_count, result.total_count),
        )
        .await;
    Ok(result)
}
