// Incremental knowledge-graph update, without the rebuild's reset step.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{FetchAndAddToGraphBulk, GetEntryIdsForIndexing};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

const DEFAULT_BATCH_SIZE: usize = 20;

pub struct GlobalGraphUpdateWorkflow;

#[async_trait]
impl Workflow for GlobalGraphUpdateWorkflow {
    const TYPE: &'static str = "global_graph_update";
    type Input = GlobalGraphUpdateInput;
    type Output = GlobalGraphUpdateResult;

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
    ActivityOptions::long(Duration::from_secs(7200))
        .with_heartbeat(Duration::from_secs(120))
        .with_retry(RetryPolicy::exponential().with_max_attempts(2))
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: GlobalGraphUpdateInput,
    progress: &ProgressHandle,
) -> Result<GlobalGraphUpdateResult, WorkflowError> {
    let batch_size = if input.batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        input.batch_size
    };
    let mut result = GlobalGraphUpdateResult {
        status: "completed".to_string(),
        ..Default::default()
    };

    match input.entry_ids {
        Some(entry_ids) => {
            progress.update(|p| {
                p.entity_ids = entry_ids.clone();
                p.set_counter("total", entry_ids.len() as i64);
            });
            for chunk in entry_ids.chunks(batch_size) {
                progress
                    .step(ctx, "graph", format!("Adding {} entries to graph", chunk.len()))
                    .await;
                let bulk = ctx
                    .activity::<FetchAndAddToGraphBulk>(
                        FetchAndAddToGraphBulkInput {
                            entry_ids: chunk.to_vec(),
                        },
                        bulk_options(),
                    )
                    .await?;
                if !bulk.error.is_empty() {
                    warn!(error = %bulk.error, "graph batch error");
                }
                result.added_count += bulk.success_count;
                result.skipped_count += bulk.skipped_count;
                let added = result.added_count;
                progress.update(|p| p.set_counter("added", added as i64));
                progress.notify(ctx).await;
            }
        }
        None => {
            let mut cursor: Option<String> = None;
            loop {
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
                progress
                    .step(ctx, "graph", format!("Adding {} entries to graph", page.entry_ids.len()))
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
                    warn!(error = %bulk.error, "graph batch error");
                }
                result.added_count += bulk.success_count;
                result.skipped_count += bulk.skipped_count;
                let added = result.added_count;
                progress.update(|p| p.set_counter("added", added as i64));
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
                "Graph updated: {} added, {} skipped",
                result.added_count, result.skipped_count
            ),
        )
        .await;
    Ok(result)
}
