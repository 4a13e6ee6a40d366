// Search-index pruning: remove documents that no longer have a database row.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{GetOrphanedDocumentIds, RemoveDocumentsFromIndex};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

const REMOVAL_BATCH: usize = 1000;

pub struct SearchPruneWorkflow;

#[async_trait]
impl Workflow for SearchPruneWorkflow {
    const TYPE: &'static str = "search_prune";
    type Input = SearchPruneInput;
    type Output = SearchPruneResult;

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

async fn run_inner(
    ctx: &WorkflowCtx,
    input: SearchPruneInput,
    progress: &ProgressHandle,
) -> Result<SearchPruneResult, WorkflowError> {
    progress.step(ctx, "scan", "Finding orphaned documents").await;

    let orphans = ctx
        .activity::<GetOrphanedDocumentIds>(
            GetOrphanedDocumentIdsInput {
                batch_size: input.batch_size as u32,
            },
            ActivityOptions::long(Duration::from_secs(600)).with_heartbeat(Duration::from_secs(120)),
        )
        .await?;

    let mut result = SearchPruneResult {
        status: "completed".to_string(),
        total_in_index: orphans.total_in_index,
        total_in_db: orphans.total_in_db,
        ..Default::default()
    };

    if !orphans.error.is_empty() {
        progress.fail(ctx, orphans.error.clone()).await;
        result.status = "error".to_string();
        result.error = orphans.error;
        return Ok(result);
    }

    progress.update(|p| {
        p.set_counter("totalInIndex", orphans.total_in_index as i64);
        p.set_counter("totalInDb", orphans.total_in_db as i64);
        p.set_counter("orphaned", orphans.orphaned_ids.len() as i64);
    });

    if orphans.orphaned_ids.is_empty() {
        progress.complete(ctx, "No orphaned documents").await;
        return Ok(result);
    }

    progress
        .step(
            ctx,
            "remove",
            format!("Removing {} orphaned documents", orphans.orphaned_ids.len()),
        )
        .await;
    for batch in orphans.orphaned_ids.chunks(REMOVAL_BATCH) {
        let removed = ctx
            .activity::<RemoveDocumentsFromIndex>(
                RemoveDocumentsFromIndexInput {
                    document_ids: batch.to_vec(),
                },
                ActivityOptions::long(Duration::from_secs(300)),
            )
            .await?;
        if !removed.error.is_empty() {
            warn!(error = %removed.error, "orphan removal error");
        }
        result.removed_count += removed.removed_count;
        let removed_total = result.removed_count;
        progress.update(|p| p.set_counter("removed", removed_total as i64));
        progress.notify(ctx).await;
    }

    progress
        .complete(ctx, format!("Removed {} orphaned documents", result.removed_count))
        .await;
    Ok(result)
}
