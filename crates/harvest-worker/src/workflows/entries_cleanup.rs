// Old-entry cleanup: delete matching entries, then remove their documents
// from the search index in batches of 1000. Dry runs report without
// deleting and skip the index entirely.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{CleanupOldEntries, RemoveDocumentsFromIndex};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

const INDEX_REMOVAL_BATCH: usize = 1000;

pub struct EntriesCleanupWorkflow;

#[async_trait]
impl Workflow for EntriesCleanupWorkflow {
    const TYPE: &'static str = "entries_cleanup";
    type Input = EntriesCleanupInput;
    type Output = EntriesCleanupResult;

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
    input: EntriesCleanupInput,
    progress: &ProgressHandle,
) -> Result<EntriesCleanupResult, WorkflowError> {
    progress
        .step(
            ctx,
            "cleanup",
            format!(
                "{} entries older than {} days",
                if input.dry_run { "Scanning" } else { "Deleting" },
                input.older_than_days
            ),
        )
        .await;

    let cleanup = ctx
        .activity::<CleanupOldEntries>(
            CleanupOldEntriesInput {
                older_than_days: input.older_than_days,
                dry_run: input.dry_run,
            },
            ActivityOptions::long(Duration::from_secs(600)),
        )
        .await?;

    let mut result = EntriesCleanupResult {
        status: "completed".to_string(),
        older_than_days: input.older_than_days,
        ..Default::default()
    };

    if !cleanup.error.is_empty() {
        progress.fail(ctx, cleanup.error.clone()).await;
        result.status = "error".to_string();
        result.error = cleanup.error;
        return Ok(result);
    }

    result.deleted_count = cleanup.deleted_count;
    result.cutoff_date = cleanup.cutoff_date;
    progress.update(|p| p.set_counter("deleted", cleanup.deleted_count as i64));

    // Index removal only applies to real deletions.
    if !input.dry_run && !cleanup.deleted_ids.is_empty() {
        progress
            .step(
                ctx,
                "index",
                format!("Removing {} documents from search index", cleanup.deleted_ids.len()),
            )
            .await;
        for batch in cleanup.deleted_ids.chunks(INDEX_REMOVAL_BATCH) {
            let removed = ctx
                .activity::<RemoveDocumentsFromIndex>(
                    RemoveDocumentsFromIndexInput {
                        document_ids: batch.to_vec(),
                    },
                    ActivityOptions::long(Duration::from_secs(300)),
                )
                .await?;
            if !removed.error.is_empty() {
                warn!(error = %removed.error, "index removal error");
            }
            result.search_removed_count += removed.removed_count;
        }
        let removed = result.search_removed_count;
        progress.update(|p| p.set_counter("searchRemoved", removed as i64));
    }

    let action = if input.dry_run { "Would delete" } else { "Deleted" };
    progress
        .complete(ctx, format!("{action} {} entries", result.deleted_count))
        .await;
    Ok(result)
}
