// Search reindexing: upsert entries with filtered content into the index,
// either an explicit list (ingestion scoping) or the whole corpus in
// cursor-paginated batches.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{GetEntryIdsForIndexing, IndexEntriesBatch};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

const DEFAULT_BATCH_SIZE: usize = 100;

pub struct SearchReindexWorkflow;

#[async_trait]
impl Workflow for SearchReindexWorkflow {
    const TYPE: &'static str = "search_reindex";
    type Input = SearchReindexInput;
    type Output = SearchReindexResult;

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
    input: SearchReindexInput,
    progress: &ProgressHandle,
) -> Result<SearchReindexResult, WorkflowError> {
    let batch_size = if input.batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        input.batch_size
    };
    let mut result = SearchReindexResult {
        status: "completed".to_string(),
        ..Default::default()
    };

    let index_options = ActivityOptions::long(Duration::from_secs(300));

    match input.entry_ids {
        Some(entry_ids) => {
            result.total_count = entry_ids.len() as u32;
            progress.update(|p| p.set_counter("total", entry_ids.len() as i64));
            for chunk in entry_ids.chunks(batch_size) {
                progress
                    .step(ctx, "index", format!("Indexing {} entries", chunk.len()))
                    .await;
                let indexed = ctx
                    .activity::<IndexEntriesBatch>(
                        IndexEntriesBatchInput {
                            entry_ids: chunk.to_vec(),
                        },
                        index_options.clone(),
                    )
                    .await?;
                if !indexed.error.is_empty() {
                    warn!(error = %indexed.error, "index batch error");
                }
                result.indexed_count += indexed.indexed_count;
                let total_indexed = result.indexed_count;
                progress.update(|p| p.set_counter("indexed", total_indexed as i64));
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
                if cursor.is_none() {
                    result.total_count = page.total_count;
                    progress.update(|p| p.set_counter("total", page.total_count as i64));
                }

                progress
                    .step(ctx, "index", format!("Indexing {} entries", page.entry_ids.len()))
                    .await;
                let indexed = ctx
                    .activity::<IndexEntriesBatch>(
                        IndexEntriesBatchInput {
                            entry_ids: page.entry_ids,
                        },
                        index_options.clone(),
                    )
                    .await?;
                if !indexed.error.is_empty() {
                    warn!(error = %indexed.error, "index batch error");
                }
                result.indexed_count += indexed.indexed_count;
                let total_indexed = result.indexed_count;
                progress.update(|p| p.set_counter("indexed", total_indexed as i64));
                progress.notify(ctx).await;

                if !page.has_more {
                    break;
                }
                cursor = page.end_cursor;
            }
        }
    }

    progress
        .complete(ctx, format!("Indexed {} entries", result.indexed_count))
        .await;
    Ok(result)
}
