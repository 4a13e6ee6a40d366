// Full ingestion run: one SingleFeedIngestion child per feed, bounded by the
// configured concurrency.

use futures::future::join_all;
use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{GetAppSettings, ListFeeds};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;
use crate::workflows::SingleFeedIngestionWorkflow;

pub struct AllFeedsIngestionWorkflow;

#[async_trait]
impl Workflow for AllFeedsIngestionWorkflow {
    const TYPE: &'static str = "all_feeds_ingestion";
    type Input = AllFeedsIngestionInput;
    type Output = AllFeedsIngestionResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        _input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        let outcome = self.run_inner(&ctx, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

impl AllFeedsIngestionWorkflow {
    async fn run_inner(
        &self,
        ctx: &WorkflowCtx,
        progress: &ProgressHandle,
    ) -> Result<AllFeedsIngestionResult, WorkflowError> {
        progress.step(ctx, "settings", "Loading settings").await;
        let settings = ctx
            .activity::<GetAppSettings>(GetAppSettingsInput::default(), ActivityOptions::short())
            .await?;

        let feeds = ctx
            .activity::<ListFeeds>(ListFeedsInput::default(), ActivityOptions::short())
            .await?
            .feeds;
        progress.update(|p| p.set_counter("feeds", feeds.len() as i64));
        progress
            .step(ctx, "ingesting", format!("Ingesting {} feeds", feeds.len()))
            .await;

        let mut result = AllFeedsIngestionResult {
            status: "completed".to_string(),
            ..Default::default()
        };

        // Waves of children keep the fan-out bounded and the replay order
        // stable.
        for wave in feeds.chunks(settings.max_concurrent.max(1)) {
            let children = wave.iter().map(|feed| {
                let ctx = ctx.clone();
                let feed = feed.clone();
                let settings = settings.clone();
                async move {
                    let child_id = format!("{}-feed-{}", ctx.workflow_id(), feed.id);
                    let feed_id = feed.id.clone();
                    let outcome = ctx
                        .child::<SingleFeedIngestionWorkflow>(
                            SingleFeedIngestionInput { feed, settings },
                            &child_id,
                        )
                        .await;
                    (feed_id, outcome)
                }
            });

            for (feed_id, outcome) in join_all(children).await {
                match outcome {
                    Ok(child) => {
                        result.feeds_processed += 1;
                        result.entries_created += child.entries_created;
                    }
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) => {
                        warn!(feed_id = %feed_id, error = %err, "feed ingestion failed");
                        result.failed_feeds += 1;
                    }
                }
            }

            let created = result.entries_created;
            let processed = result.feeds_processed;
            progress.update(|p| {
                p.set_counter("feedsProcessed", processed as i64);
                p.set_counter("entriesCreated", created as i64);
            });
            progress.notify(ctx).await;
        }

        progress
            .complete(
                ctx,
                format!(
                    "Ingested {} feeds, {} new entries",
                    result.feeds_processed, result.entries_created
                ),
            )
            .await;
        Ok(result)
    }
}
