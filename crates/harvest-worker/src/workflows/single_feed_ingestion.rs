// Per-feed ingestion: crawl, then drive every derived artifact for the new
// entries through child workflows. A failed stage logs and moves on; the
// pipeline prefers partial results over aborting the feed.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::CrawlSingleFeed;
use crate::models::*;
use crate::workflows::progress::ProgressHandle;
use crate::workflows::{
    ContentDistillationWorkflow, DomainFetchWorkflow, EmbeddingBackfillWorkflow,
    GlobalGraphUpdateWorkflow, SearchReindexWorkflow, TranslationWorkflow,
};

pub struct SingleFeedIngestionWorkflow;

#[async_trait]
impl Workflow for SingleFeedIngestionWorkflow {
    const TYPE: &'static str = "single_feed_ingestion";
    type Input = SingleFeedIngestionInput;
    type Output = SingleFeedIngestionResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        progress.update(|p| p.entity_ids = vec![input.feed.id.clone()]);
        let outcome = self.run_inner(&ctx, input, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

impl SingleFeedIngestionWorkflow {
    async fn run_inner(
        &self,
        ctx: &WorkflowCtx,
        input: SingleFeedIngestionInput,
        progress: &ProgressHandle,
    ) -> Result<SingleFeedIngestionResult, WorkflowError> {
        let feed = input.feed;
        let settings = input.settings;
        let mut result = SingleFeedIngestionResult {
            status: "completed".to_string(),
            ..Default::default()
        };

        // 1. Crawl the feed.
        progress
            .step(ctx, "crawl", format!("Crawling {}", feed.name))
            .await;
        let crawl = ctx
            .activity::<CrawlSingleFeed>(
                CrawlSingleFeedInput { feed: feed.clone() },
                ActivityOptions::long(Duration::from_secs(120)).with_heartbeat(Duration::from_secs(30)),
            )
            .await?;
        if !crawl.error.is_empty() {
            progress.fail(ctx, crawl.error.clone()).await;
            result.status = "error".to_string();
            result.error = crawl.error;
            return Ok(result);
        }

        let new_entries = crawl.report.new_entries;
        result.entries_created = crawl.report.entries_created;
        progress.update(|p| {
            p.set_counter("entriesCreated", new_entries.len() as i64);
        });

        if new_entries.is_empty() {
            progress.complete(ctx, "No new entries").await;
            return Ok(result);
        }

        let entry_ids: Vec<String> = new_entries.iter().map(|e| e.entry_id.clone()).collect();
        let extraction_rules = feed
            .options
            .as_ref()
            .map(|o| o.extraction_rules.clone())
            .unwrap_or_default();

        // 2. Fetch full content, grouped by host.
        if settings.enable_content_fetch {
            progress
                .step(ctx, "fetch", format!("Fetching {} entries", new_entries.len()))
                .await;
            let targets: Vec<FetchTarget> = new_entries
                .iter()
                .map(|entry| FetchTarget {
                    entry_id: entry.entry_id.clone(),
                    url: entry.url.clone(),
                    extraction_rules: extraction_rules.clone(),
                })
                .collect();
            match ctx
                .child::<DomainFetchWorkflow>(
                    DomainFetchInput {
                        targets,
                        delay_seconds: settings.domain_fetch_delay,
                    },
                    &format!("{}-fetch", ctx.workflow_id()),
                )
                .await
            {
                Ok(fetch) => {
                    result.entries_fetched = fetch.fetched_count;
                    progress.update(|p| p.set_counter("entriesFetched", fetch.fetched_count as i64));
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => warn!(feed_id = %feed.id, error = %err, "content fetch stage failed"),
            }
        }

        // 3. Distill (filter + summarize).
        if settings.enable_summarization {
            progress.step(ctx, "distill", "Distilling content").await;
            match ctx
                .child::<ContentDistillationWorkflow>(
                    ContentDistillationInput {
                        entry_ids: entry_ids.clone(),
                        target_language: settings.target_language.clone(),
                        batch_size: settings.distillation_batch_size,
                        evaluate: settings.ai_evaluation_enabled,
                    },
                    &format!("{}-distill", ctx.workflow_id()),
                )
                .await
            {
                Ok(distill) => {
                    result.entries_distilled = distill.processed_count;
                    progress
                        .update(|p| p.set_counter("entriesDistilled", distill.processed_count as i64));
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => warn!(feed_id = %feed.id, error = %err, "distillation stage failed"),
            }
        }

        // 4. Translate, only when a target language is configured.
        if !settings.target_language.is_empty() {
            progress.step(ctx, "translate", "Translating entries").await;
            match ctx
                .child::<TranslationWorkflow>(
                    TranslationInput {
                        entry_ids: entry_ids.clone(),
                        target_language: settings.target_language.clone(),
                        provider: settings.translation_provider.clone(),
                    },
                    &format!("{}-translate", ctx.workflow_id()),
                )
                .await
            {
                Ok(translation) => {
                    result.entries_translated = translation.translated_count;
                    progress.update(|p| {
                        p.set_counter("entriesTranslated", translation.translated_count as i64)
                    });
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => warn!(feed_id = %feed.id, error = %err, "translation stage failed"),
            }
        }

        // 5. Embeddings for exactly these entries.
        progress.step(ctx, "embed", "Computing embeddings").await;
        if let Err(err) = ctx
            .child::<EmbeddingBackfillWorkflow>(
                EmbeddingBackfillInput {
                    batch_size: settings.embedding_backfill_batch_size,
                    entry_ids: Some(entry_ids.clone()),
                },
                &format!("{}-embed", ctx.workflow_id()),
            )
            .await
        {
            if err.is_cancelled() {
                return Err(err);
            }
            warn!(feed_id = %feed.id, error = %err, "embedding stage failed");
        }

        // 6. Search index for exactly these entries.
        progress.step(ctx, "index", "Updating search index").await;
        if let Err(err) = ctx
            .child::<SearchReindexWorkflow>(
                SearchReindexInput {
                    batch_size: settings.search_reindex_batch_size,
                    entry_ids: Some(entry_ids.clone()),
                },
                &format!("{}-index", ctx.workflow_id()),
            )
            .await
        {
            if err.is_cancelled() {
                return Err(err);
            }
            warn!(feed_id = %feed.id, error = %err, "index stage failed");
        }

        // 7. Knowledge graph for exactly these entries.
        progress.step(ctx, "graph", "Updating knowledge graph").await;
        if let Err(err) = ctx
            .child::<GlobalGraphUpdateWorkflow>(
                GlobalGraphUpdateInput {
                    batch_size: settings.global_graph_update_batch_size,
                    entry_ids: Some(entry_ids),
                },
                &format!("{}-graph", ctx.workflow_id()),
            )
            .await
        {
            if err.is_cancelled() {
                return Err(err);
            }
            warn!(feed_id = %feed.id, error = %err, "graph stage failed");
        }

        progress
            .complete(
                ctx,
                format!("Feed ingested: {} new entries", result.entries_created),
            )
            .await;
        Ok(result)
    }
}
