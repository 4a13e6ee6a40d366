// Harvest worker: hosts the durable engine, the activity library and the
// workflow library, and exposes the engine's HTTP admin surface for the
// agent and the scheduler.

use anyhow::{Context, Result};
use harvest_durable::Worker;
use tracing::info;

use harvest_worker::activities::*;
use harvest_worker::config::WorkerConfig;
use harvest_worker::services::WorkerServices;
use harvest_worker::telemetry;
use harvest_worker::workflows::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;
    telemetry::init(
        "worker",
        &config.log_level,
        config.log_json,
        config.otel_tracing_enabled,
    )?;

    let bind_addr = config.temporal_host.clone();
    let options = harvest_durable::WorkerOptions {
        namespace: config.temporal_namespace.clone(),
        task_queue: config.temporal_task_queue.clone(),
        workflow_task_slots: config.workflow_task_slots,
        activity_slots: config.activity_slots,
    };
    let svc = WorkerServices::from_config(config);

    let worker = Worker::builder()
        .options(options)
        // Workflows
        .workflow(AllFeedsIngestionWorkflow)
        .workflow(SingleFeedIngestionWorkflow)
        .workflow(DomainFetchWorkflow)
        .workflow(ContentDistillationWorkflow)
        .workflow(TranslationWorkflow)
        .workflow(EmbeddingBackfillWorkflow)
        .workflow(SearchReindexWorkflow)
        .workflow(SearchPruneWorkflow)
        .workflow(EntriesCleanupWorkflow)
        .workflow(GraphRebuildWorkflow)
        .workflow(GlobalGraphUpdateWorkflow)
        .workflow(UpdateEntryIndexWorkflow)
        .workflow(ExtractEntryContextWorkflow)
        .workflow(DeleteEnrichmentWorkflow)
        .workflow(EvaluationWorkflow)
        .workflow(SummarizationEvaluationWorkflow)
        // Activities
        .activity(ListFeeds::new(svc.clone()))
        .activity(GetAppSettings::new(svc.clone()))
        .activity(GetEntry::new(svc.clone()))
        .activity(GetEntries::new(svc.clone()))
        .activity(SaveEntryContext::new(svc.clone()))
        .activity(ListUnsummarizedEntryIds::new(svc.clone()))
        .activity(CrawlSingleFeed::new(svc.clone()))
        .activity(FetchSingleContent::new(svc.clone()))
        .activity(DistillEntryContent::new(svc.clone()))
        .activity(DistillEntriesBatch::new(svc.clone()))
        .activity(SaveDistilledEntries::new(svc.clone()))
        .activity(ComputeEmbeddings::new(svc.clone()))
        .activity(GetEntriesForEmbedding::new(svc.clone()))
        .activity(DeeplTranslateEntries::new(svc.clone()))
        .activity(MsTranslateEntries::new(svc.clone()))
        .activity(SaveTranslations::new(svc.clone()))
        .activity(IndexEntriesBatch::new(svc.clone()))
        .activity(RemoveDocumentsFromIndex::new(svc.clone()))
        .activity(GetOrphanedDocumentIds::new(svc.clone()))
        .activity(GetEntryIdsForIndexing::new(svc.clone()))
        .activity(AddToGlobalGraph::new(svc.clone()))
        .activity(FetchAndAddToGraphBulk::new(svc.clone()))
        .activity(ResetGlobalGraph::new(svc.clone()))
        .activity(AddToGraphRagSession::new(svc.clone()))
        .activity(ResetGraphRagSession::new(svc.clone()))
        .activity(SearchGithubRepositories::new(svc.clone()))
        .activity(SaveGithubEnrichment::new(svc.clone()))
        .activity(SaveWebPageEnrichment::new(svc.clone()))
        .activity(SaveEntryLinks::new(svc.clone()))
        .activity(DeleteEnrichment::new(svc.clone()))
        .activity(CleanupOldEntries::new(svc.clone()))
        .activity(ExtractEntryContext::new(svc.clone()))
        .activity(EvaluateRagas::new(svc.clone()))
        .activity(EvaluateSummarization::new(svc.clone()))
        .activity(NotifyProgress::new(svc.clone()))
        .build();

    // Admin surface: workflow submission, results, queries, cancellation.
    let router = harvest_durable::server::router(worker.engine());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind engine surface on {bind_addr}"))?;
    info!(addr = %bind_addr, "engine admin surface listening");
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!(error = %err, "admin surface failed");
        }
    });

    let shutdown = worker.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    worker.run().await;
    server.abort();
    telemetry::shutdown();
    Ok(())
}
