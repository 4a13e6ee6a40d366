//! Workflow scenarios against a fake REST backend: cleanup dry runs, index
//! removal batching, progress notification throttling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use harvest_durable::prelude::*;
use harvest_durable::{Client, Worker};
use harvest_worker::activities::{CleanupOldEntries, NotifyProgress, RemoveDocumentsFromIndex};
use harvest_worker::config::WorkerConfig;
use harvest_worker::models::{EntriesCleanupInput, EntriesCleanupResult, NotifyProgressInput};
use harvest_worker::services::{Services, WorkerServices};
use harvest_worker::workflows::EntriesCleanupWorkflow;
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct BackendCounters {
    cleanup_calls: Arc<AtomicUsize>,
    remove_calls: Arc<AtomicUsize>,
    broadcasts: Arc<AtomicUsize>,
}

fn fake_backend(counters: BackendCounters) -> Router {
    Router::new()
        .route(
            "/api/entries/cleanup",
            post(
                |State(counters): State<BackendCounters>, Json(body): Json<Value>| async move {
                    counters.cleanup_calls.fetch_add(1, Ordering::SeqCst);
                    let dry_run = body["dryRun"].as_bool().unwrap_or(false);
                    Json(json!({
                        "deletedCount": 5,
                        "deletedIds": if dry_run {
                            Value::Array(vec![])
                        } else {
                            json!(["e1", "e2", "e3", "e4", "e5"])
                        },
                        "cutoffDate": "2026-07-01T00:00:00Z",
                    }))
                },
            ),
        )
        .route(
            "/api/search/remove",
            post(
                |State(counters): State<BackendCounters>, Json(body): Json<Value>| async move {
                    counters.remove_calls.fetch_add(1, Ordering::SeqCst);
                    let count = body["documentIds"].as_array().map(|a| a.len()).unwrap_or(0);
                    Json(json!({ "removedCount": count }))
                },
            ),
        )
        .route(
            "/sse/broadcast",
            post(|State(counters): State<BackendCounters>| async move {
                counters.broadcasts.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "ok": true }))
            }),
        )
        .with_state(counters)
}

async fn start_backend(counters: BackendCounters) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = fake_backend(counters);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn test_config(api_base_url: &str) -> WorkerConfig {
    WorkerConfig {
        temporal_host: "127.0.0.1:0".to_string(),
        temporal_namespace: "default".to_string(),
        temporal_task_queue: "harvest".to_string(),
        api_base_url: api_base_url.to_string(),
        internal_api_token: "token".to_string(),
        openai_base_url: String::new(),
        openai_api_key: String::new(),
        research_model: String::new(),
        summarization_model: String::new(),
        embedding_model: String::new(),
        graph_base_url: String::new(),
        deepl_api_key: String::new(),
        ms_translator_subscription_key: String::new(),
        ms_translator_region: String::new(),
        github_token: String::new(),
        ai_evaluation_enabled: false,
        otel_tracing_enabled: false,
        feed_ingestion_concurrency: 2,
        domain_fetch_delay: 0.0,
        enable_content_fetch: false,
        enable_summarization: false,
        distillation_batch_size: 5,
        embedding_backfill_batch_size: 50,
        search_reindex_batch_size: 100,
        search_prune_batch_size: 500,
        graph_rebuild_batch_size: 20,
        global_graph_update_batch_size: 20,
        workflow_task_slots: 10,
        activity_slots: 10,
        log_level: "info".to_string(),
        log_json: false,
    }
}

fn cleanup_worker(svc: Services) -> Worker {
    Worker::builder()
        .workflow(EntriesCleanupWorkflow)
        .activity(CleanupOldEntries::new(svc.clone()))
        .activity(RemoveDocumentsFromIndex::new(svc.clone()))
        .activity(NotifyProgress::new(svc))
        .build()
}

#[tokio::test]
async fn cleanup_dry_run_reports_without_deleting() {
    let counters = BackendCounters::default();
    let base = start_backend(counters.clone()).await;
    let svc = WorkerServices::from_config(test_config(&base));
    let worker = cleanup_worker(svc);
    let client = Client::embedded(worker.engine(), "default");

    let result: EntriesCleanupResult = client
        .execute_workflow(
            "entries_cleanup",
            &EntriesCleanupInput {
                older_than_days: 30,
                dry_run: true,
            },
            "wf-cleanup-dry",
            "harvest",
        )
        .await
        .unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.deleted_count, 5);
    assert_eq!(result.search_removed_count, 0);
    assert_eq!(counters.cleanup_calls.load(Ordering::SeqCst), 1);
    // Dry runs never touch the search index.
    assert_eq!(counters.remove_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cleanup_removes_deleted_documents_from_the_index() {
    let counters = BackendCounters::default();
    let base = start_backend(counters.clone()).await;
    let svc = WorkerServices::from_config(test_config(&base));
    let worker = cleanup_worker(svc);
    let client = Client::embedded(worker.engine(), "default");

    let result: EntriesCleanupResult = client
        .execute_workflow(
            "entries_cleanup",
            &EntriesCleanupInput {
                older_than_days: 30,
                dry_run: false,
            },
            "wf-cleanup-real",
            "harvest",
        )
        .await
        .unwrap();

    assert_eq!(result.deleted_count, 5);
    assert_eq!(result.search_removed_count, 5);
    assert_eq!(counters.remove_calls.load(Ordering::SeqCst), 1);
}

fn progress_payload(workflow_id: &str, status: &str) -> NotifyProgressInput {
    NotifyProgressInput {
        workflow_id: workflow_id.to_string(),
        progress: json!({
            "status": status,
            "currentStep": "work",
            "message": "working",
            "startedAt": "2026-07-01T00:00:00Z",
            "updatedAt": "2026-07-01T00:00:01Z",
        }),
    }
}

#[tokio::test]
async fn throttle_suppresses_rapid_notifies_but_not_terminal_ones() {
    let counters = BackendCounters::default();
    let base = start_backend(counters.clone()).await;
    let svc = WorkerServices::from_config(test_config(&base));
    let notify = NotifyProgress::new(svc);
    let ctx = ActivityContext::new("wf-throttle-e2e", "notify_progress", 1, 1);

    // Two running snapshots 50 ms apart: only the first reaches the
    // broadcaster.
    let first = notify
        .execute(&ctx, progress_payload("wf-throttle-e2e", "running"))
        .await
        .unwrap();
    assert!(first.success);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = notify
        .execute(&ctx, progress_payload("wf-throttle-e2e", "running"))
        .await
        .unwrap();
    assert!(second.success);
    assert_eq!(counters.broadcasts.load(Ordering::SeqCst), 1);

    // A terminal snapshot 50 ms later must go out regardless.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let terminal = notify
        .execute(&ctx, progress_payload("wf-throttle-e2e", "completed"))
        .await
        .unwrap();
    assert!(terminal.success);
    assert_eq!(counters.broadcasts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancelled_notify_is_absorbed() {
    let counters = BackendCounters::default();
    let base = start_backend(counters.clone()).await;
    let svc = WorkerServices::from_config(test_config(&base));
    let notify = NotifyProgress::new(svc);

    let ctx = ActivityContext::new("wf-notify-cancel", "notify_progress", 1, 1);
    ctx.cancellation_handle().cancel();

    let output = notify
        .execute(&ctx, progress_payload("wf-notify-cancel", "running"))
        .await
        .unwrap();
    assert!(!output.success);
    assert_eq!(output.error, "cancelled");
}
