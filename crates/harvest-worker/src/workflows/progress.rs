// Shared progress plumbing for workflows.
//
// The handle wraps the workflow's progress record, registers the
// `get_progress` query as a read-only capability over it, and pushes
// snapshots through the notify_progress local activity. Notification
// failures are logged and never fail the workflow; throttling lives inside
// the activity.

use std::sync::Arc;
use std::time::Duration;

use harvest_contracts::{WorkflowProgress, WorkflowStatus};
use harvest_durable::WorkflowCtx;
use parking_lot::Mutex;
use tracing::warn;

use crate::activities::NotifyProgress;
use crate::models::NotifyProgressInput;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<Mutex<WorkflowProgress>>,
}

impl ProgressHandle {
    /// Start a running progress record and register the query handler.
    pub fn begin(ctx: &WorkflowCtx) -> Self {
        let inner = Arc::new(Mutex::new(WorkflowProgress::begin(
            ctx.workflow_id(),
            ctx.now_iso(),
        )));
        let query_state = inner.clone();
        ctx.register_query("get_progress", move || {
            serde_json::to_value(&*query_state.lock()).unwrap_or_default()
        });
        Self { inner }
    }

    pub fn update(&self, mutate: impl FnOnce(&mut WorkflowProgress)) {
        mutate(&mut self.inner.lock());
    }

    pub fn snapshot(&self) -> WorkflowProgress {
        self.inner.lock().clone()
    }

    /// Push the current snapshot to the SSE broadcaster.
    pub async fn notify(&self, ctx: &WorkflowCtx) {
        let snapshot = self.snapshot();
        let input = NotifyProgressInput {
            workflow_id: ctx.workflow_id().to_string(),
            progress: serde_json::to_value(&snapshot).unwrap_or_default(),
        };
        match ctx.local_activity::<NotifyProgress>(input, NOTIFY_TIMEOUT).await {
            Ok(output) if !output.success && output.error != "cancelled" => {
                warn!(
                    workflow_id = %ctx.workflow_id(),
                    error = %output.error,
                    "progress notification failed"
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    workflow_id = %ctx.workflow_id(),
                    error = %err,
                    "progress notification failed"
                );
            }
        }
    }

    pub async fn step(&self, ctx: &WorkflowCtx, step: &str, message: impl Into<String>) {
        let now = ctx.now_iso();
        self.update(|p| p.step(step, message, now));
        self.notify(ctx).await;
    }

    pub async fn complete(&self, ctx: &WorkflowCtx, message: impl Into<String>) {
        let now = ctx.now_iso();
        self.update(|p| p.complete(message, now));
        self.notify(ctx).await;
    }

    pub async fn fail(&self, ctx: &WorkflowCtx, error: impl Into<String>) {
        let now = ctx.now_iso();
        self.update(|p| p.fail(error, now));
        self.notify(ctx).await;
    }

    pub fn is_terminal(&self) -> bool {
        self.inner.lock().status.is_terminal()
    }

    pub fn status(&self) -> WorkflowStatus {
        self.inner.lock().status
    }
}
