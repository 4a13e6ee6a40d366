// SSE progress notification, run as a local activity from workflows.
//
// The worker posts the full progress snapshot to the REST backend, which
// broadcasts it to browser clients. A per-workflow-id throttle keeps chatty
// workflows from flooding the frontend; terminal statuses bypass it so the
// last snapshot always goes out. The throttle clock is activity-side
// wall-clock state, advisory only, and never replayed.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use harvest_durable::prelude::*;
use tracing::debug;

use crate::models::{NotifyOutput, NotifyProgressInput};
use crate::services::Services;

const THROTTLE: Duration = Duration::from_millis(300);
const THROTTLE_TABLE_MAX: usize = 100;
const THROTTLE_ENTRY_TTL: Duration = Duration::from_secs(3600);

fn last_notify_times() -> &'static DashMap<String, Instant> {
    static TABLE: OnceLock<DashMap<String, Instant>> = OnceLock::new();
    TABLE.get_or_init(DashMap::new)
}

/// Drop table entries older than one hour once the table outgrows 100
/// workflows.
fn cleanup_old_entries(table: &DashMap<String, Instant>) {
    let now = Instant::now();
    table.retain(|_, last| now.duration_since(*last) < THROTTLE_ENTRY_TTL);
}

/// Whether a notify for this workflow id may go out now; updates the table
/// when it may.
fn should_notify(workflow_id: &str, is_final: bool) -> bool {
    let table = last_notify_times();
    let now = Instant::now();

    if !is_final {
        if let Some(last) = table.get(workflow_id) {
            if now.duration_since(*last) < THROTTLE {
                return false;
            }
        }
    }
    table.insert(workflow_id.to_string(), now);
    if table.len() > THROTTLE_TABLE_MAX {
        cleanup_old_entries(table);
    }
    true
}

pub struct NotifyProgress {
    svc: Services,
}

impl NotifyProgress {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for NotifyProgress {
    const TYPE: &'static str = "notify_progress";
    type Input = NotifyProgressInput;
    type Output = NotifyOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let status = input.progress["status"].as_str().unwrap_or("");
        let is_final = matches!(status, "completed" | "error");

        if !should_notify(&input.workflow_id, is_final) {
            // Throttled, not an error.
            return Ok(NotifyOutput {
                success: true,
                error: String::new(),
            });
        }

        // Cancellation mid-send is expected during fast shutdown; absorb it
        // so the calling workflow can finish the notify silently.
        let send = self
            .svc
            .api
            .broadcast_progress(&input.workflow_id, &input.progress);
        tokio::select! {
            result = send => match result {
                Ok(()) => Ok(NotifyOutput {
                    success: true,
                    error: String::new(),
                }),
                Err(err) => {
                    debug!(workflow_id = %input.workflow_id, error = %err, "progress broadcast failed");
                    Ok(NotifyOutput {
                        success: false,
                        error: err.to_string(),
                    })
                }
            },
            _ = ctx.cancelled() => Ok(NotifyOutput {
                success: false,
                error: "cancelled".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_blocks_rapid_notifies() {
        let id = "wf-throttle-test-1";
        assert!(should_notify(id, false));
        // Within the window: suppressed.
        assert!(!should_notify(id, false));
    }

    #[test]
    fn terminal_status_bypasses_throttle() {
        let id = "wf-throttle-test-2";
        assert!(should_notify(id, false));
        assert!(!should_notify(id, false));
        // A completed/error snapshot always goes out.
        assert!(should_notify(id, true));
    }

    #[test]
    fn distinct_workflows_do_not_interfere() {
        assert!(should_notify("wf-throttle-test-3a", false));
        assert!(should_notify("wf-throttle-test-3b", false));
    }

    #[test]
    fn throttle_reopens_after_the_window() {
        let id = "wf-throttle-test-4";
        assert!(should_notify(id, false));
        last_notify_times().insert(id.to_string(), Instant::now() - THROTTLE * 2);
        assert!(should_notify(id, false));
    }

    #[test]
    fn cleanup_drops_stale_entries() {
        let table = last_notify_times();
        table.insert(
            "wf-stale".to_string(),
            Instant::now() - THROTTLE_ENTRY_TTL - Duration::from_secs(1),
        );
        table.insert("wf-fresh-cleanup".to_string(), Instant::now());
        cleanup_old_entries(table);
        assert!(table.get("wf-stale").is_none());
        assert!(table.get("wf-fresh-cleanup").is_some());
    }
}
