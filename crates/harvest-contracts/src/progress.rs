// Per-workflow progress snapshots broadcast to browser clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a workflow run.
///
/// Transitions are monotonic: `pending → running → (completed | error)`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            WorkflowStatus::Pending => 0,
            WorkflowStatus::Running => 1,
            WorkflowStatus::Completed => 2,
            WorkflowStatus::Error => 2,
        }
    }
}

/// Mutable snapshot of a workflow's progress, owned by the running instance
/// and persisted by the engine. Notifications with a terminal status bypass
/// the SSE throttle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowProgress {
    pub workflow_id: String,
    pub entity_ids: Vec<String>,
    /// ISO-8601, engine-supplied time.
    pub started_at: String,
    pub updated_at: String,
    pub status: WorkflowStatus,
    pub current_step: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Workflow-specific counters (entries processed, batches done, ...).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, i64>,
}

impl WorkflowProgress {
    /// Start a fresh progress record in `running` state.
    pub fn begin(workflow_id: impl Into<String>, now: impl Into<String>) -> Self {
        let now = now.into();
        Self {
            workflow_id: workflow_id.into(),
            started_at: now.clone(),
            updated_at: now,
            status: WorkflowStatus::Running,
            ..Default::default()
        }
    }

    /// Move to a new step, updating the human-readable message.
    pub fn step(&mut self, step: impl Into<String>, message: impl Into<String>, now: impl Into<String>) {
        self.current_step = step.into();
        self.message = message.into();
        self.touch(now);
    }

    pub fn set_counter(&mut self, name: impl Into<String>, value: i64) {
        self.counters.insert(name.into(), value);
    }

    pub fn add_counter(&mut self, name: impl Into<String>, delta: i64) {
        *self.counters.entry(name.into()).or_insert(0) += delta;
    }

    pub fn complete(&mut self, message: impl Into<String>, now: impl Into<String>) {
        self.set_status(WorkflowStatus::Completed);
        self.current_step = "done".to_string();
        self.message = message.into();
        self.touch(now);
    }

    pub fn fail(&mut self, error: impl Into<String>, now: impl Into<String>) {
        let error = error.into();
        self.set_status(WorkflowStatus::Error);
        self.message = format!("Failed: {error}");
        self.error = Some(error);
        self.touch(now);
    }

    /// Status transitions never go backwards; terminal states are sticky
    /// except that `completed` may still be overridden by `error`.
    pub fn set_status(&mut self, status: WorkflowStatus) {
        if self.status == WorkflowStatus::Error {
            return;
        }
        if status.rank() >= self.status.rank() {
            self.status = status;
        }
    }

    fn touch(&mut self, now: impl Into<String>) {
        self.updated_at = now.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn progress_lifecycle_is_monotonic() {
        let mut progress = WorkflowProgress::begin("wf-1", "2026-01-01T00:00:00Z");
        assert_eq!(progress.status, WorkflowStatus::Running);
        assert_eq!(progress.started_at, progress.updated_at);

        progress.step("crawl", "Crawling feeds", "2026-01-01T00:00:01Z");
        assert!(progress.started_at <= progress.updated_at);

        progress.complete("Done", "2026-01-01T00:00:02Z");
        assert_eq!(progress.status, WorkflowStatus::Completed);

        // A terminal status never regresses to running.
        progress.set_status(WorkflowStatus::Running);
        assert_eq!(progress.status, WorkflowStatus::Completed);
    }

    #[test]
    fn error_is_sticky_over_completed() {
        let mut progress = WorkflowProgress::begin("wf-1", "t0");
        progress.fail("boom", "t1");
        assert_eq!(progress.status, WorkflowStatus::Error);
        assert_eq!(progress.error.as_deref(), Some("boom"));

        progress.set_status(WorkflowStatus::Completed);
        assert_eq!(progress.status, WorkflowStatus::Error);
    }

    #[test]
    fn counters_accumulate() {
        let mut progress = WorkflowProgress::begin("wf-1", "t0");
        progress.add_counter("entries", 3);
        progress.add_counter("entries", 2);
        progress.set_counter("batches", 1);
        assert_eq!(progress.counters["entries"], 5);
        assert_eq!(progress.counters["batches"], 1);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let progress = WorkflowProgress::begin("wf-1", "t0");
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["workflowId"], "wf-1");
        assert_eq!(json["startedAt"], "t0");
        assert_eq!(json["currentStep"], "");
        assert_eq!(json["status"], "running");
    }
}
