//! The embedded durable-execution engine.
//!
//! Owns the instance table, workflow/activity slot pools, retry and timeout
//! enforcement, cancellation fan-out and the per-instance step history that
//! makes replay possible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::activity::{ActivityContext, ActivityError, ActivityOptions};
use crate::worker::{ActivityRunner, Registry, WorkerOptions};
use crate::workflow::{WorkflowCtx, WorkflowError};

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// A workflow with the same id but different content already exists.
    #[error("workflow id conflict: {0}")]
    Conflict(String),

    #[error("workflow type not registered: {0}")]
    UnregisteredWorkflow(String),

    #[error("query not registered: {0}")]
    QueryNotFound(String),

    #[error("engine is shutting down")]
    ShuttingDown,
}

/// Outcome of a workflow submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Same id, same content: the submission is idempotent.
    AlreadyRunning,
}

/// One step record in a workflow's history, indexed by sequence number.
#[derive(Debug, Clone)]
pub(crate) enum StepRecord {
    ActivityCompleted { result: Value },
    ActivityFailed { error: ActivityError },
    TimerFired,
    TimeRead { at: DateTime<Utc> },
    ChildStarted,
    ChildCompleted { result: Result<Value, WorkflowError> },
}

/// Step records keyed by sequence number. Branch contexts record into
/// disjoint ranges, so the key space is sparse.
#[derive(Debug, Default)]
pub(crate) struct History {
    steps: HashMap<u32, StepRecord>,
}

impl History {
    fn get(&self, seq: u32) -> Option<&StepRecord> {
        self.steps.get(&seq)
    }

    fn put(&mut self, seq: u32, record: StepRecord) {
        self.steps.insert(seq, record);
    }
}

pub(crate) type QueryHandler = Box<dyn Fn() -> Value + Send + Sync>;

/// A live (or completed) workflow instance.
pub(crate) struct Instance {
    pub(crate) workflow_id: String,
    pub(crate) workflow_type: String,
    pub(crate) task_queue: String,
    pub(crate) input: Value,
    pub(crate) cancel: CancellationToken,
    pub(crate) history: Mutex<History>,
    pub(crate) queries: Mutex<HashMap<String, QueryHandler>>,
    pub(crate) result: watch::Sender<Option<Result<Value, WorkflowError>>>,
}

impl Instance {
    pub(crate) fn replayed(&self, seq: u32) -> Option<StepRecord> {
        self.history.lock().get(seq).cloned()
    }

    pub(crate) fn record(&self, seq: u32, record: StepRecord) {
        self.history.lock().put(seq, record);
    }
}

pub(crate) struct EngineInner {
    pub(crate) namespace: String,
    pub(crate) registry: Registry,
    pub(crate) instances: DashMap<String, Arc<Instance>>,
    pub(crate) workflow_slots: Arc<Semaphore>,
    pub(crate) activity_slots: Arc<Semaphore>,
    closed: AtomicBool,
}

/// Handle to the engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

impl Engine {
    pub(crate) fn new(options: WorkerOptions, registry: Registry) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                namespace: options.namespace,
                registry,
                instances: DashMap::new(),
                workflow_slots: Arc::new(Semaphore::new(options.workflow_task_slots)),
                activity_slots: Arc::new(Semaphore::new(options.activity_slots)),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Submit a workflow without awaiting its result.
    ///
    /// Duplicate ids with identical content are idempotent; a duplicate id
    /// with different content is a conflict.
    pub fn start_workflow(
        &self,
        workflow_type: &str,
        input: Value,
        workflow_id: &str,
        task_queue: &str,
    ) -> Result<StartOutcome, EngineError> {
        start_internal(&self.inner, workflow_type, input, workflow_id, task_queue, None)
    }

    /// Await a workflow's structured result.
    pub async fn result(&self, workflow_id: &str) -> Result<Result<Value, WorkflowError>, EngineError> {
        wait_result(&self.inner, workflow_id).await
    }

    /// Current result, if the workflow has finished.
    pub fn peek_result(
        &self,
        workflow_id: &str,
    ) -> Result<Option<Result<Value, WorkflowError>>, EngineError> {
        let instance = self
            .inner
            .instances
            .get(workflow_id)
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;
        let result = instance.result.borrow().clone();
        Ok(result)
    }

    /// Serve a registered query from the live instance.
    pub fn query(&self, workflow_id: &str, query_name: &str) -> Result<Value, EngineError> {
        let instance = self
            .inner
            .instances
            .get(workflow_id)
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;
        let queries = instance.queries.lock();
        let handler = queries
            .get(query_name)
            .ok_or_else(|| EngineError::QueryNotFound(query_name.to_string()))?;
        Ok(handler())
    }

    /// Request cancellation; propagates to outstanding activities and child
    /// workflows. Returns false when the workflow id is unknown.
    pub fn cancel(&self, workflow_id: &str) -> bool {
        match self.inner.instances.get(workflow_id) {
            Some(instance) => {
                info!(workflow_id, "cancelling workflow");
                instance.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Re-drive a workflow from its recorded history. Steps already recorded
    /// are served from history without re-executing side effects.
    pub fn restart_workflow(&self, workflow_id: &str) -> Result<(), EngineError> {
        let instance = self
            .inner
            .instances
            .get(workflow_id)
            .map(|i| i.value().clone())
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;
        instance.queries.lock().clear();
        spawn_run(&self.inner, instance)?;
        Ok(())
    }

    /// Stop accepting new workflows and wait up to `grace` for running
    /// instances to finish; whatever remains is cancelled.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let running = self
                .inner
                .instances
                .iter()
                .filter(|e| e.result.borrow().is_none())
                .count();
            if running == 0 {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(running, "shutdown grace expired, cancelling remaining workflows");
                for entry in self.inner.instances.iter() {
                    entry.cancel.cancel();
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        info!("engine stopped");
    }
}

pub(crate) fn start_internal(
    inner: &Arc<EngineInner>,
    workflow_type: &str,
    input: Value,
    workflow_id: &str,
    task_queue: &str,
    parent_cancel: Option<&CancellationToken>,
) -> Result<StartOutcome, EngineError> {
    if inner.closed.load(Ordering::SeqCst) {
        return Err(EngineError::ShuttingDown);
    }
    if !inner.registry.has_workflow(workflow_type) {
        return Err(EngineError::UnregisteredWorkflow(workflow_type.to_string()));
    }

    use dashmap::mapref::entry::Entry;
    let instance = match inner.instances.entry(workflow_id.to_string()) {
        Entry::Occupied(existing) => {
            let existing = existing.get();
            return if existing.workflow_type == workflow_type && existing.input == input {
                Ok(StartOutcome::AlreadyRunning)
            } else {
                Err(EngineError::Conflict(workflow_id.to_string()))
            };
        }
        Entry::Vacant(slot) => {
            let cancel = parent_cancel
                .map(|token| token.child_token())
                .unwrap_or_default();
            let (result_tx, _) = watch::channel(None);
            let instance = Arc::new(Instance {
                workflow_id: workflow_id.to_string(),
                workflow_type: workflow_type.to_string(),
                task_queue: task_queue.to_string(),
                input,
                cancel,
                history: Mutex::new(History::default()),
                queries: Mutex::new(HashMap::new()),
                result: result_tx,
            });
            slot.insert(instance.clone());
            instance
        }
    };

    info!(
        workflow_id,
        workflow_type,
        task_queue,
        "workflow submitted"
    );
    spawn_run(inner, instance)?;
    Ok(StartOutcome::Started)
}

fn spawn_run(inner: &Arc<EngineInner>, instance: Arc<Instance>) -> Result<(), EngineError> {
    let runner = inner
        .registry
        .workflow(&instance.workflow_type)
        .ok_or_else(|| EngineError::UnregisteredWorkflow(instance.workflow_type.clone()))?;

    let inner = inner.clone();
    tokio::spawn(async move {
        let permit = inner.workflow_slots.clone().acquire_owned().await;
        if permit.is_err() {
            let _ = instance
                .result
                .send(Some(Err(WorkflowError::new("engine shut down"))));
            return;
        }

        let ctx = WorkflowCtx::new(inner.clone(), instance.clone());
        let result = runner(ctx, instance.input.clone()).await;
        match &result {
            Ok(_) => info!(
                workflow_id = %instance.workflow_id,
                workflow_type = %instance.workflow_type,
                "workflow completed"
            ),
            Err(err) => error!(
                workflow_id = %instance.workflow_id,
                workflow_type = %instance.workflow_type,
                error = %err,
                "workflow failed"
            ),
        }
        let _ = instance.result.send(Some(result));
    });
    Ok(())
}

pub(crate) async fn wait_result(
    inner: &Arc<EngineInner>,
    workflow_id: &str,
) -> Result<Result<Value, WorkflowError>, EngineError> {
    let mut rx = {
        let instance = inner
            .instances
            .get(workflow_id)
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;
        instance.result.subscribe()
    };
    loop {
        let current = rx.borrow().clone();
        if let Some(result) = current {
            return Ok(result);
        }
        if rx.changed().await.is_err() {
            return Err(EngineError::NotFound(workflow_id.to_string()));
        }
    }
}

/// Run an activity to completion under its retry policy. Slots are held only
/// while an attempt executes, never across backoff sleeps.
pub(crate) async fn run_activity(
    inner: &Arc<EngineInner>,
    instance: &Arc<Instance>,
    activity_type: &str,
    input: Value,
    options: &ActivityOptions,
) -> Result<Value, ActivityError> {
    let runner = inner.registry.activity(activity_type).ok_or_else(|| {
        ActivityError::non_retryable(format!("activity not registered: {activity_type}"))
    })?;

    let mut attempt: u32 = 1;
    loop {
        let outcome = {
            let _permit = inner
                .activity_slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ActivityError::retryable("engine shutting down"))?;
            execute_attempt(&runner, instance, activity_type, input.clone(), options, attempt).await
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let policy = &options.retry_policy;
        let can_retry = err.retryable
            && !err.is_cancelled()
            && policy.has_attempts_remaining(attempt)
            && policy.should_retry(err.error_type.as_deref())
            && !instance.cancel.is_cancelled();
        if !can_retry {
            return Err(err);
        }

        attempt += 1;
        let delay = policy.delay_for_attempt(attempt);
        warn!(
            workflow_id = %instance.workflow_id,
            activity = activity_type,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "activity attempt failed, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = instance.cancel.cancelled() => return Err(ActivityError::cancelled()),
        }
    }
}

async fn execute_attempt(
    runner: &ActivityRunner,
    instance: &Arc<Instance>,
    activity_type: &str,
    input: Value,
    options: &ActivityOptions,
    attempt: u32,
) -> Result<Value, ActivityError> {
    let (hb_tx, mut hb_rx) = mpsc::channel::<()>(16);
    let mut ctx = ActivityContext::new(
        instance.workflow_id.clone(),
        activity_type,
        attempt,
        options.retry_policy.max_attempts,
    );
    if options.heartbeat_timeout.is_some() {
        ctx = ctx.with_heartbeat(hb_tx);
    }
    let cancel_handle = ctx.cancellation_handle();
    let mut cancel_seen = instance.cancel.is_cancelled();
    if cancel_seen {
        cancel_handle.cancel();
    }

    let fut = runner(ctx, input);
    tokio::pin!(fut);

    let deadline = tokio::time::sleep(options.start_to_close_timeout);
    tokio::pin!(deadline);

    let mut last_heartbeat = tokio::time::Instant::now();
    let mut heartbeats_open = options.heartbeat_timeout.is_some();

    loop {
        let heartbeat_deadline = options.heartbeat_timeout.map(|t| last_heartbeat + t);
        tokio::select! {
            result = &mut fut => return result,
            _ = &mut deadline => {
                cancel_handle.cancel();
                return Err(ActivityError::retryable("start-to-close timeout exceeded")
                    .with_type("TIMEOUT"));
            }
            received = hb_rx.recv(), if heartbeats_open => {
                match received {
                    Some(()) => last_heartbeat = tokio::time::Instant::now(),
                    None => heartbeats_open = false,
                }
            }
            _ = sleep_until_opt(heartbeat_deadline), if heartbeat_deadline.is_some() => {
                cancel_handle.cancel();
                return Err(ActivityError::retryable("heartbeat timeout exceeded")
                    .with_type("HEARTBEAT_TIMEOUT"));
            }
            // Flip the activity's cancel flag once; keep polling so it can
            // finish cooperatively.
            _ = instance.cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
                cancel_handle.cancel();
            }
        }
    }
}

/// Execute a local activity inline: single attempt, no retry policy.
pub(crate) async fn run_local_activity(
    inner: &Arc<EngineInner>,
    instance: &Arc<Instance>,
    activity_type: &str,
    input: Value,
    timeout: Duration,
) -> Result<Value, ActivityError> {
    let runner = inner.registry.activity(activity_type).ok_or_else(|| {
        ActivityError::non_retryable(format!("activity not registered: {activity_type}"))
    })?;

    let ctx = ActivityContext::new(instance.workflow_id.clone(), activity_type, 1, 1);
    let cancel_handle = ctx.cancellation_handle();
    let mut cancel_seen = instance.cancel.is_cancelled();
    if cancel_seen {
        cancel_handle.cancel();
    }

    let fut = runner(ctx, input);
    tokio::pin!(fut);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            result = &mut fut => return result,
            _ = &mut deadline => {
                cancel_handle.cancel();
                return Err(ActivityError::retryable("local activity timeout").with_type("TIMEOUT"));
            }
            _ = instance.cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
                cancel_handle.cancel();
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
