//! Workflows: deterministic replayable orchestration functions.
//!
//! A workflow's only side effects are the operations exposed on
//! [`WorkflowCtx`]. Each operation consumes the next sequence number; when a
//! record for that sequence already exists in history, the recorded outcome
//! is returned without re-executing the side effect. Workflow code must not
//! read wall-clock time (use [`WorkflowCtx::now`]), spawn threads, or do
//! direct I/O.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::activity::{Activity, ActivityError, ActivityOptions};
use crate::codec;
use crate::engine::{self, EngineError, EngineInner, Instance, StartOutcome, StepRecord};

/// Error type for workflow failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl WorkflowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::new("workflow cancelled").with_code("CANCELLED")
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code.as_deref() == Some("CANCELLED")
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorkflowError {}

impl From<ActivityError> for WorkflowError {
    fn from(err: ActivityError) -> Self {
        if err.is_cancelled() {
            Self::cancelled()
        } else {
            Self::new(err.message).with_code(err.error_type.unwrap_or_else(|| "ACTIVITY_FAILED".to_string()))
        }
    }
}

/// A deterministic, replayable orchestration function.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    /// Registry name for this workflow.
    const TYPE: &'static str;

    type Input: Serialize + DeserializeOwned + Send + Clone + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError>;
}

/// Execution context for a running workflow instance.
///
/// Cheap to clone; clones share the instance's sequence counter, so
/// concurrent fan-outs assign sequence numbers in first-poll order, which is
/// registration order under deterministic polling.
#[derive(Clone)]
pub struct WorkflowCtx {
    engine: Arc<EngineInner>,
    instance: Arc<Instance>,
    seq: Arc<AtomicU32>,
}

impl WorkflowCtx {
    pub(crate) fn new(engine: Arc<EngineInner>, instance: Arc<Instance>) -> Self {
        Self {
            engine,
            instance,
            seq: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.instance.workflow_id
    }

    pub fn task_queue(&self) -> &str {
        &self.instance.task_queue
    }

    /// Context for one branch of a concurrent fan-out.
    ///
    /// Each branch records into its own sequence range, so interleaved
    /// polling across branches cannot shuffle history positions between
    /// runs. `index` must be stable across replays (derive it from the
    /// fan-out's registration order).
    pub fn branch(&self, index: u32) -> WorkflowCtx {
        Self {
            engine: self.engine.clone(),
            instance: self.instance.clone(),
            seq: Arc::new(AtomicU32::new((index + 1) << 16)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.instance.cancel.is_cancelled()
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Engine-supplied time: recorded on first read, served from history on
    /// replay.
    pub fn now(&self) -> DateTime<Utc> {
        let seq = self.next_seq();
        if let Some(StepRecord::TimeRead { at }) = self.instance.replayed(seq) {
            return at;
        }
        let at = Utc::now();
        self.instance.record(seq, StepRecord::TimeRead { at });
        at
    }

    /// Engine-supplied time as an ISO-8601 string, for progress snapshots.
    pub fn now_iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Execute an activity under its retry policy and await the result.
    pub async fn activity<A: Activity>(
        &self,
        input: A::Input,
        options: ActivityOptions,
    ) -> Result<A::Output, ActivityError> {
        let seq = self.next_seq();
        if let Some(record) = self.instance.replayed(seq) {
            return match record {
                StepRecord::ActivityCompleted { result } => codec::from_value(result)
                    .map_err(|e| ActivityError::non_retryable(format!("replay decode: {e}"))),
                StepRecord::ActivityFailed { error } => Err(error),
                _ => Err(ActivityError::non_retryable(
                    "history mismatch: expected activity record",
                )),
            };
        }

        let input_value = codec::to_value(&input)
            .map_err(|e| ActivityError::non_retryable(format!("input encode: {e}")))?;
        let outcome =
            engine::run_activity(&self.engine, &self.instance, A::TYPE, input_value, &options)
                .await;
        match outcome {
            Ok(value) => {
                self.instance.record(
                    seq,
                    StepRecord::ActivityCompleted {
                        result: value.clone(),
                    },
                );
                codec::from_value(value)
                    .map_err(|e| ActivityError::non_retryable(format!("output decode: {e}")))
            }
            Err(error) => {
                self.instance.record(
                    seq,
                    StepRecord::ActivityFailed {
                        error: error.clone(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Execute a lightweight activity inline: one attempt, no retry policy.
    pub async fn local_activity<A: Activity>(
        &self,
        input: A::Input,
        timeout: Duration,
    ) -> Result<A::Output, ActivityError> {
        let seq = self.next_seq();
        if let Some(record) = self.instance.replayed(seq) {
            return match record {
                StepRecord::ActivityCompleted { result } => codec::from_value(result)
                    .map_err(|e| ActivityError::non_retryable(format!("replay decode: {e}"))),
                StepRecord::ActivityFailed { error } => Err(error),
                _ => Err(ActivityError::non_retryable(
                    "history mismatch: expected activity record",
                )),
            };
        }

        let input_value = codec::to_value(&input)
            .map_err(|e| ActivityError::non_retryable(format!("input encode: {e}")))?;
        let outcome = engine::run_local_activity(
            &self.engine,
            &self.instance,
            A::TYPE,
            input_value,
            timeout,
        )
        .await;
        match outcome {
            Ok(value) => {
                self.instance.record(
                    seq,
                    StepRecord::ActivityCompleted {
                        result: value.clone(),
                    },
                );
                codec::from_value(value)
                    .map_err(|e| ActivityError::non_retryable(format!("output decode: {e}")))
            }
            Err(error) => {
                self.instance.record(
                    seq,
                    StepRecord::ActivityFailed {
                        error: error.clone(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Durable timer. Returns an error when the workflow is cancelled while
    /// sleeping.
    pub async fn sleep(&self, duration: Duration) -> Result<(), WorkflowError> {
        let seq = self.next_seq();
        if let Some(record) = self.instance.replayed(seq) {
            return match record {
                StepRecord::TimerFired => Ok(()),
                _ => Err(WorkflowError::new("history mismatch: expected timer record")),
            };
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                self.instance.record(seq, StepRecord::TimerFired);
                Ok(())
            }
            _ = self.instance.cancel.cancelled() => Err(WorkflowError::cancelled()),
        }
    }

    /// Start a child workflow without awaiting it (fire-and-forget).
    ///
    /// Re-submission with identical content is idempotent.
    pub fn start_child<W: Workflow>(
        &self,
        input: W::Input,
        child_id: &str,
    ) -> Result<(), WorkflowError> {
        let seq = self.next_seq();
        if let Some(record) = self.instance.replayed(seq) {
            return match record {
                StepRecord::ChildStarted => Ok(()),
                _ => Err(WorkflowError::new("history mismatch: expected child start")),
            };
        }
        let input_value = codec::to_value(&input)
            .map_err(|e| WorkflowError::new(format!("child input encode: {e}")))?;
        match engine::start_internal(
            &self.engine,
            W::TYPE,
            input_value,
            child_id,
            &self.instance.task_queue,
            Some(&self.instance.cancel),
        ) {
            Ok(StartOutcome::Started) | Ok(StartOutcome::AlreadyRunning) => {
                self.instance.record(seq, StepRecord::ChildStarted);
                Ok(())
            }
            Err(EngineError::Conflict(id)) => {
                Err(WorkflowError::new(format!("child workflow id conflict: {id}")).with_code("CONFLICT"))
            }
            Err(err) => Err(WorkflowError::new(err.to_string())),
        }
    }

    /// Start a child workflow and await its result. The child inherits this
    /// workflow's cancellation scope.
    pub async fn child<W: Workflow>(
        &self,
        input: W::Input,
        child_id: &str,
    ) -> Result<W::Output, WorkflowError> {
        let seq = self.next_seq();
        if let Some(record) = self.instance.replayed(seq) {
            return match record {
                StepRecord::ChildCompleted { result } => match result {
                    Ok(value) => codec::from_value(value)
                        .map_err(|e| WorkflowError::new(format!("replay decode: {e}"))),
                    Err(err) => Err(err),
                },
                _ => Err(WorkflowError::new(
                    "history mismatch: expected child completion",
                )),
            };
        }

        let input_value = codec::to_value(&input)
            .map_err(|e| WorkflowError::new(format!("child input encode: {e}")))?;
        match engine::start_internal(
            &self.engine,
            W::TYPE,
            input_value,
            child_id,
            &self.instance.task_queue,
            Some(&self.instance.cancel),
        ) {
            Ok(_) => {}
            Err(EngineError::Conflict(id)) => {
                return Err(
                    WorkflowError::new(format!("child workflow id conflict: {id}"))
                        .with_code("CONFLICT"),
                )
            }
            Err(err) => return Err(WorkflowError::new(err.to_string())),
        }

        let result = tokio::select! {
            result = engine::wait_result(&self.engine, child_id) => {
                result.map_err(|e| WorkflowError::new(e.to_string()))?
            }
            _ = self.instance.cancel.cancelled() => return Err(WorkflowError::cancelled()),
        };

        self.instance.record(
            seq,
            StepRecord::ChildCompleted {
                result: result.clone(),
            },
        );
        match result {
            Ok(value) => codec::from_value(value)
                .map_err(|e| WorkflowError::new(format!("child output decode: {e}"))),
            Err(err) => Err(err),
        }
    }

    /// Register a query handler served from the live instance.
    ///
    /// The handler is a read-only capability over the workflow's state; the
    /// engine calls it without suspending execution.
    pub fn register_query<F>(&self, name: &str, handler: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.instance
            .queries
            .lock()
            .insert(name.to_string(), Box::new(handler));
    }
}
