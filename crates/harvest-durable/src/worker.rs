//! Worker: registry, slot configuration and lifecycle.
//!
//! A worker owns the engine, its registries and the slot pools. Binaries
//! build one with [`Worker::builder`], register workflow and activity
//! implementations, then call [`Worker::run`] until shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::activity::{Activity, ActivityContext, ActivityError};
use crate::codec;
use crate::engine::Engine;
use crate::workflow::{Workflow, WorkflowCtx, WorkflowError};

pub(crate) type WorkflowRunner =
    Arc<dyn Fn(WorkflowCtx, Value) -> BoxFuture<'static, Result<Value, WorkflowError>> + Send + Sync>;
pub(crate) type ActivityRunner =
    Arc<dyn Fn(ActivityContext, Value) -> BoxFuture<'static, Result<Value, ActivityError>> + Send + Sync>;

/// Registered workflow and activity implementations, keyed by type name.
#[derive(Default)]
pub struct Registry {
    workflows: HashMap<String, WorkflowRunner>,
    activities: HashMap<String, ActivityRunner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_workflow<W: Workflow>(&mut self, workflow: W) {
        let workflow = Arc::new(workflow);
        self.workflows.insert(
            W::TYPE.to_string(),
            Arc::new(move |ctx, input| {
                let workflow = workflow.clone();
                Box::pin(async move {
                    let input: W::Input = codec::from_value(input)
                        .map_err(|e| WorkflowError::new(format!("workflow input decode: {e}")))?;
                    let output = workflow.run(ctx, input).await?;
                    codec::to_value(&output)
                        .map_err(|e| WorkflowError::new(format!("workflow output encode: {e}")))
                })
            }),
        );
    }

    pub fn register_activity<A: Activity>(&mut self, activity: A) {
        let activity = Arc::new(activity);
        self.activities.insert(
            A::TYPE.to_string(),
            Arc::new(move |ctx, input| {
                let activity = activity.clone();
                Box::pin(async move {
                    let input: A::Input = codec::from_value(input).map_err(|e| {
                        ActivityError::non_retryable(format!("activity input decode: {e}"))
                    })?;
                    let output = activity.execute(&ctx, input).await?;
                    codec::to_value(&output).map_err(|e| {
                        ActivityError::non_retryable(format!("activity output encode: {e}"))
                    })
                })
            }),
        );
    }

    pub fn has_workflow(&self, workflow_type: &str) -> bool {
        self.workflows.contains_key(workflow_type)
    }

    pub(crate) fn workflow(&self, workflow_type: &str) -> Option<WorkflowRunner> {
        self.workflows.get(workflow_type).cloned()
    }

    pub(crate) fn activity(&self, activity_type: &str) -> Option<ActivityRunner> {
        self.activities.get(activity_type).cloned()
    }
}

/// Worker slot and identity configuration.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub namespace: String,
    pub task_queue: String,
    /// Concurrent workflow tasks.
    pub workflow_task_slots: usize,
    /// Concurrent activity attempts.
    pub activity_slots: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            task_queue: "harvest".to_string(),
            workflow_task_slots: 100,
            activity_slots: 100,
        }
    }
}

/// Builder for a [`Worker`].
#[derive(Default)]
pub struct WorkerBuilder {
    registry: Registry,
    options: Option<WorkerOptions>,
}

impl WorkerBuilder {
    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn workflow<W: Workflow>(mut self, workflow: W) -> Self {
        self.registry.register_workflow(workflow);
        self
    }

    pub fn activity<A: Activity>(mut self, activity: A) -> Self {
        self.registry.register_activity(activity);
        self
    }

    pub fn build(self) -> Worker {
        let options = self.options.unwrap_or_default();
        info!(
            namespace = %options.namespace,
            task_queue = %options.task_queue,
            workflow_task_slots = options.workflow_task_slots,
            activity_slots = options.activity_slots,
            "worker initialized"
        );
        Worker {
            engine: Engine::new(options, self.registry),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Hosts the engine and processes workflow and activity tasks until shutdown.
pub struct Worker {
    engine: Engine,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    /// Handle to the embedded engine, for clients and the admin surface.
    pub fn engine(&self) -> Engine {
        self.engine.clone()
    }

    /// Token observers can use to initiate shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until the shutdown token fires, then drain gracefully.
    pub async fn run(&self) {
        info!("worker running");
        self.shutdown.cancelled().await;
        info!("shutdown requested, draining");
        self.engine.shutdown(Duration::from_secs(30)).await;
        info!("worker stopped");
    }
}
