//! # Durable workflow engine
//!
//! An embedded durable-execution runtime for reliable pipeline orchestration.
//!
//! ## Model
//!
//! - **Workflows** are deterministic async functions over a [`WorkflowCtx`].
//!   Their only suspension points are activity invocations, timers, child
//!   workflows and engine-supplied time. Every step is recorded in a
//!   sequence-numbered history; on replay, recorded results are served
//!   without re-executing side effects.
//! - **Activities** are the unit of I/O: single input record, single output
//!   record, retried by the engine under a [`RetryPolicy`] with
//!   start-to-close and optional heartbeat timeouts.
//! - **Queries** are registered per workflow instance and served from the
//!   live instance without disturbing execution.
//! - The **client layer** ([`Client`]) submits, awaits and queries workflows
//!   either in-process or over the engine's HTTP admin surface.
//!
//! ```text
//! Client ──► Engine ──► workflow task ──► WorkflowCtx ──► activity slots
//!                 │                            │
//!                 └── instance table ◄── history/queries
//! ```

pub mod activity;
pub mod client;
pub mod codec;
pub mod engine;
pub mod retry;
pub mod server;
pub mod worker;
pub mod workflow;

pub use activity::{Activity, ActivityContext, ActivityError, ActivityOptions};
pub use client::{Client, ClientError};
pub use engine::{Engine, StartOutcome};
pub use retry::RetryPolicy;
pub use worker::{Registry, Worker, WorkerOptions};
pub use workflow::{Workflow, WorkflowCtx, WorkflowError};

/// Common imports for workflow and activity authors.
pub mod prelude {
    pub use crate::activity::{Activity, ActivityContext, ActivityError, ActivityOptions};
    pub use crate::retry::RetryPolicy;
    pub use crate::workflow::{Workflow, WorkflowCtx, WorkflowError};
    pub use async_trait::async_trait;
}
