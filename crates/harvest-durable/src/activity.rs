//! Activities: the unit of external effect.
//!
//! An activity performs exactly one side effect and returns a structured
//! result. The engine retries it under its [`RetryPolicy`], enforces the
//! start-to-close timeout, and — for long-running activities — fails the
//! attempt when heartbeats stop arriving within the heartbeat window.
//!
//! Expected domain errors (404s, validation failures) belong in the output
//! record, not in `Err`; `Err` is for failures the engine should retry or
//! surface to the workflow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::retry::RetryPolicy;

/// Error type for activity failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityError {
    pub message: String,

    /// Error class for programmatic handling and non-retryable matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Non-retryable errors fail the activity without further attempts.
    pub retryable: bool,
}

impl ActivityError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
        }
    }

    /// The error reported when an activity is cancelled mid-flight.
    pub fn cancelled() -> Self {
        Self::non_retryable("cancelled").with_type("CANCELLED")
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_type.as_deref() == Some("CANCELLED")
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActivityError {}

impl From<anyhow::Error> for ActivityError {
    fn from(err: anyhow::Error) -> Self {
        Self::retryable(err.to_string())
    }
}

/// Execution options for a scheduled activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOptions {
    pub retry_policy: RetryPolicy,

    /// Maximum time for one attempt, from start to completion.
    #[serde(with = "duration_millis")]
    pub start_to_close_timeout: Duration,

    /// When set, the attempt fails unless a heartbeat arrives within this
    /// window.
    #[serde(default, with = "option_duration_millis")]
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self::short()
    }
}

impl ActivityOptions {
    /// Default for quick API calls: 30 s, platform retry policy.
    pub fn short() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            start_to_close_timeout: Duration::from_secs(30),
            heartbeat_timeout: None,
        }
    }

    /// Long-running work with a custom start-to-close budget.
    pub fn long(start_to_close: Duration) -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            start_to_close_timeout: start_to_close,
            heartbeat_timeout: None,
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }
}

/// Context handed to an executing activity attempt.
///
/// Provides attempt info, heartbeating and cooperative cancellation.
#[derive(Debug)]
pub struct ActivityContext {
    /// Workflow instance that scheduled this activity.
    pub workflow_id: String,

    /// Activity type name.
    pub activity_type: String,

    /// Current attempt, 1-based.
    pub attempt: u32,

    /// Maximum attempts allowed by the retry policy.
    pub max_attempts: u32,

    heartbeat_tx: Option<mpsc::Sender<()>>,
    cancelled: Arc<AtomicBool>,
}

impl ActivityContext {
    pub fn new(
        workflow_id: impl Into<String>,
        activity_type: impl Into<String>,
        attempt: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            activity_type: activity_type.into(),
            attempt,
            max_attempts,
            heartbeat_tx: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_heartbeat(mut self, tx: mpsc::Sender<()>) -> Self {
        self.heartbeat_tx = Some(tx);
        self
    }

    /// Handle the engine uses to request cancellation.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Record a heartbeat. A no-op when the activity has no heartbeat
    /// deadline configured.
    pub fn heartbeat(&self) {
        if let Some(tx) = &self.heartbeat_tx {
            let _ = tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Resolves when cancellation is requested; for `select!` patterns.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Handle to cancel a running activity attempt.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// A unit of work that may fail and be retried.
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// Registry name for this activity.
    const TYPE: &'static str;

    type Input: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Execute one attempt.
    ///
    /// Return `ActivityError::retryable` for transient failures, or
    /// `ActivityError::non_retryable` for permanent ones.
    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError>;
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_constructors() {
        let err = ActivityError::retryable("timeout");
        assert!(err.retryable);

        let err = ActivityError::non_retryable("bad input").with_type("CLIENT_ERROR");
        assert!(!err.retryable);
        assert_eq!(err.error_type.as_deref(), Some("CLIENT_ERROR"));

        assert!(ActivityError::cancelled().is_cancelled());
    }

    #[test]
    fn options_builders() {
        let options = ActivityOptions::long(Duration::from_secs(600))
            .with_heartbeat(Duration::from_secs(10))
            .with_retry(RetryPolicy::exponential().with_max_attempts(2));
        assert_eq!(options.start_to_close_timeout, Duration::from_secs(600));
        assert_eq!(options.heartbeat_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.retry_policy.max_attempts, 2);
    }

    #[test]
    fn options_serialization_round_trip() {
        let options = ActivityOptions::short().with_heartbeat(Duration::from_secs(5));
        let json = serde_json::to_string(&options).unwrap();
        let parsed: ActivityOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn cancellation_flag() {
        let ctx = ActivityContext::new("wf", "noop", 1, 3);
        let handle = ctx.cancellation_handle();
        assert!(!ctx.is_cancelled());
        handle.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn heartbeat_reaches_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let ctx = ActivityContext::new("wf", "noop", 1, 3).with_heartbeat(tx);
        ctx.heartbeat();
        assert!(rx.recv().await.is_some());
    }

    #[test]
    fn last_attempt_detection() {
        assert!(ActivityContext::new("wf", "a", 3, 3).is_last_attempt());
        assert!(!ActivityContext::new("wf", "a", 2, 3).is_last_attempt());
    }
}
