//! End-to-end tests for the embedded engine: submission, retries,
//! heartbeats, timers, children, queries, cancellation and replay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use harvest_durable::prelude::*;
use harvest_durable::{Client, ClientError, Worker};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EchoInput {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EchoOutput {
    text: String,
}

struct EchoActivity {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Activity for EchoActivity {
    const TYPE: &'static str = "echo";
    type Input = EchoInput;
    type Output = EchoOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EchoOutput { text: input.text })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShoutInput {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShoutOutput {
    text: String,
    started_at: String,
}

struct ShoutWorkflow;

#[async_trait]
impl Workflow for ShoutWorkflow {
    const TYPE: &'static str = "shout";
    type Input = ShoutInput;
    type Output = ShoutOutput;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        let started_at = ctx.now_iso();
        let echoed = ctx
            .activity::<EchoActivity>(EchoInput { text: input.text }, ActivityOptions::short())
            .await?;
        ctx.sleep(Duration::from_millis(10)).await?;
        Ok(ShoutOutput {
            text: echoed.text.to_uppercase(),
            started_at,
        })
    }
}

fn shout_worker(calls: Arc<AtomicUsize>) -> Worker {
    Worker::builder()
        .workflow(ShoutWorkflow)
        .activity(EchoActivity { calls })
        .build()
}

#[tokio::test]
async fn execute_workflow_round_trip() {
    let worker = shout_worker(Arc::new(AtomicUsize::new(0)));
    let client = Client::embedded(worker.engine(), "default");

    let output: ShoutOutput = client
        .execute_workflow("shout", &ShoutInput { text: "hi".into() }, "wf-1", "q")
        .await
        .unwrap();
    assert_eq!(output.text, "HI");
    assert!(!output.started_at.is_empty());
}

#[tokio::test]
async fn duplicate_id_same_content_is_idempotent() {
    let worker = shout_worker(Arc::new(AtomicUsize::new(0)));
    let client = Client::embedded(worker.engine(), "default");
    let input = ShoutInput { text: "x".into() };

    client
        .start_workflow("shout", &input, "wf-dup", "q")
        .await
        .unwrap();
    // Same id, same content: accepted without starting a second run.
    client
        .start_workflow("shout", &input, "wf-dup", "q")
        .await
        .unwrap();
    // Same id, different content: conflict.
    let err = client
        .start_workflow("shout", &ShoutInput { text: "y".into() }, "wf-dup", "q")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Conflict(_)));
}

struct FlakyActivity {
    calls: Arc<AtomicUsize>,
    fail_times: usize,
}

#[async_trait]
impl Activity for FlakyActivity {
    const TYPE: &'static str = "flaky";
    type Input = EchoInput;
    type Output = EchoOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(ctx.attempt as usize, call + 1);
        if call < self.fail_times {
            return Err(ActivityError::retryable("transient"));
        }
        Ok(EchoOutput { text: input.text })
    }
}

struct FlakyWorkflow;

#[async_trait]
impl Workflow for FlakyWorkflow {
    const TYPE: &'static str = "flaky_wf";
    type Input = ShoutInput;
    type Output = EchoOutput;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        let options = ActivityOptions::short().with_retry(
            RetryPolicy::exponential()
                .with_max_attempts(3)
                .with_initial_interval(Duration::from_millis(10))
                .with_jitter(0.0),
        );
        Ok(ctx
            .activity::<FlakyActivity>(EchoInput { text: input.text }, options)
            .await?)
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::builder()
        .workflow(FlakyWorkflow)
        .activity(FlakyActivity {
            calls: calls.clone(),
            fail_times: 2,
        })
        .build();
    let client = Client::embedded(worker.engine(), "default");

    let output: EchoOutput = client
        .execute_workflow("flaky_wf", &ShoutInput { text: "ok".into() }, "wf-r", "q")
        .await
        .unwrap();
    assert_eq!(output.text, "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_exhaust_into_workflow_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::builder()
        .workflow(FlakyWorkflow)
        .activity(FlakyActivity {
            calls: calls.clone(),
            fail_times: 10,
        })
        .build();
    let client = Client::embedded(worker.engine(), "default");

    let err = client
        .execute_workflow::<_, EchoOutput>("flaky_wf", &ShoutInput { text: "x".into() }, "wf-f", "q")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::WorkflowFailed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

struct SilentActivity;

#[async_trait]
impl Activity for SilentActivity {
    const TYPE: &'static str = "silent";
    type Input = EchoInput;
    type Output = EchoOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        // Never heartbeats.
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(EchoOutput { text: input.text })
    }
}

struct SilentWorkflow;

#[async_trait]
impl Workflow for SilentWorkflow {
    const TYPE: &'static str = "silent_wf";
    type Input = ShoutInput;
    type Output = EchoOutput;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        let options = ActivityOptions::short()
            .with_heartbeat(Duration::from_millis(50))
            .with_retry(RetryPolicy::no_retry());
        Ok(ctx
            .activity::<SilentActivity>(EchoInput { text: input.text }, options)
            .await?)
    }
}

#[tokio::test]
async fn missed_heartbeat_fails_the_attempt() {
    let worker = Worker::builder()
        .workflow(SilentWorkflow)
        .activity(SilentActivity)
        .build();
    let client = Client::embedded(worker.engine(), "default");

    let err = client
        .execute_workflow::<_, EchoOutput>("silent_wf", &ShoutInput { text: "x".into() }, "wf-hb", "q")
        .await
        .unwrap_err();
    match err {
        ClientError::WorkflowFailed(failure) => {
            assert_eq!(failure.code.as_deref(), Some("HEARTBEAT_TIMEOUT"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentInput {
    texts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentOutput {
    results: Vec<String>,
}

struct ParentWorkflow;

#[async_trait]
impl Workflow for ParentWorkflow {
    const TYPE: &'static str = "parent";
    type Input = ParentInput;
    type Output = ParentOutput;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        let mut results = Vec::new();
        for (i, text) in input.texts.into_iter().enumerate() {
            let child_id = format!("{}-child-{i}", ctx.workflow_id());
            let output = ctx
                .child::<ShoutWorkflow>(ShoutInput { text }, &child_id)
                .await?;
            results.push(output.text);
        }
        Ok(ParentOutput { results })
    }
}

#[tokio::test]
async fn child_workflows_complete_in_order() {
    let worker = Worker::builder()
        .workflow(ParentWorkflow)
        .workflow(ShoutWorkflow)
        .activity(EchoActivity {
            calls: Arc::new(AtomicUsize::new(0)),
        })
        .build();
    let client = Client::embedded(worker.engine(), "default");

    let output: ParentOutput = client
        .execute_workflow(
            "parent",
            &ParentInput {
                texts: vec!["a".into(), "b".into()],
            },
            "wf-p",
            "q",
        )
        .await
        .unwrap();
    assert_eq!(output.results, vec!["A", "B"]);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickInput {
    ticks: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
struct TickProgress {
    done: u32,
}

struct TickingWorkflow;

#[async_trait]
impl Workflow for TickingWorkflow {
    const TYPE: &'static str = "ticking";
    type Input = TickInput;
    type Output = TickProgress;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        let progress = Arc::new(std::sync::Mutex::new(TickProgress { done: 0 }));
        {
            let progress = progress.clone();
            ctx.register_query("get_progress", move || {
                serde_json::to_value(progress.lock().unwrap().clone()).unwrap_or_default()
            });
        }
        for i in 0..input.ticks {
            ctx.sleep(Duration::from_millis(30)).await?;
            progress.lock().unwrap().done = i + 1;
        }
        let done = progress.lock().unwrap().done;
        Ok(TickProgress { done })
    }
}

#[tokio::test]
async fn queries_are_served_from_the_live_instance() {
    let worker = Worker::builder().workflow(TickingWorkflow).build();
    let client = Client::embedded(worker.engine(), "default");

    client
        .start_workflow("ticking", &TickInput { ticks: 5 }, "wf-q", "q")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    let progress: TickProgress = client.query_workflow("wf-q", "get_progress").await.unwrap();
    assert!(progress.done >= 1 && progress.done < 5);

    let final_result: TickProgress = client
        .execute_workflow("ticking", &TickInput { ticks: 5 }, "wf-q", "q")
        .await
        .unwrap();
    assert_eq!(final_result.done, 5);
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyOutput {
    success: bool,
    error: String,
}

struct CooperativeActivity;

#[async_trait]
impl Activity for CooperativeActivity {
    const TYPE: &'static str = "cooperative";
    type Input = EchoInput;
    type Output = NotifyOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        _input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(5)) => Ok(NotifyOutput {
                success: true,
                error: String::new(),
            }),
            _ = ctx.cancelled() => Ok(NotifyOutput {
                success: false,
                error: "cancelled".to_string(),
            }),
        }
    }
}

struct CancellableWorkflow;

#[async_trait]
impl Workflow for CancellableWorkflow {
    const TYPE: &'static str = "cancellable";
    type Input = ShoutInput;
    type Output = NotifyOutput;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        // The cancelled notify result comes back as a normal output, so the
        // workflow can finish its bookkeeping silently.
        Ok(ctx
            .activity::<CooperativeActivity>(EchoInput { text: input.text }, ActivityOptions::short())
            .await?)
    }
}

#[tokio::test]
async fn cancellation_is_surfaced_cooperatively() {
    let worker = Worker::builder()
        .workflow(CancellableWorkflow)
        .activity(CooperativeActivity)
        .build();
    let engine = worker.engine();
    let client = Client::embedded(engine.clone(), "default");

    client
        .start_workflow("cancellable", &ShoutInput { text: "x".into() }, "wf-c", "q")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.cancel("wf-c"));

    let output: NotifyOutput = client
        .execute_workflow("cancellable", &ShoutInput { text: "x".into() }, "wf-c", "q")
        .await
        .unwrap();
    assert!(!output.success);
    assert_eq!(output.error, "cancelled");
}

#[tokio::test]
async fn restart_replays_without_re_executing_activities() {
    let calls = Arc::new(AtomicUsize::new(0));
    let worker = shout_worker(calls.clone());
    let engine = worker.engine();
    let client = Client::embedded(engine.clone(), "default");

    let first: ShoutOutput = client
        .execute_workflow("shout", &ShoutInput { text: "replay".into() }, "wf-rp", "q")
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.restart_workflow("wf-rp").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The activity was served from history, not re-executed, and the
    // replayed run observed the same engine time.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let replayed = engine.peek_result("wf-rp").unwrap().unwrap().unwrap();
    assert_eq!(replayed["text"], "REPLAY");
    assert_eq!(replayed["startedAt"], first.started_at);
}

struct FanOutWorkflow;

#[async_trait]
impl Workflow for FanOutWorkflow {
    const TYPE: &'static str = "fan_out";
    type Input = ParentInput;
    type Output = ParentOutput;

    async fn run(&self, ctx: WorkflowCtx, input: Self::Input) -> Result<Self::Output, WorkflowError> {
        // Branch per item: each branch records into its own history range.
        let tasks = input.texts.into_iter().enumerate().map(|(i, text)| {
            let ctx = ctx.branch(i as u32);
            async move {
                let echoed = ctx
                    .activity::<EchoActivity>(EchoInput { text }, ActivityOptions::short())
                    .await?;
                ctx.sleep(Duration::from_millis(5)).await?;
                Ok::<String, WorkflowError>(echoed.text)
            }
        });
        let mut results = Vec::new();
        for outcome in futures::future::join_all(tasks).await {
            results.push(outcome?);
        }
        Ok(ParentOutput { results })
    }
}

#[tokio::test]
async fn branched_fan_out_replays_cleanly() {
    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::builder()
        .workflow(FanOutWorkflow)
        .activity(EchoActivity {
            calls: calls.clone(),
        })
        .build();
    let engine = worker.engine();
    let client = Client::embedded(engine.clone(), "default");

    let output: ParentOutput = client
        .execute_workflow(
            "fan_out",
            &ParentInput {
                texts: vec!["a".into(), "b".into(), "c".into()],
            },
            "wf-fan",
            "q",
        )
        .await
        .unwrap();
    assert_eq!(output.results, vec!["a", "b", "c"]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Replay serves every branch's steps from history.
    engine.restart_workflow("wf-fan").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let replayed = engine.peek_result("wf-fan").unwrap().unwrap().unwrap();
    assert_eq!(replayed["results"][2], "c");
}
