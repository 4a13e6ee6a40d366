// Fire-and-forget submission of evaluation workflows to the durable engine.

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AgentState;

/// Input of the worker's evaluation workflow, mirrored here so the agent
/// does not depend on the worker crate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationInput<'a> {
    trace_id: &'a str,
    mode: &'a str,
    question: &'a str,
    contexts: Vec<String>,
    answer: &'a str,
}

/// Submit an evaluation workflow without awaiting its result. Returns the
/// workflow id, or None when the engine is unavailable or rejects the
/// submission.
pub async fn start_evaluation_workflow(
    state: &AgentState,
    trace_id: &str,
    mode: &str,
    question: &str,
    contexts: Vec<String>,
    answer: &str,
) -> Option<String> {
    let client = state.engine.as_ref()?;

    let suffix = Uuid::now_v7().simple().to_string();
    let workflow_id = format!("evaluation-{mode}-{}", &suffix[..8]);

    let input = EvaluationInput {
        trace_id,
        mode,
        question,
        contexts,
        answer,
    };
    match client
        .start_workflow(
            "evaluation",
            &input,
            &workflow_id,
            &state.settings.temporal_task_queue,
        )
        .await
    {
        Ok(()) => {
            info!(workflow_id = %workflow_id, trace_id, mode, "started evaluation workflow");
            Some(workflow_id)
        }
        Err(err) => {
            error!(trace_id, mode, error = %err, "failed to start evaluation workflow");
            None
        }
    }
}
