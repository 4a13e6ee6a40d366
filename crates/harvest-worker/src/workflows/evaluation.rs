// Fire-and-forget evaluation workflows: RAGAS scoring for chat answers and
// for batch summaries, recorded to the tracing store.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::info;

use crate::activities::{EvaluateRagas, EvaluateSummarization};
use crate::models::*;

pub struct EvaluationWorkflow;

#[async_trait]
impl Workflow for EvaluationWorkflow {
    const TYPE: &'static str = "evaluation";
    type Input = EvaluationInput;
    type Output = EvaluationResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        info!(
            workflow_id = %ctx.workflow_id(),
            trace_id = %input.trace_id,
            mode = %input.mode,
            question_len = input.question.len(),
            "evaluation started"
        );

        let evaluated = ctx
            .activity::<EvaluateRagas>(
                EvaluateRagasInput {
                    trace_id: input.trace_id.clone(),
                    question: input.question,
                    contexts: input.contexts,
                    answer: input.answer,
                },
                ActivityOptions::long(Duration::from_secs(300)).with_retry(
                    RetryPolicy::exponential()
                        .with_max_attempts(2)
                        .with_initial_interval(Duration::from_secs(5)),
                ),
            )
            .await?;

        info!(
            workflow_id = %ctx.workflow_id(),
            success = evaluated.success,
            "evaluation finished"
        );
        Ok(EvaluationResult {
            trace_id: input.trace_id,
            mode: input.mode,
            scores: evaluated.scores,
            success: evaluated.success,
            error: evaluated.error,
        })
    }
}

pub struct SummarizationEvaluationWorkflow;

#[async_trait]
impl Workflow for SummarizationEvaluationWorkflow {
    const TYPE: &'static str = "summarization_evaluation";
    type Input = SummarizationEvaluationInput;
    type Output = SummarizationEvaluationResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        info!(
            workflow_id = %ctx.workflow_id(),
            trace_id = %input.trace_id,
            items = input.items.len(),
            "summarization evaluation started"
        );

        let evaluated = ctx
            .activity::<EvaluateSummarization>(
                EvaluateSummarizationInput {
                    trace_id: input.trace_id.clone(),
                    items: input.items,
                },
                ActivityOptions::long(Duration::from_secs(600))
                    .with_heartbeat(Duration::from_secs(120))
                    .with_retry(
                        RetryPolicy::exponential()
                            .with_max_attempts(2)
                            .with_initial_interval(Duration::from_secs(5)),
                    ),
            )
            .await?;

        Ok(SummarizationEvaluationResult {
            trace_id: input.trace_id,
            scores: evaluated.scores,
            success: evaluated.success,
            error: evaluated.error,
        })
    }
}
