// Single-enrichment deletion, triggered from the entry's context panel.

use harvest_durable::prelude::*;

use crate::activities::DeleteEnrichment;
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

pub struct DeleteEnrichmentWorkflow;

#[async_trait]
impl Workflow for DeleteEnrichmentWorkflow {
    const TYPE: &'static str = "delete_enrichment";
    type Input = DeleteEnrichmentInput;
    type Output = DeleteEnrichmentResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        progress.update(|p| p.entity_ids = vec![input.entry_id.clone()]);
        progress
            .step(
                &ctx,
                "deleting",
                format!("Deleting {} enrichment", input.enrichment_type),
            )
            .await;

        let deleted = match ctx
            .activity::<DeleteEnrichment>(
                DeleteEnrichmentActivityInput {
                    entry_id: input.entry_id.clone(),
                    enrichment_type: input.enrichment_type.clone(),
                    source: input.source.clone(),
                },
                ActivityOptions::short()
                    .with_retry(RetryPolicy::exponential().with_max_attempts(2)),
            )
            .await
        {
            Ok(deleted) => deleted,
            Err(err) => {
                progress.fail(&ctx, err.to_string()).await;
                return Ok(DeleteEnrichmentResult {
                    status: "error".to_string(),
                    deleted: false,
                    error: err.to_string(),
                });
            }
        };

        let message = if deleted.deleted {
            "Enrichment deleted"
        } else {
            "Enrichment not found"
        };
        progress.complete(&ctx, message).await;

        Ok(DeleteEnrichmentResult {
            status: if deleted.deleted {
                "completed".to_string()
            } else {
                "not_found".to_string()
            },
            deleted: deleted.deleted,
            error: deleted.error,
        })
    }
}
