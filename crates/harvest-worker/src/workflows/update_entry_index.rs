// Single-entry index refresh, started fire-and-forget from the frontend.

use harvest_durable::prelude::*;

use crate::activities::IndexEntriesBatch;
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

pub struct UpdateEntryIndexWorkflow;

#[async_trait]
impl Workflow for UpdateEntryIndexWorkflow {
    const TYPE: &'static str = "update_entry_index";
    type Input = UpdateEntryIndexInput;
    type Output = UpdateEntryIndexResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        progress.update(|p| p.entity_ids = vec![input.entry_id.clone()]);
        progress.step(&ctx, "index", "Updating search index").await;

        let indexed = match ctx
            .activity::<IndexEntriesBatch>(
                IndexEntriesBatchInput {
                    entry_ids: vec![input.entry_id.clone()],
                },
                ActivityOptions::short(),
            )
            .await
        {
            Ok(indexed) => indexed,
            Err(err) => {
                progress.fail(&ctx, err.to_string()).await;
                return Err(err.into());
            }
        };

        if !indexed.error.is_empty() {
            progress.fail(&ctx, indexed.error.clone()).await;
            return Ok(UpdateEntryIndexResult {
                status: "error".to_string(),
                success: false,
                error: indexed.error,
            });
        }

        progress.complete(&ctx, "Index updated").await;
        Ok(UpdateEntryIndexResult {
            status: "completed".to_string(),
            success: true,
            error: String::new(),
        })
    }
}
