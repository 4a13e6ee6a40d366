// Entry context extraction: fetch, extract via LLM, save, then rebuild the
// entry's GraphRAG session with a clean reset before the add.

use std::time::Duration;

use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{
    AddToGraphRagSession, ExtractEntryContext, GetEntry, ResetGraphRagSession, SaveEntryContext,
};
use crate::models::*;
use crate::trace::entry_trace_id;
use crate::workflows::progress::ProgressHandle;

pub struct ExtractEntryContextWorkflow;

#[async_trait]
impl Workflow for ExtractEntryContextWorkflow {
    const TYPE: &'static str = "extract_entry_context";
    type Input = ExtractEntryContextInput;
    type Output = ExtractEntryContextResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        progress.update(|p| p.entity_ids = vec![input.entry_id.clone()]);
        let outcome = run_inner(&ctx, input, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

/// Best content for context extraction: filtered, then full, then raw feed
/// HTML (which the extraction activity can still digest as text).
fn content_of(entry: &harvest_contracts::Entry) -> String {
    if !entry.filtered_content.trim().is_empty() {
        entry.filtered_content.clone()
    } else if !entry.full_content.trim().is_empty() {
        entry.full_content.clone()
    } else {
        entry.feed_content.clone()
    }
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: ExtractEntryContextInput,
    progress: &ProgressHandle,
) -> Result<ExtractEntryContextResult, WorkflowError> {
    let entry_id = input.entry_id;

    // 1. Fetch the entry.
    progress.step(ctx, "load", "Loading entry").await;
    let fetched = ctx
        .activity::<GetEntry>(
            GetEntryInput {
                entry_id: entry_id.clone(),
            },
            ActivityOptions::short(),
        )
        .await?;
    let Some(entry) = fetched.entry else {
        progress.complete(ctx, "Entry not found").await;
        return Ok(ExtractEntryContextResult {
            status: "not_found".to_string(),
            context: None,
            error: String::new(),
        });
    };

    // 2. Pick content.
    let content = content_of(&entry);
    if content.trim().is_empty() {
        progress.complete(ctx, "Entry has no content").await;
        return Ok(ExtractEntryContextResult {
            status: "completed".to_string(),
            context: None,
            error: String::new(),
        });
    }

    // 3. Extract structured context.
    progress.step(ctx, "extract", "Extracting context").await;
    let extracted = ctx
        .activity::<ExtractEntryContext>(
            ExtractEntryContextActivityInput {
                entry_id: entry_id.clone(),
                title: entry.title.clone(),
                url: entry.url.clone(),
                content: content.clone(),
                trace_id: entry_trace_id(&entry_id, None),
            },
            ActivityOptions::long(Duration::from_secs(120)),
        )
        .await?;
    let Some(context) = extracted.context else {
        progress.complete(ctx, "No context extracted").await;
        return Ok(ExtractEntryContextResult {
            status: "completed".to_string(),
            context: None,
            error: extracted.error,
        });
    };

    // 4. Save it.
    progress.step(ctx, "save", "Saving context").await;
    let saved = ctx
        .activity::<SaveEntryContext>(
            SaveEntryContextInput {
                entry_id: entry_id.clone(),
                context: serde_json::to_value(&context).unwrap_or_default(),
            },
            ActivityOptions::short(),
        )
        .await?;
    if !saved.success {
        warn!(entry_id = %entry_id, error = %saved.error, "context save failed");
    }

    // 5. Rebuild the GraphRAG session: reset first for a clean slate.
    progress.step(ctx, "session", "Rebuilding research session").await;
    ctx.activity::<ResetGraphRagSession>(
        ResetGraphRagSessionInput {
            entry_id: entry_id.clone(),
        },
        ActivityOptions::long(Duration::from_secs(60)),
    )
    .await?;

    let added = ctx
        .activity::<AddToGraphRagSession>(
            AddToGraphRagSessionInput {
                entry_id: entry_id.clone(),
                content,
                source_type: "entry".to_string(),
            },
            ActivityOptions::long(Duration::from_secs(120)),
        )
        .await?;
    if !added.success {
        warn!(entry_id = %entry_id, error = %added.error, "graph session add failed");
    }

    progress.complete(ctx, "Context extracted").await;
    Ok(ExtractEntryContextResult {
        status: "completed".to_string(),
        context: Some(context),
        error: String::new(),
    })
}
