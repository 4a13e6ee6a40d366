// Embedding activities: compute-and-save plus the backfill pagination query.

use harvest_durable::prelude::*;
use harvest_llm::Embedder;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::Services;

pub struct ComputeEmbeddings {
    svc: Services,
}

impl ComputeEmbeddings {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for ComputeEmbeddings {
    const TYPE: &'static str = "compute_embeddings";
    type Input = ComputeEmbeddingsInput;
    type Output = ComputeEmbeddingsOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.entry_ids.is_empty() {
            return Ok(ComputeEmbeddingsOutput::default());
        }
        if self.svc.config.embedding_model.is_empty() {
            return Ok(ComputeEmbeddingsOutput {
                error: "embedding disabled: no model configured".to_string(),
                ..Default::default()
            });
        }

        let mut computed_count = 0;
        let mut saved_count = 0;
        let mut errors = Vec::new();

        for entry_id in &input.entry_ids {
            let entry = match self.svc.api.get_entry(entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!(entry_id = %entry_id, "entry not found");
                    continue;
                }
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    errors.push(format!("{entry_id}: {message}"));
                    continue;
                }
            };

            let text = entry.embedding_text();
            if text.is_empty() {
                warn!(entry_id = %entry_id, "no content for embedding");
                continue;
            }

            // Model access serializes on the process-wide worker.
            let vector = match Embedder::global().embed(text).await {
                Ok(vector) => vector,
                Err(err) => {
                    warn!(entry_id = %entry_id, error = %err, "embedding failed");
                    continue;
                }
            };
            computed_count += 1;
            ctx.heartbeat();

            match self.svc.api.save_embedding(entry_id, &vector).await {
                Ok(true) => saved_count += 1,
                Ok(false) => warn!(entry_id = %entry_id, "entry vanished before embedding save"),
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    errors.push(format!("{entry_id}: {message}"));
                }
            }
            ctx.heartbeat();
        }

        info!(computed_count, saved_count, "computed embeddings");
        Ok(ComputeEmbeddingsOutput {
            computed_count,
            saved_count,
            error: errors.join("; "),
        })
    }
}

pub struct GetEntriesForEmbedding {
    svc: Services,
}

impl GetEntriesForEmbedding {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for GetEntriesForEmbedding {
    const TYPE: &'static str = "get_entries_for_embedding";
    type Input = GetEntriesForEmbeddingInput;
    type Output = GetEntriesForEmbeddingOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let page = match self
            .svc
            .api
            .entries_missing_embedding(input.batch_size, input.after.as_deref())
            .await
        {
            Ok(page) => page,
            Err(err) => {
                let message = client_error_or_raise(err)?;
                warn!(error = %message, "embedding pagination rejected");
                return Ok(GetEntriesForEmbeddingOutput::default());
            }
        };
        Ok(GetEntriesForEmbeddingOutput {
            entry_ids: page.entry_ids,
            total_count: page.total_count,
            has_more: page.has_more,
            end_cursor: page.end_cursor,
        })
    }
}
