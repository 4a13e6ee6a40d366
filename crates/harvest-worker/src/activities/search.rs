// Search-index maintenance through the backend's Meilisearch proxy.

use std::collections::HashSet;

use harvest_durable::prelude::*;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::Services;

pub struct IndexEntriesBatch {
    svc: Services,
}

impl IndexEntriesBatch {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for IndexEntriesBatch {
    const TYPE: &'static str = "index_entries_batch";
    type Input = IndexEntriesBatchInput;
    type Output = IndexEntriesBatchOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.entry_ids.is_empty() {
            return Ok(IndexEntriesBatchOutput::default());
        }
        match self.svc.api.index_entries(&input.entry_ids).await {
            Ok(indexed_count) => {
                info!(indexed_count, "indexed entries");
                Ok(IndexEntriesBatchOutput {
                    indexed_count,
                    error: String::new(),
                })
            }
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(IndexEntriesBatchOutput {
                    indexed_count: 0,
                    error: message,
                })
            }
        }
    }
}

pub struct RemoveDocumentsFromIndex {
    svc: Services,
}

impl RemoveDocumentsFromIndex {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for RemoveDocumentsFromIndex {
    const TYPE: &'static str = "remove_documents_from_index";
    type Input = RemoveDocumentsFromIndexInput;
    type Output = RemoveDocumentsFromIndexOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.document_ids.is_empty() {
            return Ok(RemoveDocumentsFromIndexOutput::default());
        }
        match self.svc.api.remove_documents(&input.document_ids).await {
            Ok(removed_count) => Ok(RemoveDocumentsFromIndexOutput {
                removed_count,
                error: String::new(),
            }),
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(RemoveDocumentsFromIndexOutput {
                    removed_count: 0,
                    error: message,
                })
            }
        }
    }
}

/// Documents present in the index but absent from the database.
pub struct GetOrphanedDocumentIds {
    svc: Services,
}

impl GetOrphanedDocumentIds {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for GetOrphanedDocumentIds {
    const TYPE: &'static str = "get_orphaned_document_ids";
    type Input = GetOrphanedDocumentIdsInput;
    type Output = GetOrphanedDocumentIdsOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        _input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let index_ids = match self.svc.api.index_document_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                let message = client_error_or_raise(err)?;
                return Ok(GetOrphanedDocumentIdsOutput {
                    error: message,
                    ..Default::default()
                });
            }
        };
        ctx.heartbeat();

        let db_ids: HashSet<String> = match self.svc.api.all_entry_ids().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                let message = client_error_or_raise(err)?;
                return Ok(GetOrphanedDocumentIdsOutput {
                    error: message,
                    ..Default::default()
                });
            }
        };
        ctx.heartbeat();

        let total_in_index = index_ids.len() as u32;
        let total_in_db = db_ids.len() as u32;
        let orphaned_ids: Vec<String> = index_ids
            .into_iter()
            .filter(|id| !db_ids.contains(id))
            .collect();

        info!(
            total_in_index,
            total_in_db,
            orphaned = orphaned_ids.len(),
            "orphan scan finished"
        );
        Ok(GetOrphanedDocumentIdsOutput {
            orphaned_ids,
            total_in_index,
            total_in_db,
            error: String::new(),
        })
    }
}

pub struct GetEntryIdsForIndexing {
    svc: Services,
}

impl GetEntryIdsForIndexing {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for GetEntryIdsForIndexing {
    const TYPE: &'static str = "get_entry_ids_for_indexing";
    type Input = GetEntryIdsForIndexingInput;
    type Output = GetEntryIdsForIndexingOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let page = match self
            .svc
            .api
            .entries_with_filtered_content(input.batch_size, input.after.as_deref())
            .await
        {
            Ok(page) => page,
            Err(err) => {
                let message = client_error_or_raise(err)?;
                warn!(error = %message, "indexing pagination rejected");
                return Ok(GetEntryIdsForIndexingOutput::default());
            }
        };
        Ok(GetEntryIdsForIndexingOutput {
            entry_ids: page.entry_ids,
            total_count: page.total_count,
            has_more: page.has_more,
            end_cursor: page.end_cursor,
        })
    }
}
