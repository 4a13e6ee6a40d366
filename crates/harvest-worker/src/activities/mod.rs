// Activity library: idempotent units of I/O invoked by workflows.
//
// Shared failure semantics: recoverable transport and 5xx errors are
// returned as `Err` so the engine retries; expected domain errors (404s,
// validation rejections) are carried in the output record's `error` field
// and never raise.

pub mod api;
pub mod cleanup;
pub mod context;
pub mod crawl;
pub mod distill;
pub mod embedding;
pub mod enrichment;
pub mod evaluation;
pub mod fetch;
pub mod graph;
pub mod notify;
pub mod search;
pub mod translate;

pub use api::{
    GetAppSettings, GetEntries, GetEntry, ListFeeds, ListUnsummarizedEntryIds, SaveEntryContext,
};
pub use cleanup::CleanupOldEntries;
pub use context::ExtractEntryContext;
pub use crawl::CrawlSingleFeed;
pub use distill::{DistillEntriesBatch, DistillEntryContent, SaveDistilledEntries};
pub use embedding::{ComputeEmbeddings, GetEntriesForEmbedding};
pub use enrichment::{
    DeleteEnrichment, SaveEntryLinks, SaveGithubEnrichment, SaveWebPageEnrichment,
    SearchGithubRepositories,
};
pub use evaluation::{EvaluateRagas, EvaluateSummarization};
pub use fetch::FetchSingleContent;
pub use graph::{
    AddToGlobalGraph, AddToGraphRagSession, FetchAndAddToGraphBulk, ResetGlobalGraph,
    ResetGraphRagSession,
};
pub use notify::NotifyProgress;
pub use search::{
    GetEntryIdsForIndexing, GetOrphanedDocumentIds, IndexEntriesBatch, RemoveDocumentsFromIndex,
};
pub use translate::{DeeplTranslateEntries, MsTranslateEntries, SaveTranslations};

use harvest_durable::ActivityError;

use crate::services::api::ApiError;

/// Map an API error to the activity contract: client errors become a
/// structured message for the output record, everything else raises so the
/// engine retries.
pub(crate) fn client_error_or_raise(err: ApiError) -> Result<String, ActivityError> {
    match err {
        ApiError::Client { status, body } => Ok(format!("client error {status}: {body}")),
        ApiError::Server { status, body } => {
            Err(ActivityError::retryable(format!("server error {status}: {body}"))
                .with_type("SERVER_ERROR"))
        }
        ApiError::Transport(e) => {
            Err(ActivityError::retryable(format!("transport error: {e}")).with_type("TRANSPORT"))
        }
        ApiError::Decode(e) => {
            Err(ActivityError::retryable(format!("response decode error: {e}")).with_type("DECODE"))
        }
    }
}
