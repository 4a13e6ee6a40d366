// Input/output records for activities and workflows.
//
// One record in, one record out, everywhere: no positional arguments cross
// the engine boundary, and every record tolerates missing optional fields so
// payloads stay forward compatible.

use std::collections::BTreeMap;

use harvest_contracts::{
    CrawlReport, Entry, EntryToTranslate, FeedInfo, ProcessedEntry, TranslatedEntry,
};
use harvest_contracts::entry::ExtractedLink;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Settings

/// Snapshot of backend settings plus worker feature flags, fetched once per
/// ingestion run and passed down to children so replay stays deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub target_language: String,
    pub enable_content_fetch: bool,
    pub enable_summarization: bool,
    pub ai_evaluation_enabled: bool,
    pub max_concurrent: usize,
    pub domain_fetch_delay: f64,
    /// "deepl", "ms" or empty for the default provider.
    pub translation_provider: String,
    pub distillation_batch_size: usize,
    pub embedding_backfill_batch_size: usize,
    pub search_reindex_batch_size: usize,
    pub global_graph_update_batch_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetAppSettingsInput {}

// ---------------------------------------------------------------------------
// API activities

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFeedsInput {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFeedsOutput {
    pub feeds: Vec<FeedInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEntryInput {
    pub entry_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEntryOutput {
    pub entry: Option<Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEntriesInput {
    pub entry_ids: Vec<String>,
}

/// An entry joined with its feed's extraction rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryWithRules {
    pub entry: Entry,
    pub extraction_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEntriesOutput {
    pub entries: Vec<EntryWithRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryContextInput {
    pub entry_id: String,
    pub context: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveEntryContextOutput {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUnsummarizedEntryIdsInput {
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListUnsummarizedEntryIdsOutput {
    pub entry_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Crawl

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSingleFeedInput {
    pub feed: FeedInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlSingleFeedOutput {
    pub report: CrawlReport,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Fetch

/// One entry to fetch, with the exclusion rules of its feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchTarget {
    pub entry_id: String,
    pub url: String,
    pub extraction_rules: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSingleContentInput {
    pub target: FetchTarget,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchSingleContentOutput {
    pub fetched: bool,
    pub content_chars: u32,
    pub links: Vec<ExtractedLink>,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Distillation

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistillEntryContentInput {
    pub entry_id: String,
    pub title: String,
    pub content: String,
    pub target_language: String,
    #[serde(default)]
    pub trace_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistillEntryContentOutput {
    pub result: Option<ProcessedEntry>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistillEntriesBatchInput {
    pub entry_ids: Vec<String>,
    pub target_language: String,
    #[serde(default)]
    pub batch_trace_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistillEntriesBatchOutput {
    pub processed: Vec<ProcessedEntry>,
    pub failed_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDistilledEntriesInput {
    pub entries: Vec<ProcessedEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveDistilledEntriesOutput {
    pub saved_count: u32,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Embeddings

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeEmbeddingsInput {
    pub entry_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputeEmbeddingsOutput {
    pub computed_count: u32,
    pub saved_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEntriesForEmbeddingInput {
    pub batch_size: u32,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEntriesForEmbeddingOutput {
    pub entry_ids: Vec<String>,
    pub total_count: u32,
    pub has_more: bool,
    pub end_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Translation

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateEntriesInput {
    pub entries: Vec<EntryToTranslate>,
    pub target_language: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateEntriesOutput {
    pub translations: Vec<TranslatedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTranslationsInput {
    pub translations: Vec<TranslatedEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveTranslationsOutput {
    pub saved_count: u32,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Search index

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntriesBatchInput {
    pub entry_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexEntriesBatchOutput {
    pub indexed_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveDocumentsFromIndexInput {
    pub document_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoveDocumentsFromIndexOutput {
    pub removed_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetOrphanedDocumentIdsInput {
    pub batch_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetOrphanedDocumentIdsOutput {
    pub orphaned_ids: Vec<String>,
    pub total_in_index: u32,
    pub total_in_db: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEntryIdsForIndexingInput {
    pub batch_size: u32,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEntryIdsForIndexingOutput {
    pub entry_ids: Vec<String>,
    pub total_count: u32,
    pub has_more: bool,
    pub end_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Knowledge graph

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToGlobalGraphInput {
    pub entry_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddToGlobalGraphOutput {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAndAddToGraphBulkInput {
    pub entry_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchAndAddToGraphBulkOutput {
    pub success_count: u32,
    pub failed_count: u32,
    /// Entries without filtered content are skipped, not failed.
    pub skipped_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetGlobalGraphInput {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetGlobalGraphOutput {
    pub success: bool,
    pub deleted_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToGraphRagSessionInput {
    pub entry_id: String,
    pub content: String,
    #[serde(default)]
    pub source_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddToGraphRagSessionOutput {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetGraphRagSessionInput {
    pub entry_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetGraphRagSessionOutput {
    pub success: bool,
    pub deleted_count: u32,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Enrichments and links

/// Repository metadata attached as a GitHub enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GithubRepoInfo {
    pub owner: String,
    pub repo: String,
    pub full_name: String,
    pub description: String,
    pub url: String,
    pub stars: u32,
    pub forks: u32,
    pub language: String,
    pub topics: Vec<String>,
    pub homepage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchGithubRepositoriesInput {
    pub entry_id: String,
    pub links: Vec<ExtractedLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchGithubRepositoriesOutput {
    pub repos: Vec<GithubRepoInfo>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGithubEnrichmentInput {
    pub entry_id: String,
    pub repos: Vec<GithubRepoInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveGithubEnrichmentOutput {
    pub success: bool,
    pub saved_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWebPageEnrichmentInput {
    pub entry_id: String,
    pub web_pages: Vec<ExtractedLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveWebPageEnrichmentOutput {
    pub success: bool,
    pub saved_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryLinksInput {
    pub entry_id: String,
    pub links: Vec<ExtractedLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveEntryLinksOutput {
    pub success: bool,
    pub saved_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEnrichmentActivityInput {
    pub entry_id: String,
    pub enrichment_type: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteEnrichmentActivityOutput {
    pub deleted: bool,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Cleanup

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOldEntriesInput {
    pub older_than_days: u32,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanupOldEntriesOutput {
    pub deleted_count: u32,
    pub deleted_ids: Vec<String>,
    pub cutoff_date: String,
    pub dry_run: bool,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Context extraction

/// Structured context distilled from one entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryContext {
    pub overview: String,
    pub topics: Vec<String>,
    pub entities: Vec<String>,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractEntryContextActivityInput {
    pub entry_id: String,
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub trace_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractEntryContextActivityOutput {
    pub context: Option<EntryContext>,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Evaluation

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRagasInput {
    pub trace_id: String,
    pub question: String,
    pub contexts: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluateRagasOutput {
    pub success: bool,
    pub scores: BTreeMap<String, f64>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizeItem {
    pub entry_id: String,
    #[serde(default)]
    pub trace_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateSummarizationInput {
    pub trace_id: String,
    pub items: Vec<SummarizeItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluateSummarizationOutput {
    pub success: bool,
    pub scores: BTreeMap<String, f64>,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Notify

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyProgressInput {
    pub workflow_id: String,
    #[serde(default)]
    pub progress: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyOutput {
    pub success: bool,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Workflow IO

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllFeedsIngestionInput {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllFeedsIngestionResult {
    pub status: String,
    pub feeds_processed: u32,
    pub entries_created: u32,
    pub failed_feeds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleFeedIngestionInput {
    pub feed: FeedInfo,
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SingleFeedIngestionResult {
    pub status: String,
    pub entries_created: u32,
    pub entries_fetched: u32,
    pub entries_distilled: u32,
    pub entries_translated: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainFetchInput {
    pub targets: Vec<FetchTarget>,
    #[serde(default)]
    pub delay_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainFetchResult {
    pub status: String,
    pub fetched_count: u32,
    pub failed_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDistillationInput {
    pub entry_ids: Vec<String>,
    pub target_language: String,
    #[serde(default)]
    pub batch_size: usize,
    #[serde(default)]
    pub evaluate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDistillationResult {
    pub status: String,
    pub processed_count: u32,
    pub failed_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationInput {
    pub entry_ids: Vec<String>,
    pub target_language: String,
    /// "deepl", "ms" or empty for the default provider.
    #[serde(default)]
    pub provider: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationResult {
    pub status: String,
    pub translated_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingBackfillInput {
    pub batch_size: usize,
    /// When set, only these entries are processed (ingestion scoping).
    pub entry_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingBackfillResult {
    pub status: String,
    pub total_count: u32,
    pub computed_count: u32,
    pub saved_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchReindexInput {
    pub batch_size: usize,
    pub entry_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchReindexResult {
    pub status: String,
    pub indexed_count: u32,
    pub total_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPruneInput {
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPruneResult {
    pub status: String,
    pub removed_count: u32,
    pub total_in_index: u32,
    pub total_in_db: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesCleanupInput {
    pub older_than_days: u32,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntriesCleanupResult {
    pub status: String,
    pub deleted_count: u32,
    pub search_removed_count: u32,
    pub older_than_days: u32,
    pub cutoff_date: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphRebuildInput {
    pub batch_size: usize,
    pub clean: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphRebuildResult {
    pub status: String,
    pub added_count: u32,
    pub total_count: u32,
    pub deleted_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalGraphUpdateInput {
    pub batch_size: usize,
    pub entry_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalGraphUpdateResult {
    pub status: String,
    pub added_count: u32,
    pub skipped_count: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryIndexInput {
    pub entry_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateEntryIndexResult {
    pub status: String,
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractEntryContextInput {
    pub entry_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractEntryContextResult {
    pub status: String,
    pub context: Option<EntryContext>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEnrichmentInput {
    pub entry_id: String,
    pub enrichment_type: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteEnrichmentResult {
    pub status: String,
    pub deleted: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInput {
    pub trace_id: String,
    pub mode: String,
    pub question: String,
    pub contexts: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationResult {
    pub trace_id: String,
    pub mode: String,
    pub scores: BTreeMap<String, f64>,
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationEvaluationInput {
    pub trace_id: String,
    pub items: Vec<SummarizeItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizationEvaluationResult {
    pub trace_id: String,
    pub scores: BTreeMap<String, f64>,
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip_in_camel_case() {
        let input = DistillEntriesBatchInput {
            entry_ids: vec!["e1".to_string()],
            target_language: "ja".to_string(),
            batch_trace_id: "abc".to_string(),
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["entryIds"][0], "e1");
        assert_eq!(value["targetLanguage"], "ja");
        assert_eq!(value["batchTraceId"], "abc");

        let back: DistillEntriesBatchInput = serde_json::from_value(value).unwrap();
        assert_eq!(back.entry_ids, input.entry_ids);
    }

    #[test]
    fn outputs_tolerate_missing_fields() {
        let output: CleanupOldEntriesOutput = serde_json::from_value(serde_json::json!({
            "deletedCount": 3,
        }))
        .unwrap();
        assert_eq!(output.deleted_count, 3);
        assert!(output.deleted_ids.is_empty());
        assert!(output.error.is_empty());
    }

    #[test]
    fn settings_defaults_are_safe() {
        let settings: AppSettings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(settings.target_language.is_empty());
        assert!(!settings.enable_content_fetch);
        assert_eq!(settings.max_concurrent, 0);
    }
}
