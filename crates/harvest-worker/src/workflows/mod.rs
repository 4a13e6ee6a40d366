// Workflow library: replay-safe orchestration over the durable engine.
//
// Every workflow owns a progress record exposed through the `get_progress`
// query and broadcast via the notify_progress local activity after each
// meaningful state change. Cancellation surfaces a final error snapshot
// before unwinding.

pub mod progress;

pub mod all_feeds_ingestion;
pub mod content_distillation;
pub mod delete_enrichment;
pub mod domain_fetch;
pub mod embedding_backfill;
pub mod entries_cleanup;
pub mod evaluation;
pub mod extract_entry_context;
pub mod global_graph_update;
pub mod graph_rebuild;
pub mod search_prune;
pub mod search_reindex;
pub mod single_feed_ingestion;
pub mod translation;
pub mod update_entry_index;

pub use all_feeds_ingestion::AllFeedsIngestionWorkflow;
pub use content_distillation::ContentDistillationWorkflow;
pub use delete_enrichment::DeleteEnrichmentWorkflow;
pub use domain_fetch::DomainFetchWorkflow;
pub use embedding_backfill::EmbeddingBackfillWorkflow;
pub use entries_cleanup::EntriesCleanupWorkflow;
pub use evaluation::{EvaluationWorkflow, SummarizationEvaluationWorkflow};
pub use extract_entry_context::ExtractEntryContextWorkflow;
pub use global_graph_update::GlobalGraphUpdateWorkflow;
pub use graph_rebuild::GraphRebuildWorkflow;
pub use search_prune::SearchPruneWorkflow;
pub use search_reindex::SearchReindexWorkflow;
pub use single_feed_ingestion::SingleFeedIngestionWorkflow;
pub use translation::TranslationWorkflow;
pub use update_entry_index::UpdateEntryIndexWorkflow;
