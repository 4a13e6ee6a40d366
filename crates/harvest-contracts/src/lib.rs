// Shared contracts for the Harvest platform
// Decision: one crate for every record that crosses a process or wire boundary
//
// Everything here serializes with camelCase field names; the durable codec
// additionally accepts snake_case on input.

pub mod entry;
pub mod events;
pub mod progress;
pub mod research;

pub use entry::{
    CrawlReport, Entry, EntryToTranslate, FeedEntry, FeedInfo, FeedOptions, FetchedContent,
    ProcessedEntry, TranslatedEntry,
};
pub use events::AgUiEvent;
pub use progress::{WorkflowProgress, WorkflowStatus};
pub use research::{
    AnswerType, ResearchAnswer, ResearchState, RetrievedDoc, SearchMode, SearchPlan, SearchSource,
    SourceReference,
};
