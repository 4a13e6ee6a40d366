// Content distillation: main-content line-range selection plus a short
// summary, via LLM structured output over line-numbered Markdown.

use harvest_contracts::ProcessedEntry;
use harvest_durable::prelude::*;
use harvest_llm::{ChatMessage, ChatOptions};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::{html, Services};

const SYSTEM_PROMPT: &str = "You are an expert at analyzing and summarizing articles. \
You receive Markdown content with line numbers (\"1: \", \"2: \", ...). \
Identify the line range of the MAIN ARTICLE, excluding navigation, headers, \
social buttons, related-article lists, comments, newsletter forms and footers. \
Be conservative: when unsure, include more lines rather than fewer; the article \
body must never be excluded. Then write a 3-4 sentence summary of the main \
content. Write the summary in the requested language; when no language is \
given, use the article's own language.";

fn summary_language(target_language: &str) -> &str {
    if target_language.is_empty() {
        "the article's original language"
    } else {
        target_language
    }
}

fn distill_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "mainContentStartLine": { "type": "integer", "minimum": 1 },
            "mainContentEndLine": { "type": "integer", "minimum": 1 },
            "summary": { "type": "string" },
        },
        "required": ["mainContentStartLine", "mainContentEndLine", "summary"],
        "additionalProperties": false,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistillLlmOutput {
    main_content_start_line: u32,
    main_content_end_line: u32,
    summary: String,
}

fn batch_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "entryId": { "type": "string" },
                        "mainContentStartLine": { "type": "integer", "minimum": 1 },
                        "mainContentEndLine": { "type": "integer", "minimum": 1 },
                        "summary": { "type": "string" },
                    },
                    "required": ["entryId", "mainContentStartLine", "mainContentEndLine", "summary"],
                    "additionalProperties": false,
                },
            },
        },
        "required": ["results"],
        "additionalProperties": false,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchLlmOutput {
    results: Vec<BatchLlmItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchLlmItem {
    entry_id: String,
    main_content_start_line: u32,
    main_content_end_line: u32,
    summary: String,
}

fn to_processed(
    entry_id: &str,
    content: &str,
    start_line: u32,
    end_line: u32,
    summary: String,
) -> ProcessedEntry {
    ProcessedEntry {
        entry_id: entry_id.to_string(),
        filtered_content: html::slice_lines(content, start_line, end_line),
        summary,
        start_line,
        end_line,
    }
}

/// Single-entry distillation.
pub struct DistillEntryContent {
    svc: Services,
}

impl DistillEntryContent {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for DistillEntryContent {
    const TYPE: &'static str = "distill_entry_content";
    type Input = DistillEntryContentInput;
    type Output = DistillEntryContentOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let model = &self.svc.config.summarization_model;
        if model.is_empty() {
            return Ok(DistillEntryContentOutput {
                result: None,
                error: "summarization disabled: no model configured".to_string(),
            });
        }

        let numbered = html::number_lines(&input.content);
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Summary language: {}\n\nTitle: {}\n\nContent (with line numbers):\n{}",
                summary_language(&input.target_language),
                input.title,
                numbered
            )),
        ];

        let output: DistillLlmOutput = match self
            .svc
            .llm
            .structured(&messages, "content_distillation", distill_schema(), &ChatOptions::model(model))
            .await
        {
            Ok(output) => output,
            Err(err) => {
                return Ok(DistillEntryContentOutput {
                    result: None,
                    error: format!("distillation failed: {err}"),
                })
            }
        };

        Ok(DistillEntryContentOutput {
            result: Some(to_processed(
                &input.entry_id,
                &input.content,
                output.main_content_start_line,
                output.main_content_end_line,
                output.summary,
            )),
            error: String::new(),
        })
    }
}

/// Batch distillation: several entries in one LLM call, with a heartbeat
/// between preparation and the long generation.
pub struct DistillEntriesBatch {
    svc: Services,
}

impl DistillEntriesBatch {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for DistillEntriesBatch {
    const TYPE: &'static str = "distill_entries_batch";
    type Input = DistillEntriesBatchInput;
    type Output = DistillEntriesBatchOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.entry_ids.is_empty() {
            return Ok(DistillEntriesBatchOutput::default());
        }
        let model = self.svc.config.summarization_model.clone();
        if model.is_empty() {
            return Ok(DistillEntriesBatchOutput {
                error: "summarization disabled: no model configured".to_string(),
                ..Default::default()
            });
        }

        // Load entry content.
        let mut sections = Vec::new();
        let mut contents: std::collections::HashMap<String, String> = Default::default();
        for entry_id in &input.entry_ids {
            let entry = match self.svc.api.get_entry(entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    warn!(entry_id = %entry_id, error = %message, "entry fetch rejected");
                    continue;
                }
            };
            let content = if !entry.full_content.is_empty() {
                entry.full_content
            } else {
                entry.feed_content
            };
            if content.trim().is_empty() {
                continue;
            }
            let numbered = html::number_lines(&content);
            let total_lines = content.lines().count();
            sections.push(format!(
                "ENTRY_ID: {entry_id}\nTITLE: {}\nTOTAL_LINES: {total_lines}\nCONTENT:\n{numbered}",
                entry.title
            ));
            contents.insert(entry_id.clone(), content);
            ctx.heartbeat();
        }

        if sections.is_empty() {
            return Ok(DistillEntriesBatchOutput::default());
        }

        info!(
            entries = sections.len(),
            batch_trace_id = %input.batch_trace_id,
            "distilling batch"
        );

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Process the following {count} entries. Each entry has independent \
                 line numbering starting at 1; check TOTAL_LINES per entry. Return a \
                 result for EVERY entry, in the same order, keyed by its ENTRY_ID. \
                 Summary language: {language}\n\n{entries}",
                count = sections.len(),
                language = summary_language(&input.target_language),
                entries = sections.join("\n\n---\n\n"),
            )),
        ];

        // Generation can outlast the heartbeat window; tick while waiting.
        let options = ChatOptions::model(&model);
        let llm_call = self.svc.llm.structured::<BatchLlmOutput>(
            &messages,
            "batch_content_distillation",
            batch_schema(),
            &options,
        );
        tokio::pin!(llm_call);
        let outcome = loop {
            tokio::select! {
                outcome = &mut llm_call => break outcome,
                _ = tokio::time::sleep(std::time::Duration::from_secs(10)) => ctx.heartbeat(),
            }
        };
        let output: BatchLlmOutput = match outcome {
            Ok(output) => output,
            Err(err) => {
                return Ok(DistillEntriesBatchOutput {
                    failed_count: sections.len() as u32,
                    error: format!("batch distillation failed: {err}"),
                    ..Default::default()
                })
            }
        };
        ctx.heartbeat();

        let mut processed = Vec::new();
        let mut failed_count = 0;
        for item in output.results {
            match contents.get(&item.entry_id) {
                Some(content) => processed.push(to_processed(
                    &item.entry_id,
                    content,
                    item.main_content_start_line,
                    item.main_content_end_line,
                    item.summary,
                )),
                None => {
                    warn!(entry_id = %item.entry_id, "llm returned unknown entry id");
                    failed_count += 1;
                }
            }
        }

        info!(
            processed = processed.len(),
            failed = failed_count,
            "batch distillation finished"
        );
        Ok(DistillEntriesBatchOutput {
            processed,
            failed_count,
            error: String::new(),
        })
    }
}

/// Persist distillation results on their entries.
pub struct SaveDistilledEntries {
    svc: Services,
}

impl SaveDistilledEntries {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SaveDistilledEntries {
    const TYPE: &'static str = "save_distilled_entries";
    type Input = SaveDistilledEntriesInput;
    type Output = SaveDistilledEntriesOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let mut saved_count = 0;
        let mut errors = Vec::new();
        for entry in &input.entries {
            let fields = serde_json::json!({
                "filteredContent": entry.filtered_content,
                "summary": entry.summary,
            });
            match self.svc.api.update_entry(&entry.entry_id, &fields).await {
                Ok(true) => saved_count += 1,
                Ok(false) => warn!(entry_id = %entry.entry_id, "entry vanished before save"),
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    errors.push(format!("{}: {message}", entry.entry_id));
                }
            }
            ctx.heartbeat();
        }
        Ok(SaveDistilledEntriesOutput {
            saved_count,
            error: errors.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_entry_slices_the_range() {
        let content = "nav\nintro\nbody line\noutro\nfooter";
        let processed = to_processed("e1", content, 2, 4, "sum".to_string());
        assert_eq!(processed.filtered_content, "intro\nbody line\noutro");
        assert_eq!(processed.start_line, 2);
        assert_eq!(processed.end_line, 4);
    }

    #[test]
    fn summary_language_defaults_to_source() {
        assert_eq!(summary_language(""), "the article's original language");
        assert_eq!(summary_language("Japanese"), "Japanese");
    }

    #[test]
    fn schemas_use_camel_case_properties() {
        let schema = distill_schema();
        assert!(schema["properties"]["mainContentStartLine"].is_object());
        let schema = batch_schema();
        assert!(schema["properties"]["results"]["items"]["properties"]["entryId"].is_object());
    }
}
