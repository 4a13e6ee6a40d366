// Structured context extraction from one entry, via LLM structured output.

use harvest_durable::prelude::*;
use harvest_llm::{ChatMessage, ChatOptions};
use serde_json::json;
use tracing::info;

use crate::models::{EntryContext, ExtractEntryContextActivityInput, ExtractEntryContextActivityOutput};
use crate::services::Services;

const SYSTEM_PROMPT: &str = "You analyze one article and extract structured context \
for a research assistant: a short overview, the main topics, the named entities \
(people, companies, projects, technologies) and the key points. Keep every field \
concise and grounded in the article.";

fn context_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "overview": { "type": "string" },
            "topics": { "type": "array", "items": { "type": "string" } },
            "entities": { "type": "array", "items": { "type": "string" } },
            "keyPoints": { "type": "array", "items": { "type": "string" } },
        },
        "required": ["overview", "topics", "entities", "keyPoints"],
        "additionalProperties": false,
    })
}

pub struct ExtractEntryContext {
    svc: Services,
}

impl ExtractEntryContext {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for ExtractEntryContext {
    const TYPE: &'static str = "extract_entry_context";
    type Input = ExtractEntryContextActivityInput;
    type Output = ExtractEntryContextActivityOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let model = &self.svc.config.research_model;
        if model.is_empty() {
            return Ok(ExtractEntryContextActivityOutput {
                context: None,
                error: "context extraction disabled: no model configured".to_string(),
            });
        }

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Title: {}\nURL: {}\n\n{}",
                input.title, input.url, input.content
            )),
        ];

        match self
            .svc
            .llm
            .structured::<EntryContext>(
                &messages,
                "entry_context",
                context_schema(),
                &ChatOptions::model(model),
            )
            .await
        {
            Ok(context) => {
                info!(
                    entry_id = %input.entry_id,
                    topics = context.topics.len(),
                    entities = context.entities.len(),
                    "extracted entry context"
                );
                Ok(ExtractEntryContextActivityOutput {
                    context: Some(context),
                    error: String::new(),
                })
            }
            Err(err) => Ok(ExtractEntryContextActivityOutput {
                context: None,
                error: format!("context extraction failed: {err}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_matches_serde_field_names() {
        let schema = context_schema();
        let context: EntryContext = serde_json::from_value(json!({
            "overview": "o",
            "topics": ["t"],
            "entities": ["e"],
            "keyPoints": ["k"],
        }))
        .unwrap();
        assert_eq!(context.key_points, vec!["k"]);
        for property in ["overview", "topics", "entities", "keyPoints"] {
            assert!(schema["properties"][property].is_object());
        }
    }
}
