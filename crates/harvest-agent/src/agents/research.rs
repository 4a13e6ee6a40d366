// Research mode: drive the planner → retriever → writer graph and stream
// the synthesized answer.

use anyhow::Result;
use async_trait::async_trait;
use harvest_contracts::{
    AgUiEvent, ResearchAnswer, ResearchState, RetrievedDoc, SearchPlan,
};
use harvest_llm::{ChatClient, ChatMessage, ChatOptions};
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::agents::get_entry_context;
use crate::evaluation;
use crate::graph::{run_research, GraphEvent, ResearchBackend};
use crate::routes::ag_ui::RunAgentInput;
use crate::services::search::SearchService;
use crate::services::vector::VectorSearchService;
use crate::state::SharedState;

const PLANNER_PROMPT: &str = "You plan retrieval for a research assistant over a \
curated article corpus. Decompose the user's question into focused sub-queries \
(use the original question when it is already focused) and pick the sources to \
search: \"keyword\" for exact terms and names, \"vector\" for conceptual or \
paraphrased questions. Explain the strategy in one or two sentences.";

const WRITER_PROMPT: &str = "You write the final research answer from the \
retrieved documents. Answer in Markdown, cite documents by their [n] number, \
classify the answer as comparison, explanation, recommendation or summary, \
report your confidence in [0, 1], say whether more information is needed, and \
suggest follow-up questions when natural. Only claim what the documents \
support.";

fn plan_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "subQueries": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
            "sources": {
                "type": "array",
                "items": { "type": "string", "enum": ["keyword", "vector"] },
            },
            "reasoning": { "type": "string" },
        },
        "required": ["subQueries", "sources", "reasoning"],
        "additionalProperties": false,
    })
}

fn answer_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "answerType": {
                "type": "string",
                "enum": ["comparison", "explanation", "recommendation", "summary"],
            },
            "sources": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "title": { "type": "string" },
                        "usage": { "type": "string" },
                    },
                    "required": ["id", "title", "usage"],
                    "additionalProperties": false,
                },
            },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "needsMoreInfo": { "type": "boolean" },
            "followUps": { "type": "array", "items": { "type": "string" } },
        },
        "required": ["answer", "answerType", "sources", "confidence", "needsMoreInfo", "followUps"],
        "additionalProperties": false,
    })
}

/// Production backend: LLM planning/writing plus the two search services.
pub struct LlmResearchBackend {
    llm: ChatClient,
    model: String,
    search: SearchService,
    vector: VectorSearchService,
}

impl LlmResearchBackend {
    pub fn new(state: &SharedState) -> Self {
        Self {
            llm: state.llm.clone(),
            model: state.settings.research_model.clone(),
            search: state.search.clone(),
            vector: state.vector.clone(),
        }
    }
}

#[async_trait]
impl ResearchBackend for LlmResearchBackend {
    async fn plan(&self, state: &ResearchState) -> Result<SearchPlan> {
        let entry_context = state
            .entry_context
            .as_deref()
            .unwrap_or("No entry context provided.");
        let messages = [
            ChatMessage::system(format!(
                "{PLANNER_PROMPT}\n\nEntry context:\n{entry_context}"
            )),
            ChatMessage::user(&state.query),
        ];
        let plan = self
            .llm
            .structured(
                &messages,
                "search_plan",
                plan_schema(),
                &ChatOptions::model(&self.model),
            )
            .await?;
        Ok(plan)
    }

    async fn search_keyword(&self, query: &str, limit: u32) -> Result<Vec<RetrievedDoc>> {
        Ok(self.search.search_entries(query, limit).await)
    }

    async fn search_vector(
        &self,
        query: &str,
        limit: u32,
        threshold: f64,
    ) -> Result<Vec<RetrievedDoc>> {
        Ok(self.vector.search_by_embedding(query, limit, threshold).await)
    }

    async fn write(&self, state: &ResearchState, formatted_docs: &str) -> Result<ResearchAnswer> {
        let entry_context = state
            .entry_context
            .as_deref()
            .unwrap_or("No entry context provided.");
        let messages = [
            ChatMessage::system(format!(
                "{WRITER_PROMPT}\n\nEntry context:\n{entry_context}\n\nRetrieved documents:\n{formatted_docs}"
            )),
            ChatMessage::user(&state.query),
        ];
        let answer = self
            .llm
            .structured(
                &messages,
                "research_answer",
                answer_schema(),
                &ChatOptions::model(&self.model).with_temperature(0.3),
            )
            .await?;
        Ok(answer)
    }
}

/// Render the final answer with its source list appended.
pub fn render_answer(state: &ResearchState, sources: &[harvest_contracts::SourceReference]) -> String {
    if sources.is_empty() {
        return state.final_answer.clone();
    }
    let mut out = state.final_answer.clone();
    out.push_str("\n\n**Sources**\n");
    for source in sources {
        out.push_str(&format!("- {} {} — {}\n", source.id, source.title, source.usage));
    }
    out
}

pub async fn run_research_mode(
    state: &SharedState,
    input: &RunAgentInput,
    message_id: &str,
    trace_id: &str,
    tx: &UnboundedSender<AgUiEvent>,
) -> Result<()> {
    let Some(query) = input.last_user_message() else {
        return Ok(());
    };
    let entry_context = get_entry_context(state, input).await;

    let research_state = ResearchState {
        query: query.to_string(),
        entry_context,
        search_mode: state.settings.default_search_mode,
        trace_id: Some(trace_id.to_string()),
        session_id: input.session_id().map(str::to_string),
        ..Default::default()
    };

    let backend = LlmResearchBackend::new(state);
    let events = tx.clone();
    let final_state = run_research(research_state, &backend, move |event| {
        let frame = match event {
            GraphEvent::PlanReady {
                sub_queries,
                sources,
                reasoning,
            } => AgUiEvent::custom(
                "research_plan",
                json!({
                    "message": format!(
                        "Searching with {sub_queries} queries across {} sources: {reasoning}",
                        sources.len()
                    ),
                }),
            ),
            GraphEvent::Retrieved { total_docs } => AgUiEvent::custom(
                "research_retrieval",
                json!({ "message": format!("Retrieved {total_docs} documents") }),
            ),
        };
        let _ = events.send(frame);
    })
    .await?;

    info!(
        trace_id,
        iterations = final_state.iteration,
        docs = final_state.retrieved_docs.len(),
        "research finished"
    );

    // Derive the source list from the accumulated documents.
    let sources: Vec<harvest_contracts::SourceReference> = final_state
        .retrieved_docs
        .iter()
        .enumerate()
        .map(|(i, doc)| harvest_contracts::SourceReference {
            id: format!("[{}]", i + 1),
            title: doc.title.clone(),
            usage: doc.url.clone().unwrap_or_default(),
        })
        .collect();

    let rendered = render_answer(&final_state, &sources);
    let _ = tx.send(AgUiEvent::text_message_start(message_id));
    let _ = tx.send(AgUiEvent::text_message_content(message_id, rendered));
    let _ = tx.send(AgUiEvent::text_message_end(message_id));

    if state.settings.ai_evaluation_enabled && !final_state.final_answer.is_empty() {
        let contexts: Vec<String> = final_state
            .retrieved_docs
            .iter()
            .filter(|doc| !doc.content.is_empty())
            .map(|doc| doc.content.clone())
            .collect();
        if !contexts.is_empty() {
            if let Some(workflow_id) = evaluation::start_evaluation_workflow(
                state,
                trace_id,
                "research",
                &final_state.query,
                contexts,
                &final_state.final_answer,
            )
            .await
            {
                info!(workflow_id = %workflow_id, trace_id, "started research evaluation");
            }
        }
    }
    Ok(())
}
