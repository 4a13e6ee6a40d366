// Dialogue mode: single-shot streaming chat with optional entry context and
// fire-and-forget evaluation.

use anyhow::Result;
use futures::StreamExt;
use harvest_contracts::AgUiEvent;
use harvest_llm::{ChatMessage, ChatOptions, StreamEvent};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::agents::get_entry_context;
use crate::evaluation;
use crate::routes::ag_ui::RunAgentInput;
use crate::state::SharedState;

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a feed reader \
application. Help users understand and analyze entries they are reading.";

pub async fn run_dialogue(
    state: &SharedState,
    input: &RunAgentInput,
    message_id: &str,
    trace_id: &str,
    tx: &UnboundedSender<AgUiEvent>,
) -> Result<()> {
    let entry_context = get_entry_context(state, input).await;

    let mut system_prompt = SYSTEM_PROMPT.to_string();
    if let Some(context) = &entry_context {
        system_prompt.push_str(&format!(
            "\n\nThe user is currently reading the following entry:\n\n{context}"
        ));
    }

    let mut messages = vec![ChatMessage::system(system_prompt)];
    messages.extend(
        input
            .messages
            .iter()
            .filter(|m| m.role == "user")
            .map(|m| ChatMessage::user(&m.content)),
    );
    // Nothing to answer without a user message.
    if messages.len() == 1 {
        return Ok(());
    }

    let query = input.last_user_message().map(str::to_string);

    let options = ChatOptions::model(&state.settings.research_model);
    let mut stream = state.llm.chat_stream(&messages, &options).await?;

    let _ = tx.send(AgUiEvent::text_message_start(message_id));
    let mut answer_chunks: Vec<String> = Vec::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => {
                if !delta.is_empty() {
                    answer_chunks.push(delta.clone());
                    let _ = tx.send(AgUiEvent::text_message_content(message_id, delta));
                }
            }
            StreamEvent::Done => break,
        }
    }

    // Score the exchange out of band when everything needed is present.
    let final_answer = answer_chunks.concat();
    if state.settings.ai_evaluation_enabled {
        if let (Some(query), Some(context)) = (&query, &entry_context) {
            if !final_answer.is_empty() {
                if let Some(workflow_id) = evaluation::start_evaluation_workflow(
                    state,
                    trace_id,
                    "dialogue",
                    query,
                    vec![context.clone()],
                    &final_answer,
                )
                .await
                {
                    info!(workflow_id = %workflow_id, trace_id, "started dialogue evaluation");
                }
            }
        }
    }

    let _ = tx.send(AgUiEvent::text_message_end(message_id));
    Ok(())
}
