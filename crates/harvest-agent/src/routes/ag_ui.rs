// AG-UI protocol endpoint: request framing, id minting and SSE streaming.
//
// The run always finishes: any uncaught failure becomes a CUSTOM error
// event, and RUN_FINISHED is emitted unconditionally.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use harvest_contracts::AgUiEvent;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};
use uuid::Uuid;

use crate::agents;
use crate::state::SharedState;

/// Chat mode requested through forwarded properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Dialogue,
    Research,
}

/// AG-UI request body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunAgentInput {
    pub thread_id: Option<String>,
    pub messages: Vec<InputMessage>,
    pub forwarded_props: Option<ForwardedProps>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForwardedProps {
    pub mode: Option<String>,
    pub entry_id: Option<String>,
    pub session_id: Option<String>,
}

impl RunAgentInput {
    pub fn mode(&self) -> ChatMode {
        match self
            .forwarded_props
            .as_ref()
            .and_then(|p| p.mode.as_deref())
        {
            Some("research") => ChatMode::Research,
            // "dialogue" and anything unknown both land here.
            _ => ChatMode::Dialogue,
        }
    }

    pub fn entry_id(&self) -> Option<&str> {
        self.forwarded_props.as_ref()?.entry_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.forwarded_props.as_ref()?.session_id.as_deref()
    }

    /// The most recent user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/ag-ui", post(handle_ag_ui))
        .route("/ag-ui/info", get(info_handler).post(info_handler))
}

/// Discovery document for AG-UI clients.
async fn info_handler() -> Json<Value> {
    Json(json!({
        "agents": {
            "default": {
                "name": "default",
                "description": "AI assistant for analyzing feed entries",
            },
        },
        "actions": [],
        "version": "1.0",
    }))
}

async fn handle_ag_ui(State(state): State<SharedState>, Json(input): Json<RunAgentInput>) -> Response {
    let run_id = Uuid::now_v7().to_string();
    let thread_id = input
        .thread_id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let message_id = Uuid::now_v7().to_string();
    // 32-char lowercase hex, correlating logs and LLM calls.
    let trace_id = Uuid::now_v7().simple().to_string();

    info!(
        run_id = %run_id,
        thread_id = %thread_id,
        trace_id = %trace_id,
        mode = ?input.mode(),
        message_count = input.messages.len(),
        "agent run started"
    );

    let (tx, rx) = mpsc::unbounded_channel::<AgUiEvent>();
    {
        let state = state.clone();
        let thread_id = thread_id.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move {
            let _ = tx.send(AgUiEvent::run_started(&thread_id, &run_id));

            let result = match input.mode() {
                ChatMode::Research => {
                    agents::research::run_research_mode(&state, &input, &message_id, &trace_id, &tx)
                        .await
                }
                ChatMode::Dialogue => {
                    agents::dialogue::run_dialogue(&state, &input, &message_id, &trace_id, &tx)
                        .await
                }
            };
            if let Err(err) = result {
                error!(run_id = %run_id, trace_id = %trace_id, error = %err, "agent run failed");
                let _ = tx.send(AgUiEvent::error(err.to_string()));
            }

            let _ = tx.send(AgUiEvent::run_finished(&thread_id, &run_id));
        });
    }

    let stream =
        UnboundedReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.to_sse()));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .header("X-Thread-Id", thread_id)
        .header("X-Run-Id", run_id)
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_framing_parses_camel_case() {
        let input: RunAgentInput = serde_json::from_value(json!({
            "threadId": "t1",
            "messages": [
                { "role": "user", "content": "first" },
                { "role": "assistant", "content": "reply" },
                { "role": "user", "content": "Summarize this" },
            ],
            "forwardedProps": {
                "mode": "research",
                "entryId": "E1",
                "sessionId": "S1",
            },
        }))
        .unwrap();

        assert_eq!(input.thread_id.as_deref(), Some("t1"));
        assert_eq!(input.mode(), ChatMode::Research);
        assert_eq!(input.entry_id(), Some("E1"));
        assert_eq!(input.session_id(), Some("S1"));
        assert_eq!(input.last_user_message(), Some("Summarize this"));
    }

    #[test]
    fn unknown_mode_defaults_to_dialogue() {
        let input: RunAgentInput = serde_json::from_value(json!({
            "messages": [],
            "forwardedProps": { "mode": "telepathy" },
        }))
        .unwrap();
        assert_eq!(input.mode(), ChatMode::Dialogue);

        let input: RunAgentInput = serde_json::from_value(json!({ "messages": [] })).unwrap();
        assert_eq!(input.mode(), ChatMode::Dialogue);
    }
}
