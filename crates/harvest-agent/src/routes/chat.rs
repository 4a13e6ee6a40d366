// Plain chat endpoints, outside the AG-UI protocol.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::Response,
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use harvest_llm::{ChatMessage, ChatOptions, StreamEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub thread_id: String,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
}

async fn chat(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, axum::http::StatusCode> {
    let messages = [ChatMessage::user(&request.message)];
    let options = ChatOptions::model(&state.settings.research_model);
    let answer = state
        .llm
        .chat(&messages, &options)
        .await
        .map_err(|_| axum::http::StatusCode::BAD_GATEWAY)?;

    Ok(Json(ChatResponse {
        message: answer,
        thread_id: request
            .thread_id
            .unwrap_or_else(|| Uuid::now_v7().to_string()),
    }))
}

async fn chat_stream(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let messages = [ChatMessage::user(&request.message)];
    let options = ChatOptions::model(&state.settings.research_model);

    let stream = match state.llm.chat_stream(&messages, &options).await {
        Ok(stream) => stream,
        Err(err) => {
            let body = format!(
                "data: {}\n\ndata: [DONE]\n\n",
                serde_json::json!({ "type": "error", "message": err.to_string() })
            );
            return sse_response(Body::from(body));
        }
    };

    let body_stream = stream.map(|event| {
        let frame = match event {
            Ok(StreamEvent::TextDelta(delta)) => format!(
                "data: {}\n\n",
                serde_json::json!({ "type": "text", "content": delta })
            ),
            Ok(StreamEvent::Done) => "data: [DONE]\n\n".to_string(),
            Err(err) => format!(
                "data: {}\n\n",
                serde_json::json!({ "type": "error", "message": err.to_string() })
            ),
        };
        Ok::<_, Infallible>(frame)
    });
    sse_response(Body::from_stream(body_stream))
}

fn sse_response(body: Body) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
