//! End-to-end AG-UI scenarios against fake LLM and backend servers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use harvest_agent::config::AgentSettings;
use harvest_agent::routes;
use harvest_agent::services::entry::EntryService;
use harvest_agent::services::search::SearchService;
use harvest_agent::services::vector::VectorSearchService;
use harvest_agent::state::AgentState;
use harvest_contracts::{AgUiEvent, SearchMode};
use harvest_llm::ChatClient;
use serde_json::{json, Value};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Fake OpenAI-compatible endpoint: streams a fixed completion, answers
/// structured-output requests by schema name.
fn fake_llm_router() -> Router {
    Router::new().route(
        "/chat/completions",
        post(|Json(body): Json<Value>| async move {
            if body["stream"].as_bool().unwrap_or(false) {
                let sse = concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hello \"},\"finish_reason\":null}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"world\"},\"finish_reason\":null}]}\n\n",
                    "data: [DONE]\n\n",
                );
                return Response::builder()
                    .header(header::CONTENT_TYPE, "text/event-stream")
                    .body(Body::from(sse))
                    .unwrap();
            }

            let schema_name = body["response_format"]["json_schema"]["name"]
                .as_str()
                .unwrap_or("");
            let content = match schema_name {
                "search_plan" => json!({
                    "subQueries": ["a", "b"],
                    "sources": ["keyword", "vector"],
                    "reasoning": "split the question",
                })
                .to_string(),
                "research_answer" => json!({
                    "answer": "The corpus says hello.",
                    "answerType": "summary",
                    "sources": [],
                    "confidence": 0.9,
                    "needsMoreInfo": false,
                    "followUps": [],
                })
                .to_string(),
                other => format!("{{\"unknown\":\"{other}\"}}"),
            };
            let reply = json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }],
            });
            Response::builder()
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(reply.to_string()))
                .unwrap()
        }),
    )
}

/// Fake REST backend: one entry, keyword hits {1, 2}, vector hits {2, 3}.
fn fake_api_router() -> Router {
    Router::new()
        .route(
            "/api/entries/E1",
            get(|| async {
                Json(json!({
                    "id": "E1",
                    "feedId": "F1",
                    "feedName": "Example Feed",
                    "title": "An entry",
                    "url": "https://blog.test/e1",
                    "filteredContent": "entry body",
                    "summary": "entry summary",
                }))
            }),
        )
        .route(
            "/api/search",
            post(|| async {
                Json(json!({
                    "entries": [
                        { "id": "1", "title": "Doc one", "summary": "first" },
                        { "id": "2", "title": "Doc two", "summary": "second" },
                    ],
                    "totalCount": 2,
                }))
            }),
        )
        .route(
            "/api/entries/search-by-vector",
            post(|| async {
                Json(json!({
                    "entries": [
                        { "id": "2", "title": "Doc two", "summary": "second", "similarityScore": 0.5 },
                        { "id": "3", "title": "Doc three", "summary": "third", "similarityScore": 0.1 },
                    ],
                }))
            }),
        )
}

fn settings(openai_base: &str, api_base: &str, embedding_model: &str) -> AgentSettings {
    AgentSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        api_base_url: api_base.to_string(),
        internal_api_token: "token".to_string(),
        openai_base_url: openai_base.to_string(),
        openai_api_key: "test-key".to_string(),
        research_model: "test-model".to_string(),
        embedding_model: embedding_model.to_string(),
        default_search_mode: SearchMode::Planner,
        ai_evaluation_enabled: false,
        otel_tracing_enabled: false,
        cors_origins: vec![],
        temporal_host: "127.0.0.1:1".to_string(),
        temporal_namespace: "default".to_string(),
        temporal_task_queue: "harvest".to_string(),
        log_level: "info".to_string(),
        log_json: false,
    }
}

async fn agent_with(settings: AgentSettings) -> String {
    let state = Arc::new(AgentState {
        llm: ChatClient::new(&settings.openai_base_url, &settings.openai_api_key),
        entries: EntryService::new(&settings.api_base_url, &settings.internal_api_token),
        search: SearchService::new(&settings.api_base_url, &settings.internal_api_token),
        vector: VectorSearchService::new(
            &settings.api_base_url,
            &settings.internal_api_token,
            &settings.embedding_model,
        ),
        engine: None,
        settings,
    });
    serve(routes::router().with_state(state)).await
}

async fn post_ag_ui(agent_base: &str, body: Value) -> Vec<AgUiEvent> {
    let response = reqwest::Client::new()
        .post(format!("{agent_base}/ag-ui"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = response.text().await.unwrap();
    text.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|json| serde_json::from_str::<AgUiEvent>(json).unwrap())
        .collect()
}

fn event_types(events: &[AgUiEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            AgUiEvent::RunStarted { .. } => "RUN_STARTED",
            AgUiEvent::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            AgUiEvent::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            AgUiEvent::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            AgUiEvent::Custom { .. } => "CUSTOM",
            AgUiEvent::RunFinished { .. } => "RUN_FINISHED",
        })
        .collect()
}

#[tokio::test]
async fn dialogue_happy_path_streams_the_full_response() {
    let llm_base = serve(fake_llm_router()).await;
    let api_base = serve(fake_api_router()).await;
    let agent_base = agent_with(settings(&llm_base, &api_base, "")).await;

    let events = post_ag_ui(
        &agent_base,
        json!({
            "messages": [{ "role": "user", "content": "Summarize this" }],
            "forwardedProps": { "mode": "dialogue", "entryId": "E1" },
        }),
    )
    .await;

    let types = event_types(&events);
    assert_eq!(types.first(), Some(&"RUN_STARTED"));
    assert_eq!(types.last(), Some(&"RUN_FINISHED"));
    assert_eq!(types[1], "TEXT_MESSAGE_START");
    assert_eq!(types[types.len() - 2], "TEXT_MESSAGE_END");
    assert!(types[2..types.len() - 2]
        .iter()
        .all(|t| *t == "TEXT_MESSAGE_CONTENT"));

    // Concatenated deltas equal the model's full response.
    let answer: String = events
        .iter()
        .filter_map(|event| match event {
            AgUiEvent::TextMessageContent { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(answer, "Hello world");

    // All text events share one message id.
    let ids: Vec<&String> = events
        .iter()
        .filter_map(|event| match event {
            AgUiEvent::TextMessageStart { message_id, .. }
            | AgUiEvent::TextMessageContent { message_id, .. }
            | AgUiEvent::TextMessageEnd { message_id } => Some(message_id),
            _ => None,
        })
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn research_mode_dedupes_and_reports_progress() {
    let llm_base = serve(fake_llm_router()).await;
    let api_base = serve(fake_api_router()).await;
    let agent_base = agent_with(settings(&llm_base, &api_base, "hashed-768")).await;

    let events = post_ag_ui(
        &agent_base,
        json!({
            "messages": [{ "role": "user", "content": "What does the corpus say?" }],
            "forwardedProps": { "mode": "research" },
        }),
    )
    .await;

    let types = event_types(&events);
    assert_eq!(types.first(), Some(&"RUN_STARTED"));
    assert_eq!(types.last(), Some(&"RUN_FINISHED"));

    // Keyword returned {1, 2} per query, vector {2, 3}: the dedup'd union
    // is three documents.
    let retrieval_message = events
        .iter()
        .find_map(|event| match event {
            AgUiEvent::Custom { name, value } if name == "research_retrieval" => {
                value["message"].as_str().map(str::to_string)
            }
            _ => None,
        })
        .expect("retrieval event missing");
    assert_eq!(retrieval_message, "Retrieved 3 documents");

    let answer: String = events
        .iter()
        .filter_map(|event| match event {
            AgUiEvent::TextMessageContent { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert!(answer.contains("The corpus says hello."));
    assert!(answer.contains("**Sources**"));
}

#[tokio::test]
async fn llm_failure_surfaces_error_and_still_finishes() {
    // No LLM server at all: the stream must still close with RUN_FINISHED
    // after a CUSTOM error event.
    let api_base = serve(fake_api_router()).await;
    let agent_base = agent_with(settings("http://127.0.0.1:1", &api_base, "")).await;

    let events = post_ag_ui(
        &agent_base,
        json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "forwardedProps": { "mode": "dialogue" },
        }),
    )
    .await;

    let types = event_types(&events);
    assert_eq!(
        types,
        vec!["RUN_STARTED", "CUSTOM", "RUN_FINISHED"],
    );
    match &events[1] {
        AgUiEvent::Custom { name, value } => {
            assert_eq!(name, "error");
            assert!(value["message"].is_string());
        }
        other => panic!("expected error event, got {other:?}"),
    }
}
