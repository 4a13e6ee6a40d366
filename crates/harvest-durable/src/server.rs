//! HTTP admin surface for the embedded engine.
//!
//! Mounted by the worker binary so remote processes (the agent, the REST
//! backend's scheduled triggers) can submit, await, query and cancel
//! workflows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{Engine, EngineError};
use crate::workflow::WorkflowError;

/// Body of `POST /v1/workflows`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    pub workflow_type: String,
    pub workflow_id: String,
    #[serde(default)]
    pub task_queue: String,
    #[serde(default)]
    pub input: Value,
}

/// Body of `GET /v1/workflows/{id}/result`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResultResponse {
    /// `running`, `completed` or `failed`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkflowError>,
}

/// Body of `GET /v1/workflows/{id}/query/{name}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub result: Value,
}

/// Build the admin router over an engine handle.
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/workflows", post(start_workflow))
        .route("/v1/workflows/:id/result", get(workflow_result))
        .route("/v1/workflows/:id/query/:name", get(query_workflow))
        .route("/v1/workflows/:id/cancel", post(cancel_workflow))
        .with_state(engine)
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn start_workflow(
    State(engine): State<Engine>,
    Json(request): Json<StartWorkflowRequest>,
) -> Response {
    let task_queue = if request.task_queue.is_empty() {
        "harvest".to_string()
    } else {
        request.task_queue
    };
    match engine.start_workflow(
        &request.workflow_type,
        request.input,
        &request.workflow_id,
        &task_queue,
    ) {
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "workflowId": request.workflow_id })),
        )
            .into_response(),
        Err(EngineError::Conflict(id)) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": format!("workflow id conflict: {id}") })),
        )
            .into_response(),
        Err(EngineError::UnregisteredWorkflow(name)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("unknown workflow type: {name}") })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn workflow_result(State(engine): State<Engine>, Path(id): Path<String>) -> Response {
    match engine.peek_result(&id) {
        Ok(None) => Json(WorkflowResultResponse {
            status: "running".to_string(),
            result: None,
            error: None,
        })
        .into_response(),
        Ok(Some(Ok(result))) => Json(WorkflowResultResponse {
            status: "completed".to_string(),
            result: Some(result),
            error: None,
        })
        .into_response(),
        Ok(Some(Err(error))) => Json(WorkflowResultResponse {
            status: "failed".to_string(),
            result: None,
            error: Some(error),
        })
        .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn query_workflow(
    State(engine): State<Engine>,
    Path((id, name)): Path<(String, String)>,
) -> Response {
    match engine.query(&id, &name) {
        Ok(result) => Json(QueryResponse { result }).into_response(),
        Err(EngineError::NotFound(_)) | Err(EngineError::QueryNotFound(_)) => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn cancel_workflow(State(engine): State<Engine>, Path(id): Path<String>) -> Response {
    if engine.cancel(&id) {
        StatusCode::ACCEPTED.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
