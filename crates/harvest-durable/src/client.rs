//! The durable engine client layer.
//!
//! One `Client` abstraction over two transports: embedded (same process as
//! the engine) and remote (the engine's HTTP admin surface). Every workflow
//! invocation carries an explicit unique id; duplicate ids with identical
//! content are idempotent and conflicting content is rejected.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::info;

use crate::codec;
use crate::engine::{Engine, EngineError, StartOutcome};
use crate::server::{QueryResponse, StartWorkflowRequest, WorkflowResultResponse};
use crate::workflow::WorkflowError;

/// Errors surfaced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("workflow id conflict: {0}")]
    Conflict(String),

    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("workflow failed: {0}")]
    WorkflowFailed(WorkflowError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("engine error: {0}")]
    Engine(String),
}

enum Transport {
    Embedded(Engine),
    Remote {
        base_url: String,
        http: reqwest::Client,
    },
}

/// Client for submitting, awaiting and querying workflows.
pub struct Client {
    transport: Transport,
    namespace: String,
}

impl Client {
    /// Connect to a remote engine over its HTTP admin surface.
    pub async fn connect(host: &str, namespace: &str) -> Result<Self, ClientError> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{host}")
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let response = http
            .get(format!("{base_url}/v1/health"))
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("engine unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "engine health check failed: {}",
                response.status()
            )));
        }

        info!(host = %base_url, namespace, "connected to durable engine");
        Ok(Self {
            transport: Transport::Remote { base_url, http },
            namespace: namespace.to_string(),
        })
    }

    /// Attach to an engine living in this process.
    pub fn embedded(engine: Engine, namespace: &str) -> Self {
        Self {
            transport: Transport::Embedded(engine),
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Submit a workflow without awaiting its result.
    pub async fn start_workflow<I: Serialize>(
        &self,
        workflow_type: &str,
        input: &I,
        workflow_id: &str,
        task_queue: &str,
    ) -> Result<(), ClientError> {
        let input = codec::to_value(input).map_err(|e| ClientError::Codec(e.to_string()))?;
        match &self.transport {
            Transport::Embedded(engine) => {
                match engine.start_workflow(workflow_type, input, workflow_id, task_queue) {
                    Ok(StartOutcome::Started) | Ok(StartOutcome::AlreadyRunning) => Ok(()),
                    Err(EngineError::Conflict(id)) => Err(ClientError::Conflict(id)),
                    Err(err) => Err(ClientError::Engine(err.to_string())),
                }
            }
            Transport::Remote { base_url, http } => {
                let request = StartWorkflowRequest {
                    workflow_type: workflow_type.to_string(),
                    workflow_id: workflow_id.to_string(),
                    task_queue: task_queue.to_string(),
                    input,
                };
                let response = http
                    .post(format!("{base_url}/v1/workflows"))
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                match response.status().as_u16() {
                    200..=299 => Ok(()),
                    409 => Err(ClientError::Conflict(workflow_id.to_string())),
                    status => Err(ClientError::Engine(format!(
                        "start rejected with status {status}"
                    ))),
                }
            }
        }
    }

    /// Submit a workflow and await its structured result.
    pub async fn execute_workflow<I: Serialize, O: DeserializeOwned>(
        &self,
        workflow_type: &str,
        input: &I,
        workflow_id: &str,
        task_queue: &str,
    ) -> Result<O, ClientError> {
        self.start_workflow(workflow_type, input, workflow_id, task_queue)
            .await?;

        let result = match &self.transport {
            Transport::Embedded(engine) => engine
                .result(workflow_id)
                .await
                .map_err(|e| ClientError::Engine(e.to_string()))?,
            Transport::Remote { base_url, http } => loop {
                let response = http
                    .get(format!("{base_url}/v1/workflows/{workflow_id}/result"))
                    .send()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                if response.status().as_u16() == 404 {
                    return Err(ClientError::NotFound(workflow_id.to_string()));
                }
                let body: WorkflowResultResponse = response
                    .json()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                match body.status.as_str() {
                    "completed" => break Ok(body.result.unwrap_or(Value::Null)),
                    "failed" => {
                        break Err(body
                            .error
                            .unwrap_or_else(|| WorkflowError::new("unknown failure")))
                    }
                    _ => tokio::time::sleep(Duration::from_millis(200)).await,
                }
            },
        };

        match result {
            Ok(value) => codec::from_value(value).map_err(|e| ClientError::Codec(e.to_string())),
            Err(err) => Err(ClientError::WorkflowFailed(err)),
        }
    }

    /// Query a live workflow instance.
    pub async fn query_workflow<O: DeserializeOwned>(
        &self,
        workflow_id: &str,
        query_name: &str,
    ) -> Result<O, ClientError> {
        let value = match &self.transport {
            Transport::Embedded(engine) => match engine.query(workflow_id, query_name) {
                Ok(value) => value,
                Err(EngineError::NotFound(id)) => return Err(ClientError::NotFound(id)),
                Err(err) => return Err(ClientError::Engine(err.to_string())),
            },
            Transport::Remote { base_url, http } => {
                let response = http
                    .get(format!(
                        "{base_url}/v1/workflows/{workflow_id}/query/{query_name}"
                    ))
                    .send()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                if response.status().as_u16() == 404 {
                    return Err(ClientError::NotFound(workflow_id.to_string()));
                }
                let body: QueryResponse = response
                    .json()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                body.result
            }
        };
        codec::from_value(value).map_err(|e| ClientError::Codec(e.to_string()))
    }
}
