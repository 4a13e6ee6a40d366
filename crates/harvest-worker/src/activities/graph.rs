// Knowledge-graph activities: global graph population and per-entry
// GraphRAG session lifecycle.

use harvest_durable::prelude::*;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::graph::{session_group, Episode, GraphError, GLOBAL_GROUP};
use crate::services::Services;

fn graph_error_to_output(err: GraphError) -> Result<String, ActivityError> {
    if err.is_retryable() {
        Err(ActivityError::retryable(err.to_string()).with_type("GRAPH_ERROR"))
    } else {
        Ok(err.to_string())
    }
}

pub struct AddToGlobalGraph {
    svc: Services,
}

impl AddToGlobalGraph {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for AddToGlobalGraph {
    const TYPE: &'static str = "add_to_global_graph";
    type Input = AddToGlobalGraphInput;
    type Output = AddToGlobalGraphOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let episode = Episode {
            name: input.title,
            content: input.content,
            source_type: "entry".to_string(),
        };
        match self.svc.graph.add_episode(GLOBAL_GROUP, &episode).await {
            Ok(()) => Ok(AddToGlobalGraphOutput {
                success: true,
                error: String::new(),
            }),
            Err(err) => {
                let message = graph_error_to_output(err)?;
                Ok(AddToGlobalGraphOutput {
                    success: false,
                    error: message,
                })
            }
        }
    }
}

/// Fetch entries and add them to the global graph in one bulk call, so large
/// content payloads never cross the engine boundary.
pub struct FetchAndAddToGraphBulk {
    svc: Services,
}

impl FetchAndAddToGraphBulk {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for FetchAndAddToGraphBulk {
    const TYPE: &'static str = "fetch_and_add_to_graph_bulk";
    type Input = FetchAndAddToGraphBulkInput;
    type Output = FetchAndAddToGraphBulkOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.entry_ids.is_empty() {
            return Ok(FetchAndAddToGraphBulkOutput::default());
        }

        let mut episodes = Vec::new();
        let mut skipped_count = 0;
        let mut failed_count = 0;

        for entry_id in &input.entry_ids {
            let entry = match self.svc.api.get_entry(entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    skipped_count += 1;
                    continue;
                }
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    warn!(entry_id = %entry_id, error = %message, "entry fetch rejected");
                    failed_count += 1;
                    continue;
                }
            };
            if entry.filtered_content.trim().is_empty() {
                skipped_count += 1;
                continue;
            }
            episodes.push(Episode {
                name: entry.title,
                content: entry.filtered_content,
                source_type: "entry".to_string(),
            });
            ctx.heartbeat();
        }

        if episodes.is_empty() {
            return Ok(FetchAndAddToGraphBulkOutput {
                skipped_count,
                failed_count,
                ..Default::default()
            });
        }

        // The bulk call can run for minutes; keep heartbeating while it is
        // in flight.
        let bulk_call = self.svc.graph.add_episodes_bulk(GLOBAL_GROUP, &episodes);
        tokio::pin!(bulk_call);
        let outcome = loop {
            tokio::select! {
                outcome = &mut bulk_call => break outcome,
                _ = tokio::time::sleep(std::time::Duration::from_secs(10)) => ctx.heartbeat(),
            }
        };
        match outcome {
            Ok(success_count) => {
                info!(success_count, skipped_count, "bulk graph add finished");
                Ok(FetchAndAddToGraphBulkOutput {
                    success_count,
                    failed_count,
                    skipped_count,
                    error: String::new(),
                })
            }
            Err(err) => {
                let message = graph_error_to_output(err)?;
                Ok(FetchAndAddToGraphBulkOutput {
                    success_count: 0,
                    failed_count: failed_count + episodes.len() as u32,
                    skipped_count,
                    error: message,
                })
            }
        }
    }
}

pub struct ResetGlobalGraph {
    svc: Services,
}

impl ResetGlobalGraph {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for ResetGlobalGraph {
    const TYPE: &'static str = "reset_global_graph";
    type Input = ResetGlobalGraphInput;
    type Output = ResetGlobalGraphOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        _input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        match self.svc.graph.reset_group(GLOBAL_GROUP).await {
            Ok(deleted_count) => {
                info!(deleted_count, "global graph reset");
                Ok(ResetGlobalGraphOutput {
                    success: true,
                    deleted_count,
                    error: String::new(),
                })
            }
            Err(err) => {
                let message = graph_error_to_output(err)?;
                Ok(ResetGlobalGraphOutput {
                    success: false,
                    deleted_count: 0,
                    error: message,
                })
            }
        }
    }
}

pub struct AddToGraphRagSession {
    svc: Services,
}

impl AddToGraphRagSession {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for AddToGraphRagSession {
    const TYPE: &'static str = "add_to_graph_rag_session";
    type Input = AddToGraphRagSessionInput;
    type Output = AddToGraphRagSessionOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let group = session_group(&input.entry_id);
        let episode = Episode {
            name: input.entry_id.clone(),
            content: input.content,
            source_type: if input.source_type.is_empty() {
                "entry".to_string()
            } else {
                input.source_type
            },
        };
        match self.svc.graph.add_episode(&group, &episode).await {
            Ok(()) => {
                info!(entry_id = %input.entry_id, "added content to graph session");
                Ok(AddToGraphRagSessionOutput {
                    success: true,
                    error: String::new(),
                })
            }
            Err(err) => {
                let message = graph_error_to_output(err)?;
                Ok(AddToGraphRagSessionOutput {
                    success: false,
                    error: message,
                })
            }
        }
    }
}

/// The only legitimate deleter of an entry's GraphRAG session.
pub struct ResetGraphRagSession {
    svc: Services,
}

impl ResetGraphRagSession {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for ResetGraphRagSession {
    const TYPE: &'static str = "reset_graph_rag_session";
    type Input = ResetGraphRagSessionInput;
    type Output = ResetGraphRagSessionOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let group = session_group(&input.entry_id);
        match self.svc.graph.reset_group(&group).await {
            Ok(deleted_count) => Ok(ResetGraphRagSessionOutput {
                success: true,
                deleted_count,
                error: String::new(),
            }),
            Err(err) => {
                let message = graph_error_to_output(err)?;
                Ok(ResetGraphRagSessionOutput {
                    success: false,
                    deleted_count: 0,
                    error: message,
                })
            }
        }
    }
}
