// Knowledge-graph backend client.
//
// The graph service stores episodes per group: one global group for the
// whole corpus, and one group per entry for Deep Research sessions. The
// per-entry group is exclusive to its entry; `reset_group` is the only
// legitimate deleter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GLOBAL_GROUP: &str = "global";

/// Group id of an entry's GraphRAG session.
pub fn session_group(entry_id: &str) -> String {
    format!("entry-{entry_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("graph backend error {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("graph backend not configured")]
    NotConfigured,
}

impl GraphError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GraphError::Transport(_) => true,
            GraphError::Backend { status, .. } => *status >= 500,
            GraphError::NotConfigured => false,
        }
    }
}

/// One document added to a graph group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub source_type: String,
}

#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GraphClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, GraphError> {
        if !self.is_configured() {
            return Err(GraphError::NotConfigured);
        }
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .timeout(std::time::Duration::from_secs(120));
        if !self.token.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.token));
        }
        Ok(builder)
    }

    async fn expect_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, GraphError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Backend {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    pub async fn add_episode(&self, group_id: &str, episode: &Episode) -> Result<(), GraphError> {
        let builder = self
            .request(reqwest::Method::POST, &format!("/graph/groups/{group_id}/episodes"))?
            .json(episode);
        self.expect_json(builder).await?;
        Ok(())
    }

    /// Bulk add; returns the number of episodes accepted.
    pub async fn add_episodes_bulk(
        &self,
        group_id: &str,
        episodes: &[Episode],
    ) -> Result<u32, GraphError> {
        let builder = self
            .request(
                reqwest::Method::POST,
                &format!("/graph/groups/{group_id}/episodes/bulk"),
            )?
            .json(&serde_json::json!({ "episodes": episodes }));
        let body = self.expect_json(builder).await?;
        Ok(body["addedCount"].as_u64().unwrap_or(episodes.len() as u64) as u32)
    }

    /// Delete a whole group; returns the number of removed episodes.
    pub async fn reset_group(&self, group_id: &str) -> Result<u32, GraphError> {
        let builder = self.request(reqwest::Method::DELETE, &format!("/graph/groups/{group_id}"))?;
        match self.expect_json(builder).await {
            Ok(body) => Ok(body["deletedCount"].as_u64().unwrap_or(0) as u32),
            // Deleting a missing group is a no-op.
            Err(GraphError::Backend { status: 404, .. }) => Ok(0),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_group_naming() {
        assert_eq!(session_group("01ABC"), "entry-01ABC");
    }

    #[test]
    fn unconfigured_client_refuses_requests() {
        let client = GraphClient::new("", "token");
        assert!(!client.is_configured());
        let err = client.request(reqwest::Method::GET, "/graph/x").unwrap_err();
        assert!(matches!(err, GraphError::NotConfigured));
        assert!(!err.is_retryable());
    }
}
