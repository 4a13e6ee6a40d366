// Keyword search through the backend's Meilisearch proxy.

use harvest_contracts::RetrievedDoc;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SearchService {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SearchResponse {
    entries: Vec<SearchHit>,
    total_count: u32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SearchHit {
    id: String,
    title: String,
    summary: String,
    url: Option<String>,
}

impl SearchService {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Keyword search. Failures and an unconfigured search backend both
    /// yield empty results; retrieval never aborts on one bad query.
    pub async fn search_entries(&self, query: &str, limit: u32) -> Vec<RetrievedDoc> {
        let mut request = self
            .http
            .post(format!("{}/api/search", self.base_url))
            .json(&serde_json::json!({ "q": query, "limit": limit }))
            .timeout(std::time::Duration::from_secs(30));
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(query, error = %err, "keyword search failed");
                return Vec::new();
            }
        };
        if response.status().as_u16() == 503 {
            warn!(query, "search backend not configured, returning empty results");
            return Vec::new();
        }
        if !response.status().is_success() {
            warn!(query, status = %response.status(), "keyword search rejected");
            return Vec::new();
        }

        let body: SearchResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(query, error = %err, "keyword search decode failed");
                return Vec::new();
            }
        };

        let docs: Vec<RetrievedDoc> = body
            .entries
            .into_iter()
            .map(|hit| RetrievedDoc {
                source: "keyword".to_string(),
                id: hit.id,
                title: hit.title,
                content: hit.summary,
                url: hit.url,
                relevance_score: None,
            })
            .collect();
        info!(
            query,
            result_count = docs.len(),
            total_count = body.total_count,
            "keyword search finished"
        );
        docs
    }
}
