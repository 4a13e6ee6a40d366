// Semantic search: embed the query locally, search by vector through the
// backend.

use harvest_contracts::RetrievedDoc;
use harvest_llm::Embedder;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct VectorSearchService {
    http: reqwest::Client,
    base_url: String,
    token: String,
    embedding_model: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct VectorResponse {
    entries: Vec<VectorHit>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct VectorHit {
    id: String,
    title: String,
    summary: String,
    url: Option<String>,
    /// Cosine distance; lower is closer.
    similarity_score: Option<f64>,
}

impl VectorSearchService {
    pub fn new(base_url: &str, token: &str, embedding_model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            embedding_model: embedding_model.to_string(),
        }
    }

    /// An empty embedding model means the feature is disabled, not
    /// defaulted.
    pub fn is_enabled(&self) -> bool {
        !self.embedding_model.is_empty()
    }

    pub async fn search_by_embedding(
        &self,
        query: &str,
        limit: u32,
        threshold: f64,
    ) -> Vec<RetrievedDoc> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let embedding = match Embedder::global().embed(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(query, error = %err, "query embedding failed");
                return Vec::new();
            }
        };

        let mut request = self
            .http
            .post(format!("{}/api/entries/search-by-vector", self.base_url))
            .json(&serde_json::json!({
                "embedding": embedding,
                "limit": limit,
                "threshold": threshold,
            }))
            .timeout(std::time::Duration::from_secs(60));
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(query, error = %err, "vector search failed");
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            warn!(query, status = %response.status(), "vector search rejected");
            return Vec::new();
        }
        let body: VectorResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(query, error = %err, "vector search decode failed");
                return Vec::new();
            }
        };

        let mut docs: Vec<RetrievedDoc> = body
            .entries
            .into_iter()
            .map(|hit| RetrievedDoc {
                source: "vector".to_string(),
                id: hit.id,
                title: hit.title,
                content: hit.summary,
                url: hit.url,
                // Distance inverts into relevance.
                relevance_score: hit.similarity_score.map(|s| 1.0 - s),
            })
            .collect();
        docs.sort_by(|a, b| {
            b.relevance_score
                .unwrap_or(0.0)
                .partial_cmp(&a.relevance_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
                // Document id breaks score ties deterministically.
                .then_with(|| a.id.cmp(&b.id))
        });

        info!(query, result_count = docs.len(), "vector search finished");
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_model() {
        let service = VectorSearchService::new("http://api.test", "", "");
        assert!(!service.is_enabled());
        let service = VectorSearchService::new("http://api.test", "", "hashed-768");
        assert!(service.is_enabled());
    }

    #[test]
    fn relevance_inverts_similarity_and_sorts() {
        let mut docs: Vec<RetrievedDoc> = [0.9f64, 0.1, 0.5]
            .iter()
            .enumerate()
            .map(|(i, s)| RetrievedDoc {
                source: "vector".to_string(),
                id: format!("d{i}"),
                title: String::new(),
                content: String::new(),
                url: None,
                relevance_score: Some(1.0 - s),
            })
            .collect();
        docs.sort_by(|a, b| {
            b.relevance_score
                .unwrap_or(0.0)
                .partial_cmp(&a.relevance_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let scores: Vec<f64> = docs.iter().map(|d| d.relevance_score.unwrap()).collect();
        assert!((scores[0] - 0.9).abs() < 1e-9);
        assert!((scores[1] - 0.5).abs() < 1e-9);
        assert!((scores[2] - 0.1).abs() < 1e-9);
    }
}
