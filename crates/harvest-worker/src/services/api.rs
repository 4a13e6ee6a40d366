// Client for the REST backend that owns entries, feeds, search and
// enrichment storage.
//
// Error taxonomy: 404 maps to `Ok(None)`, other 4xx to `ApiError::Client`
// (no retry; activities surface it as a structured error field), 5xx to
// `ApiError::Server` and connect/read failures to `ApiError::Transport`
// (both retried by the engine). Retrying happens at the engine layer, never
// here.

use std::time::Duration;

use harvest_contracts::{Entry, FeedInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// For long reads: full-content entry pages, index scans.
const LONG_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("client error {status}: {body}")]
    Client { status: u16, body: String },

    #[error("response decode error: {0}")]
    Decode(serde_json::Error),
}

impl ApiError {
    pub fn is_client(&self) -> bool {
        matches!(self, ApiError::Client { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PagedIds {
    pub entry_ids: Vec<String>,
    pub total_count: u32,
    pub has_more: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanupResponse {
    pub deleted_count: u32,
    pub deleted_ids: Vec<String>,
    pub cutoff_date: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResponse {
    pub entries: Vec<Entry>,
    pub total_count: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateEntryResponse {
    pub id: String,
    pub created: bool,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .timeout(timeout);
        if !self.token.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.token));
        }
        builder
    }

    /// Send and decode, applying the shared error taxonomy. `Ok(None)` is a
    /// 404.
    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        if status.is_client_error() {
            return Err(ApiError::Client {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        // Some mutation endpoints answer with an empty body.
        let text = response.text().await?;
        let value = if text.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(ApiError::Decode)?
        };
        serde_json::from_value(value).map(Some).map_err(ApiError::Decode)
    }

    // Entries

    pub async fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>, ApiError> {
        self.send_json(self.request(
            reqwest::Method::GET,
            &format!("/api/entries/{entry_id}"),
            LONG_TIMEOUT,
        ))
        .await
    }

    pub async fn list_unsummarized_entry_ids(&self, limit: u32) -> Result<Vec<Entry>, ApiError> {
        let builder = self
            .request(reqwest::Method::GET, "/api/entries", LONG_TIMEOUT)
            .query(&[("hasSummary", "false"), ("limit", &limit.to_string())]);
        Ok(self.send_json(builder).await?.unwrap_or_default())
    }

    /// Create an entry discovered by a crawl; the backend dedupes by
    /// normalized URL and reports whether a row was created.
    pub async fn create_entry(&self, entry: &Value) -> Result<Option<CreateEntryResponse>, ApiError> {
        self.send_json(
            self.request(reqwest::Method::POST, "/api/entries", DEFAULT_TIMEOUT)
                .json(entry),
        )
        .await
    }

    /// Patch entry fields (content variants, summary, metadata).
    pub async fn update_entry(&self, entry_id: &str, fields: &Value) -> Result<bool, ApiError> {
        let result: Option<Value> = self
            .send_json(
                self.request(
                    reqwest::Method::PATCH,
                    &format!("/api/entries/{entry_id}"),
                    DEFAULT_TIMEOUT,
                )
                .json(fields),
            )
            .await?;
        Ok(result.is_some())
    }

    pub async fn cleanup_entries(
        &self,
        older_than_days: u32,
        dry_run: bool,
    ) -> Result<Option<CleanupResponse>, ApiError> {
        self.send_json(
            self.request(reqwest::Method::POST, "/api/entries/cleanup", LONG_TIMEOUT)
                .json(&serde_json::json!({
                    "olderThanDays": older_than_days,
                    "dryRun": dry_run,
                })),
        )
        .await
    }

    pub async fn save_embedding(&self, entry_id: &str, embedding: &[f32]) -> Result<bool, ApiError> {
        let result: Option<Value> = self
            .send_json(
                self.request(
                    reqwest::Method::POST,
                    &format!("/api/entries/{entry_id}/embedding"),
                    DEFAULT_TIMEOUT,
                )
                .json(&serde_json::json!({ "embedding": embedding })),
            )
            .await?;
        Ok(result.is_some())
    }

    /// Entries that have content but no embedding, cursor-paginated.
    pub async fn entries_missing_embedding(
        &self,
        batch_size: u32,
        after: Option<&str>,
    ) -> Result<PagedIds, ApiError> {
        let mut builder = self
            .request(reqwest::Method::GET, "/api/entries/missing-embedding", LONG_TIMEOUT)
            .query(&[("batchSize", batch_size.to_string())]);
        if let Some(after) = after {
            builder = builder.query(&[("after", after)]);
        }
        Ok(self.send_json(builder).await?.unwrap_or_default())
    }

    /// Entries with filtered content (index and graph candidates),
    /// cursor-paginated.
    pub async fn entries_with_filtered_content(
        &self,
        batch_size: u32,
        after: Option<&str>,
    ) -> Result<PagedIds, ApiError> {
        let mut builder = self
            .request(reqwest::Method::GET, "/api/entries/with-filtered-content", LONG_TIMEOUT)
            .query(&[("batchSize", batch_size.to_string())]);
        if let Some(after) = after {
            builder = builder.query(&[("after", after)]);
        }
        Ok(self.send_json(builder).await?.unwrap_or_default())
    }

    pub async fn all_entry_ids(&self) -> Result<Vec<String>, ApiError> {
        let result: Option<Value> = self
            .send_json(self.request(reqwest::Method::GET, "/api/entries/ids", LONG_TIMEOUT))
            .await?;
        Ok(result
            .and_then(|v| serde_json::from_value(v["entryIds"].clone()).ok())
            .unwrap_or_default())
    }

    // Feeds

    pub async fn list_feeds(&self) -> Result<Vec<FeedInfo>, ApiError> {
        let result: Option<Value> = self
            .send_json(self.request(reqwest::Method::GET, "/api/feeds", DEFAULT_TIMEOUT))
            .await?;
        Ok(result
            .and_then(|v| serde_json::from_value(v["feeds"].clone()).ok())
            .unwrap_or_default())
    }

    pub async fn get_feed(&self, feed_id: &str) -> Result<Option<FeedInfo>, ApiError> {
        self.send_json(self.request(
            reqwest::Method::GET,
            &format!("/api/feeds/{feed_id}"),
            DEFAULT_TIMEOUT,
        ))
        .await
    }

    /// Conditional-GET state for a feed (ETag / Last-Modified).
    pub async fn get_feed_fetch_state(&self, feed_id: &str) -> Result<Option<Value>, ApiError> {
        self.send_json(self.request(
            reqwest::Method::GET,
            &format!("/api/feeds/{feed_id}/fetch-state"),
            DEFAULT_TIMEOUT,
        ))
        .await
    }

    pub async fn save_feed_fetch_state(&self, feed_id: &str, state: &Value) -> Result<(), ApiError> {
        let _: Option<Value> = self
            .send_json(
                self.request(
                    reqwest::Method::PUT,
                    &format!("/api/feeds/{feed_id}/fetch-state"),
                    DEFAULT_TIMEOUT,
                )
                .json(state),
            )
            .await?;
        Ok(())
    }

    // Settings

    pub async fn get_settings(&self) -> Result<Value, ApiError> {
        Ok(self
            .send_json(self.request(reqwest::Method::GET, "/api/settings", DEFAULT_TIMEOUT))
            .await?
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    // Search index (Meilisearch proxy). A 503 means the search dependency
    // is off; callers get an empty result and a warning instead of a retry
    // storm.

    pub async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse, ApiError> {
        let builder = self
            .request(reqwest::Method::POST, "/api/search", DEFAULT_TIMEOUT)
            .json(&serde_json::json!({ "q": query, "limit": limit }));
        match self.send_json(builder).await {
            Ok(result) => Ok(result.unwrap_or_default()),
            Err(ApiError::Server { status: 503, .. }) => {
                warn!(query, "search backend unavailable, returning empty results");
                Ok(SearchResponse::default())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn index_entries(&self, entry_ids: &[String]) -> Result<u32, ApiError> {
        let result: Option<Value> = self
            .send_json(
                self.request(reqwest::Method::POST, "/api/search/index", LONG_TIMEOUT)
                    .json(&serde_json::json!({ "entryIds": entry_ids })),
            )
            .await?;
        Ok(result
            .and_then(|v| v["indexedCount"].as_u64())
            .unwrap_or(entry_ids.len() as u64) as u32)
    }

    pub async fn remove_documents(&self, document_ids: &[String]) -> Result<u32, ApiError> {
        let result: Option<Value> = self
            .send_json(
                self.request(reqwest::Method::POST, "/api/search/remove", LONG_TIMEOUT)
                    .json(&serde_json::json!({ "documentIds": document_ids })),
            )
            .await?;
        Ok(result
            .and_then(|v| v["removedCount"].as_u64())
            .unwrap_or(document_ids.len() as u64) as u32)
    }

    pub async fn index_document_ids(&self) -> Result<Vec<String>, ApiError> {
        let result: Option<Value> = self
            .send_json(self.request(reqwest::Method::GET, "/api/search/document-ids", LONG_TIMEOUT))
            .await?;
        Ok(result
            .and_then(|v| serde_json::from_value(v["documentIds"].clone()).ok())
            .unwrap_or_default())
    }

    // Enrichments and links

    pub async fn save_enrichment(
        &self,
        entry_id: &str,
        enrichment_type: &str,
        data: &Value,
        source: Option<&str>,
    ) -> Result<(), ApiError> {
        let _: Option<Value> = self
            .send_json(
                self.request(
                    reqwest::Method::POST,
                    &format!("/api/entries/{entry_id}/enrichments"),
                    DEFAULT_TIMEOUT,
                )
                .json(&serde_json::json!({
                    "type": enrichment_type,
                    "source": source,
                    "data": data,
                })),
            )
            .await?;
        Ok(())
    }

    /// Returns the number of rows deleted; 0 when nothing matched.
    pub async fn delete_enrichment(
        &self,
        entry_id: &str,
        enrichment_type: &str,
        source: Option<&str>,
    ) -> Result<u32, ApiError> {
        let mut builder = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/entries/{entry_id}/enrichments"),
                DEFAULT_TIMEOUT,
            )
            .query(&[("type", enrichment_type)]);
        if let Some(source) = source {
            builder = builder.query(&[("source", source)]);
        }
        let result: Option<Value> = self.send_json(builder).await?;
        Ok(result
            .and_then(|v| v["deletedCount"].as_u64())
            .unwrap_or(0) as u32)
    }

    pub async fn save_entry_links(&self, entry_id: &str, links: &Value) -> Result<u32, ApiError> {
        let result: Option<Value> = self
            .send_json(
                self.request(
                    reqwest::Method::POST,
                    &format!("/api/entries/{entry_id}/links"),
                    DEFAULT_TIMEOUT,
                )
                .json(&serde_json::json!({ "links": links })),
            )
            .await?;
        Ok(result.and_then(|v| v["savedCount"].as_u64()).unwrap_or(0) as u32)
    }

    pub async fn save_entry_context(&self, entry_id: &str, context: &Value) -> Result<(), ApiError> {
        let _: Option<Value> = self
            .send_json(
                self.request(
                    reqwest::Method::POST,
                    &format!("/api/entries/{entry_id}/context"),
                    DEFAULT_TIMEOUT,
                )
                .json(context),
            )
            .await?;
        Ok(())
    }

    // SSE broadcast and tracing store

    pub async fn broadcast_progress(&self, workflow_id: &str, progress: &Value) -> Result<(), ApiError> {
        let _: Option<Value> = self
            .send_json(
                self.request(reqwest::Method::POST, "/sse/broadcast", Duration::from_secs(10))
                    .json(&serde_json::json!({
                        "workflowId": workflow_id,
                        "progress": progress,
                    })),
            )
            .await?;
        Ok(())
    }

    pub async fn record_scores(
        &self,
        trace_id: &str,
        scores: &Value,
    ) -> Result<(), ApiError> {
        let _: Option<Value> = self
            .send_json(
                self.request(reqwest::Method::POST, "/api/traces/scores", DEFAULT_TIMEOUT)
                    .json(&serde_json::json!({
                        "traceId": trace_id,
                        "scores": scores,
                    })),
            )
            .await?;
        Ok(())
    }

    pub async fn search_by_vector(
        &self,
        embedding: &[f32],
        limit: u32,
        threshold: f64,
    ) -> Result<SearchResponse, ApiError> {
        let builder = self
            .request(reqwest::Method::POST, "/api/entries/search-by-vector", LONG_TIMEOUT)
            .json(&serde_json::json!({
                "embedding": embedding,
                "limit": limit,
                "threshold": threshold,
            }));
        Ok(self.send_json(builder).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, routing::post, Json, Router};

    async fn serve(router: Router) -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn not_found_maps_to_none() {
        let (base, _guard) = serve(Router::new()).await;
        let api = ApiClient::new(&base, "token");
        let entry = api.get_entry("missing").await.unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn client_errors_are_not_retried_shapes() {
        let router = Router::new().route(
            "/api/entries/cleanup",
            post(|| async {
                (
                    axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                    "bad olderThanDays",
                )
            }),
        );
        let (base, _guard) = serve(router).await;
        let api = ApiClient::new(&base, "token");
        let err = api.cleanup_entries(0, true).await.unwrap_err();
        assert!(err.is_client());
    }

    #[tokio::test]
    async fn server_errors_surface_for_retry() {
        let router = Router::new().route(
            "/api/entries/:id",
            get(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let (base, _guard) = serve(router).await;
        let api = ApiClient::new(&base, "token");
        let err = api.get_entry("e1").await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 502, .. }));
    }

    #[tokio::test]
    async fn search_503_degrades_to_empty() {
        let router = Router::new().route(
            "/api/search",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "meili off") }),
        );
        let (base, _guard) = serve(router).await;
        let api = ApiClient::new(&base, "token");
        let result = api.search("query", 5).await.unwrap();
        assert!(result.entries.is_empty());
    }

    #[tokio::test]
    async fn bearer_token_is_attached() {
        let router = Router::new().route(
            "/api/settings",
            get(|headers: axum::http::HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(serde_json::json!({ "auth": auth }))
            }),
        );
        let (base, _guard) = serve(router).await;
        let api = ApiClient::new(&base, "secret-token");
        let settings = api.get_settings().await.unwrap();
        assert_eq!(settings["auth"], "Bearer secret-token");
    }
}
