// Full-content fetch: plain HTTP, exclusion rules, Markdown conversion.

use harvest_durable::prelude::*;
use tracing::{info, warn};
use url::Url;

use crate::activities::client_error_or_raise;
use crate::models::{FetchSingleContentInput, FetchSingleContentOutput};
use crate::services::{html, Services};

/// Hosts that never yield useful article content.
const BLOCKED_DOMAINS: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
    "www.youtube.com",
];

fn blocked(host: &str) -> bool {
    BLOCKED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

pub struct FetchSingleContent {
    svc: Services,
}

impl FetchSingleContent {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for FetchSingleContent {
    const TYPE: &'static str = "fetch_single_content";
    type Input = FetchSingleContentInput;
    type Output = FetchSingleContentOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let target = input.target;

        let parsed_url = match Url::parse(&target.url) {
            Ok(url) => url,
            Err(_) => {
                return Ok(FetchSingleContentOutput {
                    error: format!("unparsable url: {}", target.url),
                    ..Default::default()
                })
            }
        };
        let host = parsed_url.host_str().unwrap_or("").to_lowercase();
        if blocked(&host) {
            info!(entry_id = %target.entry_id, host = %host, "skipping blocked domain");
            return Ok(FetchSingleContentOutput {
                error: format!("domain blocked: {host}"),
                ..Default::default()
            });
        }

        let response = match self.svc.http.get(target.url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                return Err(ActivityError::retryable(format!(
                    "content fetch failed for {}: {err}",
                    target.url
                ))
                .with_type("TRANSPORT"))
            }
        };
        let status = response.status();
        if status.is_server_error() {
            return Err(
                ActivityError::retryable(format!("content fetch got {status} for {}", target.url))
                    .with_type("SERVER_ERROR"),
            );
        }
        if !status.is_success() {
            return Ok(FetchSingleContentOutput {
                error: format!("page returned status {status}"),
                ..Default::default()
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ActivityError::retryable(format!("content read failed: {e}")))?;

        let markdown = html::html_to_markdown(&body, &target.extraction_rules);
        let title = html::page_title(&body).unwrap_or_default();
        let links = html::extract_links(&body, Some(&parsed_url));

        if markdown.trim().is_empty() {
            return Ok(FetchSingleContentOutput {
                error: "no content after conversion".to_string(),
                ..Default::default()
            });
        }

        // Persist the converted content on the entry.
        let mut fields = serde_json::json!({ "fullContent": markdown });
        if !title.is_empty() {
            fields["metadata"] = serde_json::json!({ "pageTitle": title });
        }
        if let Err(err) = self.svc.api.update_entry(&target.entry_id, &fields).await {
            let message = client_error_or_raise(err)?;
            warn!(entry_id = %target.entry_id, error = %message, "content save rejected");
            return Ok(FetchSingleContentOutput {
                fetched: false,
                content_chars: 0,
                links,
                error: message,
            });
        }

        info!(
            entry_id = %target.entry_id,
            chars = markdown.len(),
            links = links.len(),
            "fetched content"
        );
        Ok(FetchSingleContentOutput {
            fetched: true,
            content_chars: markdown.len() as u32,
            links,
            error: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocklist_matches_subdomains() {
        assert!(blocked("twitter.com"));
        assert!(blocked("mobile.twitter.com"));
        assert!(!blocked("nottwitter.com"));
        assert!(!blocked("example.com"));
    }
}
