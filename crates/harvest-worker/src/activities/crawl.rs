// Feed crawling with conditional GET.

use harvest_contracts::{CrawlReport, FeedEntry};
use harvest_durable::prelude::*;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::{CrawlSingleFeedInput, CrawlSingleFeedOutput};
use crate::services::{feed, Services};
use crate::urlutil;

pub struct CrawlSingleFeed {
    svc: Services,
}

impl CrawlSingleFeed {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for CrawlSingleFeed {
    const TYPE: &'static str = "crawl_single_feed";
    type Input = CrawlSingleFeedInput;
    type Output = CrawlSingleFeedOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let feed_info = input.feed;
        let mut report = CrawlReport::default();

        // Conditional-GET state from the previous crawl.
        let fetch_state = match self.svc.api.get_feed_fetch_state(&feed_info.id).await {
            Ok(state) => state.unwrap_or_default(),
            Err(err) => {
                client_error_or_raise(err)?;
                serde_json::Value::Null
            }
        };

        let mut request = self.svc.http.get(&feed_info.url);
        if let Some(etag) = fetch_state["etag"].as_str() {
            request = request.header("If-None-Match", etag);
        }
        if let Some(last_modified) = fetch_state["lastModified"].as_str() {
            request = request.header("If-Modified-Since", last_modified);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return Err(ActivityError::retryable(format!(
                    "feed fetch failed for {}: {err}",
                    feed_info.url
                ))
                .with_type("TRANSPORT"));
            }
        };

        if response.status().as_u16() == 304 {
            info!(feed_id = %feed_info.id, "feed not modified");
            report.feeds_skipped = 1;
            return Ok(CrawlSingleFeedOutput {
                report,
                error: String::new(),
            });
        }
        if !response.status().is_success() {
            // The feed itself is broken, not our infrastructure; report it
            // without retry.
            return Ok(CrawlSingleFeedOutput {
                report,
                error: format!("feed returned status {}", response.status()),
            });
        }

        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = response
            .headers()
            .get("last-modified")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| ActivityError::retryable(format!("feed body read failed: {e}")))?;

        let parsed = feed::parse_feed(&body);
        report.feeds_processed = 1;
        ctx.heartbeat();

        // Create entries through the backend; it dedupes by normalized URL.
        let mut seen_urls = std::collections::HashSet::new();
        for item in parsed.items {
            if item.link.is_empty() {
                continue;
            }
            let dedup_url = urlutil::normalize_for_dedup(&item.link);
            if !seen_urls.insert(dedup_url) {
                report.entries_skipped += 1;
                continue;
            }

            let payload = serde_json::json!({
                "feedId": feed_info.id,
                "title": item.title,
                "url": item.link,
                "author": item.author,
                "publishedAt": item.published,
                "feedContent": item.content_html,
            });
            match self.svc.api.create_entry(&payload).await {
                Ok(Some(created)) if created.created => {
                    report.entries_created += 1;
                    report.new_entries.push(FeedEntry {
                        entry_id: created.id,
                        feed_id: feed_info.id.clone(),
                        feed_name: feed_info.name.clone(),
                        title: item.title,
                        url: item.link,
                        feed_content: item.content_html,
                        author: item.author,
                        published_at: item.published,
                    });
                }
                Ok(_) => report.entries_skipped += 1,
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    warn!(feed_id = %feed_info.id, url = %item.link, error = %message, "entry create rejected");
                }
            }
            ctx.heartbeat();
        }

        if let Err(err) = self
            .svc
            .api
            .save_feed_fetch_state(
                &feed_info.id,
                &serde_json::json!({ "etag": etag, "lastModified": last_modified }),
            )
            .await
        {
            let message = client_error_or_raise(err)?;
            warn!(feed_id = %feed_info.id, error = %message, "fetch-state save rejected");
        }

        info!(
            feed_id = %feed_info.id,
            created = report.entries_created,
            skipped = report.entries_skipped,
            "crawl finished"
        );
        Ok(CrawlSingleFeedOutput {
            report,
            error: String::new(),
        })
    }
}
