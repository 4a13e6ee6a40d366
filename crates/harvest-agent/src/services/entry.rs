// Entry lookups against the REST backend, plus context rendering for
// system prompts.

use harvest_contracts::Entry;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct EntryService {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl EntryService {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn get_entry(&self, entry_id: &str) -> Option<Entry> {
        if self.base_url.is_empty() {
            return None;
        }
        let mut request = self
            .http
            .get(format!("{}/api/entries/{entry_id}", self.base_url))
            .timeout(std::time::Duration::from_secs(30));
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(entry_id, error = %err, "entry fetch failed");
                return None;
            }
        };
        if response.status().as_u16() == 404 {
            return None;
        }
        if !response.status().is_success() {
            warn!(entry_id, status = %response.status(), "entry fetch rejected");
            return None;
        }
        response.json().await.ok()
    }

    /// Render an entry as context for the assistant's system prompt.
    pub fn build_context(&self, entry: &Entry) -> String {
        let mut parts = vec![format!("# {}", entry.title)];

        if let Some(feed_name) = &entry.feed_name {
            parts.push(format!("Source: {feed_name}"));
        }
        if let Some(author) = &entry.author {
            parts.push(format!("Author: {author}"));
        }
        if let Some(published_at) = &entry.published_at {
            parts.push(format!("Published: {published_at}"));
        }
        parts.push(format!("URL: {}", entry.url));
        parts.push(String::new());

        // Best available content variant.
        let content = [
            &entry.translated_content,
            &entry.filtered_content,
            &entry.full_content,
            &entry.feed_content,
        ]
        .into_iter()
        .find(|c| !c.is_empty());
        if let Some(content) = content {
            parts.push("## Content".to_string());
            parts.push(content.clone());
        }

        if !entry.summary.is_empty() {
            parts.push(String::new());
            parts.push("## Summary".to_string());
            parts.push(entry.summary.clone());
        }

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefers_translated_content() {
        let service = EntryService::new("http://api.test", "");
        let entry = Entry {
            title: "Title".to_string(),
            url: "https://x.test/a".to_string(),
            feed_name: Some("Feed".to_string()),
            full_content: "full".to_string(),
            filtered_content: "filtered".to_string(),
            translated_content: "translated".to_string(),
            summary: "sum".to_string(),
            ..Default::default()
        };
        let context = service.build_context(&entry);
        assert!(context.starts_with("# Title"));
        assert!(context.contains("Source: Feed"));
        assert!(context.contains("translated"));
        assert!(!context.contains("\nfiltered"));
        assert!(context.contains("## Summary"));
    }

    #[test]
    fn context_falls_back_through_variants() {
        let service = EntryService::new("http://api.test", "");
        let entry = Entry {
            title: "T".to_string(),
            feed_content: "<p>feed html</p>".to_string(),
            ..Default::default()
        };
        let context = service.build_context(&entry);
        assert!(context.contains("<p>feed html</p>"));
    }
}
