// Entry and feed records as served by the REST backend.
//
// Entry ids are 26-character lexicographically sortable tokens minted by the
// backend; this crate treats them as opaque strings and never generates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A curated feed entry with all of its content variants.
///
/// `filtered_content` is derived from `full_content` by line-range selection,
/// `translated_content` exists only when a target language is configured, and
/// `embedding` exists only when at least one of filtered content, summary or
/// title is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Entry {
    pub id: String,
    pub feed_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_site_url: Option<String>,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Raw HTML as delivered by the RSS/Atom feed.
    pub feed_content: String,
    /// Full fetched page content, converted to Markdown.
    pub full_content: String,
    /// Main-article slice of `full_content`.
    pub filtered_content: String,
    /// Translation of the filtered content, when a target language is set.
    pub translated_content: String,
    /// Short LLM-produced summary in the target language.
    pub summary: String,
    pub is_read: bool,
    pub is_starred: bool,
    pub keep: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// 768-dimensional content embedding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Entry {
    /// Best text for embedding: filtered content, then summary, then title.
    pub fn embedding_text(&self) -> &str {
        if !self.filtered_content.is_empty() {
            &self.filtered_content
        } else if !self.summary.is_empty() {
            &self.summary
        } else {
            &self.title
        }
    }
}

/// Feed fetch options. Extraction rules are CSS selectors whose matches are
/// removed from fetched HTML before Markdown conversion; they are exclusions
/// only, never inclusions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedOptions {
    pub extraction_rules: Vec<String>,
}

/// A subscribed feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FeedOptions>,
}

/// An entry discovered during a feed crawl, before any content fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedEntry {
    pub entry_id: String,
    pub feed_id: String,
    pub feed_name: String,
    pub title: String,
    pub url: String,
    pub feed_content: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// Result of crawling one or more feeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlReport {
    pub feeds_processed: u32,
    /// Feeds answered with 304 Not Modified.
    pub feeds_skipped: u32,
    pub entries_created: u32,
    /// Duplicate entries skipped by normalized-URL dedup.
    pub entries_skipped: u32,
    pub new_entries: Vec<FeedEntry>,
}

impl CrawlReport {
    pub fn merge(&mut self, other: CrawlReport) {
        self.feeds_processed += other.feeds_processed;
        self.feeds_skipped += other.feeds_skipped;
        self.entries_created += other.entries_created;
        self.entries_skipped += other.entries_skipped;
        self.new_entries.extend(other.new_entries);
    }
}

/// Fetched page content after exclusion rules and Markdown conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchedContent {
    pub full_content: String,
    pub title: String,
    /// Links discovered in the page body, for enrichment.
    pub links: Vec<ExtractedLink>,
}

/// A link found in fetched content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedLink {
    pub url: String,
    pub title: String,
}

/// Distillation result for a single entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessedEntry {
    pub entry_id: String,
    pub summary: String,
    pub filtered_content: String,
    /// First line of the main content (1-indexed).
    pub start_line: u32,
    /// Last line of the main content (1-indexed); 0 when unset.
    pub end_line: u32,
}

/// Entry payload handed to a translator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryToTranslate {
    pub entry_id: String,
    pub title: String,
    pub url: String,
    pub full_content: String,
}

/// Translation result for a single entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslatedEntry {
    pub entry_id: String,
    pub translated_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_camel_case() {
        let entry = Entry {
            id: "01JGXV0AAAAAAAAAAAAAAAAAAA".to_string(),
            feed_id: "01JGXV0BBBBBBBBBBBBBBBBBBB".to_string(),
            title: "Hello".to_string(),
            filtered_content: "body".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["feedId"], "01JGXV0BBBBBBBBBBBBBBBBBBB");
        assert_eq!(json["filteredContent"], "body");
        assert!(json.get("feed_id").is_none());
    }

    #[test]
    fn embedding_text_prefers_filtered_content() {
        let mut entry = Entry {
            title: "t".to_string(),
            summary: "s".to_string(),
            filtered_content: "f".to_string(),
            ..Default::default()
        };
        assert_eq!(entry.embedding_text(), "f");
        entry.filtered_content.clear();
        assert_eq!(entry.embedding_text(), "s");
        entry.summary.clear();
        assert_eq!(entry.embedding_text(), "t");
    }

    #[test]
    fn crawl_report_merge_accumulates() {
        let mut a = CrawlReport {
            feeds_processed: 1,
            entries_created: 2,
            new_entries: vec![FeedEntry {
                entry_id: "e1".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        a.merge(CrawlReport {
            feeds_processed: 1,
            feeds_skipped: 1,
            entries_created: 1,
            new_entries: vec![FeedEntry {
                entry_id: "e2".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(a.feeds_processed, 2);
        assert_eq!(a.feeds_skipped, 1);
        assert_eq!(a.entries_created, 3);
        assert_eq!(a.new_entries.len(), 2);
    }
}
