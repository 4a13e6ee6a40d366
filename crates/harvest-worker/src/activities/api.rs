// REST backend activities: feeds, entries, settings, context.

use std::collections::HashMap;

use harvest_durable::prelude::*;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::Services;

pub struct ListFeeds {
    svc: Services,
}

impl ListFeeds {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for ListFeeds {
    const TYPE: &'static str = "list_feeds";
    type Input = ListFeedsInput;
    type Output = ListFeedsOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        _input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let feeds = match self.svc.api.list_feeds().await {
            Ok(feeds) => feeds,
            Err(err) => {
                let message = client_error_or_raise(err)?;
                warn!(error = %message, "feed listing rejected");
                Vec::new()
            }
        };
        info!(count = feeds.len(), "listed feeds");
        Ok(ListFeedsOutput { feeds })
    }
}

pub struct GetAppSettings {
    svc: Services,
}

impl GetAppSettings {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for GetAppSettings {
    const TYPE: &'static str = "get_app_settings";
    type Input = GetAppSettingsInput;
    type Output = AppSettings;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        _input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let settings = match self.svc.api.get_settings().await {
            Ok(settings) => settings,
            Err(err) => {
                let message = client_error_or_raise(err)?;
                warn!(error = %message, "settings fetch rejected, using config defaults");
                serde_json::Value::Object(Default::default())
            }
        };

        let config = &self.svc.config;
        let target_language = settings["targetLanguage"].as_str().unwrap_or("").to_string();
        let translation_provider = settings["translationProvider"]
            .as_str()
            .unwrap_or("")
            .to_string();

        info!(
            target_language = %target_language,
            enable_content_fetch = config.enable_content_fetch,
            enable_summarization = config.enable_summarization,
            max_concurrent = config.feed_ingestion_concurrency,
            domain_fetch_delay = config.domain_fetch_delay,
            "got app settings"
        );

        Ok(AppSettings {
            target_language,
            translation_provider,
            enable_content_fetch: config.enable_content_fetch,
            enable_summarization: config.enable_summarization,
            ai_evaluation_enabled: config.ai_evaluation_enabled,
            max_concurrent: config.feed_ingestion_concurrency.max(1),
            domain_fetch_delay: config.domain_fetch_delay,
            distillation_batch_size: config.distillation_batch_size.max(1),
            embedding_backfill_batch_size: config.embedding_backfill_batch_size.max(1),
            search_reindex_batch_size: config.search_reindex_batch_size.max(1),
            global_graph_update_batch_size: config.global_graph_update_batch_size.max(1),
        })
    }
}

pub struct GetEntry {
    svc: Services,
}

impl GetEntry {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for GetEntry {
    const TYPE: &'static str = "get_entry";
    type Input = GetEntryInput;
    type Output = GetEntryOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let entry = match self.svc.api.get_entry(&input.entry_id).await {
            Ok(entry) => entry,
            Err(err) => {
                let message = client_error_or_raise(err)?;
                warn!(entry_id = %input.entry_id, error = %message, "entry fetch rejected");
                None
            }
        };
        Ok(GetEntryOutput { entry })
    }
}

pub struct GetEntries {
    svc: Services,
}

impl GetEntries {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for GetEntries {
    const TYPE: &'static str = "get_entries";
    type Input = GetEntriesInput;
    type Output = GetEntriesOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let mut entries = Vec::new();
        // Feed options rarely change within a batch; cache per feed id.
        let mut feed_rules: HashMap<String, Vec<String>> = HashMap::new();

        for entry_id in &input.entry_ids {
            let entry = match self.svc.api.get_entry(entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!(entry_id = %entry_id, "entry not found");
                    continue;
                }
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    warn!(entry_id = %entry_id, error = %message, "entry fetch rejected");
                    continue;
                }
            };

            let rules = if entry.feed_id.is_empty() {
                Vec::new()
            } else if let Some(rules) = feed_rules.get(&entry.feed_id) {
                rules.clone()
            } else {
                let rules = match self.svc.api.get_feed(&entry.feed_id).await {
                    Ok(Some(feed)) => feed
                        .options
                        .map(|o| o.extraction_rules)
                        .unwrap_or_default(),
                    Ok(None) => Vec::new(),
                    Err(err) => {
                        client_error_or_raise(err)?;
                        Vec::new()
                    }
                };
                feed_rules.insert(entry.feed_id.clone(), rules.clone());
                rules
            };

            entries.push(EntryWithRules {
                entry,
                extraction_rules: rules,
            });
        }

        info!(
            requested = input.entry_ids.len(),
            loaded = entries.len(),
            "loaded entries"
        );
        Ok(GetEntriesOutput { entries })
    }
}

pub struct SaveEntryContext {
    svc: Services,
}

impl SaveEntryContext {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SaveEntryContext {
    const TYPE: &'static str = "save_entry_context";
    type Input = SaveEntryContextInput;
    type Output = SaveEntryContextOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        match self
            .svc
            .api
            .save_entry_context(&input.entry_id, &input.context)
            .await
        {
            Ok(()) => {
                info!(entry_id = %input.entry_id, "saved entry context");
                Ok(SaveEntryContextOutput {
                    success: true,
                    error: String::new(),
                })
            }
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(SaveEntryContextOutput {
                    success: false,
                    error: message,
                })
            }
        }
    }
}

pub struct ListUnsummarizedEntryIds {
    svc: Services,
}

impl ListUnsummarizedEntryIds {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for ListUnsummarizedEntryIds {
    const TYPE: &'static str = "list_unsummarized_entry_ids";
    type Input = ListUnsummarizedEntryIdsInput;
    type Output = ListUnsummarizedEntryIdsOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let entries = match self.svc.api.list_unsummarized_entry_ids(input.limit).await {
            Ok(entries) => entries,
            Err(err) => {
                client_error_or_raise(err)?;
                Vec::new()
            }
        };
        // Only entries that actually have content can be summarized.
        let entry_ids: Vec<String> = entries
            .into_iter()
            .filter(|e| !e.full_content.is_empty() || !e.filtered_content.is_empty())
            .map(|e| e.id)
            .collect();
        info!(count = entry_ids.len(), "found unsummarized entries with content");
        Ok(ListUnsummarizedEntryIdsOutput { entry_ids })
    }
}
