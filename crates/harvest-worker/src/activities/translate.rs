// Translation activities, one per provider, with a heartbeat between items.

use harvest_durable::prelude::*;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::translate::{DeeplTranslator, MsTranslator};
use crate::services::Services;

pub struct DeeplTranslateEntries {
    svc: Services,
}

impl DeeplTranslateEntries {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for DeeplTranslateEntries {
    const TYPE: &'static str = "deepl_translate_entries";
    type Input = TranslateEntriesInput;
    type Output = TranslateEntriesOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.entries.is_empty() || input.target_language.is_empty() {
            return Ok(TranslateEntriesOutput::default());
        }
        if self.svc.config.deepl_api_key.is_empty() {
            warn!("DEEPL_API_KEY not configured");
            return Ok(TranslateEntriesOutput::default());
        }

        let translator = DeeplTranslator::new(
            self.svc.http.clone(),
            &self.svc.config.deepl_api_key,
            &input.target_language,
        );

        let total = input.entries.len();
        let mut translations = Vec::with_capacity(total);
        for (i, entry) in input.entries.iter().enumerate() {
            if entry.full_content.trim().is_empty() {
                continue;
            }
            ctx.heartbeat();
            info!(entry_id = %entry.entry_id, index = i + 1, total, "deepl translating entry");
            translations.push(translator.translate_single(entry).await);
        }
        let success = translations
            .iter()
            .filter(|t| !t.translated_content.is_empty())
            .count();
        info!(success, total, "deepl translation finished");
        Ok(TranslateEntriesOutput { translations })
    }
}

pub struct MsTranslateEntries {
    svc: Services,
}

impl MsTranslateEntries {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for MsTranslateEntries {
    const TYPE: &'static str = "ms_translate_entries";
    type Input = TranslateEntriesInput;
    type Output = TranslateEntriesOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.entries.is_empty() || input.target_language.is_empty() {
            return Ok(TranslateEntriesOutput::default());
        }
        let config = &self.svc.config;
        if config.ms_translator_subscription_key.is_empty() || config.ms_translator_region.is_empty()
        {
            warn!("MS translator credentials not configured");
            return Ok(TranslateEntriesOutput::default());
        }

        let translator = MsTranslator::new(
            self.svc.http.clone(),
            &config.ms_translator_subscription_key,
            &config.ms_translator_region,
            &input.target_language,
        );

        let total = input.entries.len();
        let mut translations = Vec::with_capacity(total);
        for (i, entry) in input.entries.iter().enumerate() {
            if entry.full_content.trim().is_empty() {
                continue;
            }
            ctx.heartbeat();
            info!(entry_id = %entry.entry_id, index = i + 1, total, "ms translating entry");
            translations.push(translator.translate_single(entry).await);
        }
        let success = translations
            .iter()
            .filter(|t| !t.translated_content.is_empty())
            .count();
        info!(success, total, "ms translation finished");
        Ok(TranslateEntriesOutput { translations })
    }
}

pub struct SaveTranslations {
    svc: Services,
}

impl SaveTranslations {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SaveTranslations {
    const TYPE: &'static str = "save_translations";
    type Input = SaveTranslationsInput;
    type Output = SaveTranslationsOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let mut saved_count = 0;
        let mut errors = Vec::new();
        for translation in &input.translations {
            if translation.translated_content.is_empty() {
                continue;
            }
            let fields = serde_json::json!({
                "translatedContent": translation.translated_content,
            });
            match self
                .svc
                .api
                .update_entry(&translation.entry_id, &fields)
                .await
            {
                Ok(true) => saved_count += 1,
                Ok(false) => {
                    warn!(entry_id = %translation.entry_id, "entry vanished before translation save")
                }
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    errors.push(format!("{}: {message}", translation.entry_id));
                }
            }
            ctx.heartbeat();
        }
        Ok(SaveTranslationsOutput {
            saved_count,
            error: errors.join("; "),
        })
    }
}
