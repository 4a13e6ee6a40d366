// Entry translation through the configured provider.

use std::time::Duration;

use harvest_contracts::EntryToTranslate;
use harvest_durable::prelude::*;
use tracing::warn;

use crate::activities::{DeeplTranslateEntries, GetEntries, MsTranslateEntries, SaveTranslations};
use crate::models::*;
use crate::workflows::progress::ProgressHandle;

pub struct TranslationWorkflow;

#[async_trait]
impl Workflow for TranslationWorkflow {
    const TYPE: &'static str = "translation";
    type Input = TranslationInput;
    type Output = TranslationResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        progress.update(|p| p.entity_ids = input.entry_ids.clone());
        let outcome = run_inner(&ctx, input, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: TranslationInput,
    progress: &ProgressHandle,
) -> Result<TranslationResult, WorkflowError> {
    let mut result = TranslationResult {
        status: "completed".to_string(),
        ..Default::default()
    };

    // No target language means translation is off entirely.
    if input.target_language.is_empty() || input.entry_ids.is_empty() {
        progress.complete(ctx, "Nothing to translate").await;
        return Ok(result);
    }

    progress.step(ctx, "load", "Loading entries").await;
    let loaded = ctx
        .activity::<GetEntries>(
            GetEntriesInput {
                entry_ids: input.entry_ids.clone(),
            },
            ActivityOptions::long(Duration::from_secs(120)),
        )
        .await?;

    let entries: Vec<EntryToTranslate> = loaded
        .entries
        .into_iter()
        .filter_map(|with_rules| {
            let entry = with_rules.entry;
            let content = if !entry.filtered_content.is_empty() {
                entry.filtered_content
            } else {
                entry.full_content
            };
            (!content.trim().is_empty()).then(|| EntryToTranslate {
                entry_id: entry.id,
                title: entry.title,
                url: entry.url,
                full_content: content,
            })
        })
        .collect();
    if entries.is_empty() {
        progress.complete(ctx, "No entries with content").await;
        return Ok(result);
    }

    progress
        .step(ctx, "translate", format!("Translating {} entries", entries.len()))
        .await;
    let translate_options = ActivityOptions::long(Duration::from_secs(1800))
        .with_heartbeat(Duration::from_secs(60))
        .with_retry(
            RetryPolicy::exponential()
                .with_max_attempts(2)
                .with_initial_interval(Duration::from_secs(5)),
        );
    let translate_input = TranslateEntriesInput {
        entries,
        target_language: input.target_language.clone(),
    };
    let translated = match input.provider.as_str() {
        "deepl" => {
            ctx.activity::<DeeplTranslateEntries>(translate_input, translate_options)
                .await?
        }
        _ => {
            ctx.activity::<MsTranslateEntries>(translate_input, translate_options)
                .await?
        }
    };

    if translated.translations.is_empty() {
        progress.complete(ctx, "Translator produced no output").await;
        return Ok(result);
    }

    progress.step(ctx, "save", "Saving translations").await;
    let saved = ctx
        .activity::<SaveTranslations>(
            SaveTranslationsInput {
                translations: translated.translations,
            },
            ActivityOptions::long(Duration::from_secs(120)).with_heartbeat(Duration::from_secs(30)),
        )
        .await?;
    if !saved.error.is_empty() {
        warn!(error = %saved.error, "translation save error");
    }

    result.translated_count = saved.saved_count;
    progress
        .complete(ctx, format!("Translated {} entries", result.translated_count))
        .await;
    Ok(result)
}
