// Environment-driven worker configuration.
//
// Required variables fail fast at startup; everything else has a default.

use anyhow::{bail, Result};

pub fn get_env(name: &str, default: Option<&str>) -> Result<String> {
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => match default {
            Some(default) => Ok(default.to_string()),
            None => bail!("required environment variable '{name}' is not set"),
        },
    }
}

pub fn get_env_bool(name: &str, default: bool) -> Result<bool> {
    let raw = get_env(name, Some(if default { "true" } else { "false" }))?;
    Ok(raw.eq_ignore_ascii_case("true"))
}

pub fn get_env_int(name: &str, default: usize) -> Result<usize> {
    let raw = get_env(name, Some(&default.to_string()))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("environment variable '{name}' is not an integer: {raw}"))
}

pub fn get_env_float(name: &str, default: f64) -> Result<f64> {
    let raw = get_env(name, Some(&default.to_string()))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("environment variable '{name}' is not a number: {raw}"))
}

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bind address for the engine's HTTP admin surface.
    pub temporal_host: String,
    pub temporal_namespace: String,
    pub temporal_task_queue: String,

    pub api_base_url: String,
    pub internal_api_token: String,

    pub openai_base_url: String,
    pub openai_api_key: String,
    /// Empty string disables the corresponding feature.
    pub research_model: String,
    pub summarization_model: String,
    pub embedding_model: String,

    pub graph_base_url: String,

    pub deepl_api_key: String,
    pub ms_translator_subscription_key: String,
    pub ms_translator_region: String,
    pub github_token: String,

    pub ai_evaluation_enabled: bool,
    pub otel_tracing_enabled: bool,

    pub feed_ingestion_concurrency: usize,
    pub domain_fetch_delay: f64,
    pub enable_content_fetch: bool,
    pub enable_summarization: bool,

    pub distillation_batch_size: usize,
    pub embedding_backfill_batch_size: usize,
    pub search_reindex_batch_size: usize,
    pub search_prune_batch_size: usize,
    pub graph_rebuild_batch_size: usize,
    pub global_graph_update_batch_size: usize,

    pub workflow_task_slots: usize,
    pub activity_slots: usize,

    pub log_level: String,
    pub log_json: bool,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            temporal_host: get_env("TEMPORAL_HOST", Some("127.0.0.1:7233"))?,
            temporal_namespace: get_env("TEMPORAL_NAMESPACE", Some("default"))?,
            temporal_task_queue: get_env("TEMPORAL_TASK_QUEUE", Some("harvest"))?,

            api_base_url: get_env("API_BASE_URL", None)?,
            internal_api_token: get_env("INTERNAL_API_TOKEN", None)?,

            openai_base_url: get_env("OPENAI_BASE_URL", Some(""))?,
            openai_api_key: get_env("OPENAI_API_KEY", Some(""))?,
            research_model: get_env("RESEARCH_MODEL", Some(""))?,
            summarization_model: get_env("SUMMARIZATION_MODEL", Some(""))?,
            embedding_model: get_env("EMBEDDING_MODEL", Some(""))?,

            graph_base_url: get_env("GRAPH_BASE_URL", Some(""))?,

            deepl_api_key: get_env("DEEPL_API_KEY", Some(""))?,
            ms_translator_subscription_key: get_env("MS_TRANSLATOR_SUBSCRIPTION_KEY", Some(""))?,
            ms_translator_region: get_env("MS_TRANSLATOR_REGION", Some(""))?,
            github_token: get_env("GITHUB_TOKEN", Some(""))?,

            ai_evaluation_enabled: get_env_bool("AI_EVALUATION_ENABLED", false)?,
            otel_tracing_enabled: get_env_bool("OTEL_TRACING_ENABLED", false)?,

            feed_ingestion_concurrency: get_env_int("FEED_INGESTION_CONCURRENCY", 4)?,
            domain_fetch_delay: get_env_float("DOMAIN_FETCH_DELAY", 1.0)?,
            enable_content_fetch: get_env_bool("ENABLE_CONTENT_FETCH", true)?,
            enable_summarization: get_env_bool("ENABLE_SUMMARIZATION", true)?,

            distillation_batch_size: get_env_int("DISTILLATION_BATCH_SIZE", 5)?,
            embedding_backfill_batch_size: get_env_int("EMBEDDING_BACKFILL_BATCH_SIZE", 50)?,
            search_reindex_batch_size: get_env_int("SEARCH_REINDEX_BATCH_SIZE", 100)?,
            search_prune_batch_size: get_env_int("SEARCH_PRUNE_BATCH_SIZE", 500)?,
            graph_rebuild_batch_size: get_env_int("GRAPH_REBUILD_BATCH_SIZE", 20)?,
            global_graph_update_batch_size: get_env_int("GLOBAL_GRAPH_UPDATE_BATCH_SIZE", 20)?,

            workflow_task_slots: get_env_int("WORKFLOW_TASK_SLOTS", 100)?,
            activity_slots: get_env_int("ACTIVITY_SLOTS", 100)?,

            log_level: get_env("LOG_LEVEL", Some("info"))?,
            log_json: get_env_bool("LOG_JSON", true)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_helpers_parse_and_default() {
        std::env::remove_var("HARVEST_TEST_MISSING");
        assert!(get_env("HARVEST_TEST_MISSING", None).is_err());
        assert_eq!(get_env("HARVEST_TEST_MISSING", Some("x")).unwrap(), "x");

        std::env::set_var("HARVEST_TEST_BOOL", "TRUE");
        assert!(get_env_bool("HARVEST_TEST_BOOL", false).unwrap());
        std::env::remove_var("HARVEST_TEST_BOOL");
        assert!(!get_env_bool("HARVEST_TEST_BOOL", false).unwrap());

        std::env::set_var("HARVEST_TEST_INT", "17");
        assert_eq!(get_env_int("HARVEST_TEST_INT", 3).unwrap(), 17);
        std::env::remove_var("HARVEST_TEST_INT");
        assert_eq!(get_env_int("HARVEST_TEST_INT", 3).unwrap(), 3);

        std::env::set_var("HARVEST_TEST_FLOAT", "0.5");
        assert_eq!(get_env_float("HARVEST_TEST_FLOAT", 1.0).unwrap(), 0.5);
        std::env::remove_var("HARVEST_TEST_FLOAT");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        std::env::set_var("HARVEST_TEST_BAD_INT", "nope");
        assert!(get_env_int("HARVEST_TEST_BAD_INT", 1).is_err());
        std::env::remove_var("HARVEST_TEST_BAD_INT");
    }
}
