// Agent service configuration.

use anyhow::{bail, Result};
use harvest_contracts::SearchMode;

fn get_env(name: &str, default: Option<&str>) -> Result<String> {
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => match default {
            Some(default) => Ok(default.to_string()),
            None => bail!("required environment variable '{name}' is not set"),
        },
    }
}

fn get_env_bool(name: &str, default: bool) -> Result<bool> {
    let raw = get_env(name, Some(if default { "true" } else { "false" }))?;
    Ok(raw.eq_ignore_ascii_case("true"))
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub host: String,
    pub port: u16,

    pub api_base_url: String,
    pub internal_api_token: String,

    pub openai_base_url: String,
    pub openai_api_key: String,
    /// Empty string disables research and dialogue LLM calls.
    pub research_model: String,
    /// Empty string disables vector search.
    pub embedding_model: String,

    pub default_search_mode: SearchMode,

    pub ai_evaluation_enabled: bool,
    pub otel_tracing_enabled: bool,

    pub cors_origins: Vec<String>,

    pub temporal_host: String,
    pub temporal_namespace: String,
    pub temporal_task_queue: String,

    pub log_level: String,
    pub log_json: bool,
}

impl AgentSettings {
    pub fn from_env() -> Result<Self> {
        let mode_raw = get_env("DEFAULT_SEARCH_MODE", Some("planner"))?;
        // Unknown modes fall back to planner at decode.
        let default_search_mode: SearchMode =
            serde_json::from_value(serde_json::Value::String(mode_raw)).unwrap_or_default();

        let cors_origins = get_env("CORS_ORIGINS", Some(""))?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            host: get_env("HOST", Some("0.0.0.0"))?,
            port: get_env("PORT", Some("8000"))?.parse()?,

            api_base_url: get_env("API_BASE_URL", None)?,
            internal_api_token: get_env("INTERNAL_API_TOKEN", Some(""))?,

            openai_base_url: get_env("OPENAI_BASE_URL", Some(""))?,
            openai_api_key: get_env("OPENAI_API_KEY", Some(""))?,
            research_model: get_env("RESEARCH_MODEL", Some(""))?,
            embedding_model: get_env("EMBEDDING_MODEL", Some(""))?,

            default_search_mode,

            ai_evaluation_enabled: get_env_bool("AI_EVALUATION_ENABLED", false)?,
            otel_tracing_enabled: get_env_bool("OTEL_TRACING_ENABLED", false)?,

            cors_origins,

            temporal_host: get_env("TEMPORAL_HOST", Some("127.0.0.1:7233"))?,
            temporal_namespace: get_env("TEMPORAL_NAMESPACE", Some("default"))?,
            temporal_task_queue: get_env("TEMPORAL_TASK_QUEUE", Some("harvest"))?,

            log_level: get_env("LOG_LEVEL", Some("info"))?,
            log_json: get_env_bool("LOG_JSON", true)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_search_mode_falls_back_to_planner() {
        let mode: SearchMode =
            serde_json::from_value(serde_json::Value::String("mystery".to_string()))
                .unwrap_or_default();
        assert_eq!(mode, SearchMode::Planner);
    }
}
