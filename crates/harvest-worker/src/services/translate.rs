// Translator API clients: DeepL and Microsoft (Azure Cognitive Services).

use harvest_contracts::{EntryToTranslate, TranslatedEntry};
use serde::Deserialize;
use tracing::warn;

const DEEPL_API_URL: &str = "https://api-free.deepl.com/v2/translate";
const MS_TRANSLATOR_URL: &str = "https://api.cognitive.microsofttranslator.com/translate";

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("translator rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl TranslateError {
    /// 5xx and transport failures are worth retrying; 4xx is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Transport(_) => true,
            TranslateError::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// DeepL REST client.
pub struct DeeplTranslator {
    http: reqwest::Client,
    api_key: String,
    target_language: String,
}

#[derive(Debug, Deserialize)]
struct DeeplResponse {
    translations: Vec<DeeplTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeeplTranslation {
    text: String,
}

impl DeeplTranslator {
    pub fn new(http: reqwest::Client, api_key: &str, target_language: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            target_language: target_language.to_uppercase(),
        }
    }

    pub async fn translate_text(&self, text: &str) -> Result<String, TranslateError> {
        let response = self
            .http
            .post(DEEPL_API_URL)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&serde_json::json!({
                "text": [text],
                "target_lang": self.target_language,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: DeeplResponse = response.json().await?;
        Ok(body
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .unwrap_or_default())
    }

    /// Translate one entry; failures yield an empty translation so batch
    /// processing continues.
    pub async fn translate_single(&self, entry: &EntryToTranslate) -> TranslatedEntry {
        match self.translate_text(&entry.full_content).await {
            Ok(translated_content) => TranslatedEntry {
                entry_id: entry.entry_id.clone(),
                translated_content,
            },
            Err(err) => {
                warn!(entry_id = %entry.entry_id, error = %err, "deepl translation failed");
                TranslatedEntry {
                    entry_id: entry.entry_id.clone(),
                    translated_content: String::new(),
                }
            }
        }
    }
}

/// Microsoft Translator client.
pub struct MsTranslator {
    http: reqwest::Client,
    subscription_key: String,
    region: String,
    target_language: String,
}

#[derive(Debug, Deserialize)]
struct MsResponseItem {
    translations: Vec<MsTranslation>,
}

#[derive(Debug, Deserialize)]
struct MsTranslation {
    text: String,
}

impl MsTranslator {
    pub fn new(
        http: reqwest::Client,
        subscription_key: &str,
        region: &str,
        target_language: &str,
    ) -> Self {
        Self {
            http,
            subscription_key: subscription_key.to_string(),
            region: region.to_string(),
            target_language: target_language.to_string(),
        }
    }

    pub async fn translate_text(&self, text: &str) -> Result<String, TranslateError> {
        let response = self
            .http
            .post(MS_TRANSLATOR_URL)
            .query(&[("api-version", "3.0"), ("to", &self.target_language)])
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header("Ocp-Apim-Subscription-Region", &self.region)
            .json(&serde_json::json!([{ "Text": text }]))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: Vec<MsResponseItem> = response.json().await?;
        Ok(body
            .into_iter()
            .next()
            .and_then(|item| item.translations.into_iter().next())
            .map(|t| t.text)
            .unwrap_or_default())
    }

    pub async fn translate_single(&self, entry: &EntryToTranslate) -> TranslatedEntry {
        match self.translate_text(&entry.full_content).await {
            Ok(translated_content) => TranslatedEntry {
                entry_id: entry.entry_id.clone(),
                translated_content,
            },
            Err(err) => {
                warn!(entry_id = %entry.entry_id, error = %err, "ms translation failed");
                TranslatedEntry {
                    entry_id: entry.entry_id.clone(),
                    translated_content: String::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_retryability() {
        let client_err = TranslateError::Rejected {
            status: 403,
            body: "quota".to_string(),
        };
        assert!(!client_err.is_retryable());

        let server_err = TranslateError::Rejected {
            status: 503,
            body: "busy".to_string(),
        };
        assert!(server_err.is_retryable());
    }

    #[test]
    fn deepl_uppercases_target_language() {
        let translator =
            DeeplTranslator::new(reqwest::Client::new(), "key", "ja");
        assert_eq!(translator.target_language, "JA");
    }
}
