// RAGAS-style evaluation: LLM-judged faithfulness and relevancy scores
// recorded to the tracing store.

use std::collections::BTreeMap;

use harvest_durable::prelude::*;
use harvest_llm::{ChatMessage, ChatOptions};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::Services;

const JUDGE_PROMPT: &str = "You evaluate a question-answering system. Given the \
question, the retrieved contexts and the generated answer, score two metrics in \
[0, 1]: faithfulness (is every claim in the answer supported by the contexts?) \
and relevancy (does the answer address the question?). Judge strictly.";

fn scores_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "faithfulness": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "relevancy": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
        },
        "required": ["faithfulness", "relevancy"],
        "additionalProperties": false,
    })
}

#[derive(Debug, Deserialize)]
struct JudgeScores {
    faithfulness: f64,
    relevancy: f64,
}

pub struct EvaluateRagas {
    svc: Services,
}

impl EvaluateRagas {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for EvaluateRagas {
    const TYPE: &'static str = "evaluate_ragas";
    type Input = EvaluateRagasInput;
    type Output = EvaluateRagasOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let model = &self.svc.config.research_model;
        if model.is_empty() {
            return Ok(EvaluateRagasOutput {
                error: "evaluation disabled: no model configured".to_string(),
                ..Default::default()
            });
        }

        let messages = [
            ChatMessage::system(JUDGE_PROMPT),
            ChatMessage::user(format!(
                "Question:\n{}\n\nContexts:\n{}\n\nAnswer:\n{}",
                input.question,
                input.contexts.join("\n---\n"),
                input.answer
            )),
        ];

        let judged: JudgeScores = match self
            .svc
            .llm
            .structured(&messages, "ragas_scores", scores_schema(), &ChatOptions::model(model))
            .await
        {
            Ok(judged) => judged,
            Err(err) => {
                return Ok(EvaluateRagasOutput {
                    error: format!("evaluation failed: {err}"),
                    ..Default::default()
                })
            }
        };

        let mut scores = BTreeMap::new();
        scores.insert("faithfulness".to_string(), judged.faithfulness.clamp(0.0, 1.0));
        scores.insert("relevancy".to_string(), judged.relevancy.clamp(0.0, 1.0));

        if let Err(err) = self
            .svc
            .api
            .record_scores(&input.trace_id, &serde_json::to_value(&scores).unwrap_or_default())
            .await
        {
            let message = client_error_or_raise(err)?;
            warn!(trace_id = %input.trace_id, error = %message, "score recording rejected");
        }

        info!(
            trace_id = %input.trace_id,
            faithfulness = scores["faithfulness"],
            relevancy = scores["relevancy"],
            "ragas evaluation finished"
        );
        Ok(EvaluateRagasOutput {
            success: true,
            scores,
            error: String::new(),
        })
    }
}

pub struct EvaluateSummarization {
    svc: Services,
}

impl EvaluateSummarization {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for EvaluateSummarization {
    const TYPE: &'static str = "evaluate_summarization";
    type Input = EvaluateSummarizationInput;
    type Output = EvaluateSummarizationOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let model = self.svc.config.research_model.clone();
        if model.is_empty() {
            return Ok(EvaluateSummarizationOutput {
                error: "evaluation disabled: no model configured".to_string(),
                ..Default::default()
            });
        }
        if input.items.is_empty() {
            return Ok(EvaluateSummarizationOutput {
                success: true,
                ..Default::default()
            });
        }

        // Content is fetched here rather than shipped through the workflow.
        let mut total_faithfulness = 0.0;
        let mut total_relevancy = 0.0;
        let mut judged_count = 0u32;

        for item in &input.items {
            ctx.heartbeat();
            let entry = match self.svc.api.get_entry(&item.entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    client_error_or_raise(err)?;
                    continue;
                }
            };
            if entry.summary.is_empty() || entry.filtered_content.is_empty() {
                continue;
            }

            let messages = [
                ChatMessage::system(JUDGE_PROMPT),
                ChatMessage::user(format!(
                    "Question:\nSummarize this article.\n\nContexts:\n{}\n\nAnswer:\n{}",
                    entry.filtered_content, entry.summary
                )),
            ];
            match self
                .svc
                .llm
                .structured::<JudgeScores>(
                    &messages,
                    "ragas_scores",
                    scores_schema(),
                    &ChatOptions::model(&model),
                )
                .await
            {
                Ok(judged) => {
                    total_faithfulness += judged.faithfulness.clamp(0.0, 1.0);
                    total_relevancy += judged.relevancy.clamp(0.0, 1.0);
                    judged_count += 1;
                }
                Err(err) => {
                    warn!(entry_id = %item.entry_id, error = %err, "summary evaluation failed");
                }
            }
        }

        if judged_count == 0 {
            return Ok(EvaluateSummarizationOutput {
                error: "no summaries evaluated".to_string(),
                ..Default::default()
            });
        }

        let mut scores = BTreeMap::new();
        scores.insert(
            "faithfulness".to_string(),
            total_faithfulness / judged_count as f64,
        );
        scores.insert("relevancy".to_string(), total_relevancy / judged_count as f64);

        if let Err(err) = self
            .svc
            .api
            .record_scores(&input.trace_id, &serde_json::to_value(&scores).unwrap_or_default())
            .await
        {
            let message = client_error_or_raise(err)?;
            warn!(trace_id = %input.trace_id, error = %message, "score recording rejected");
        }

        info!(trace_id = %input.trace_id, judged_count, "summarization evaluation finished");
        Ok(EvaluateSummarizationOutput {
            success: true,
            scores,
            error: String::new(),
        })
    }
}
