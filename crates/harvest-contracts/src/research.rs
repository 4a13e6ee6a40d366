// Deep Research records: search plans, retrieved documents and answers.
//
// These mirror the LLM structured-output schemas, so every field is validated
// at decode and the enumerations are closed.

use serde::{Deserialize, Deserializer, Serialize};

/// How the retriever selects its sources.
///
/// Unknown values decode as `Planner`, which defers to the plan's own source
/// list.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Planner,
    Keyword,
    Vector,
    Hybrid,
}

impl<'de> Deserialize<'de> for SearchMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "keyword" => SearchMode::Keyword,
            "vector" => SearchMode::Vector,
            "hybrid" => SearchMode::Hybrid,
            _ => SearchMode::Planner,
        })
    }
}

/// An individual search backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Keyword,
    Vector,
}

/// Planner output: the search strategy for one iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlan {
    /// Sub-queries to run; the original query or a decomposition of it.
    pub sub_queries: Vec<String>,
    /// Sources to search.
    #[serde(default = "default_sources")]
    pub sources: Vec<SearchSource>,
    /// Short human-readable rationale for the strategy.
    pub reasoning: String,
}

fn default_sources() -> Vec<SearchSource> {
    vec![SearchSource::Keyword]
}

impl SearchPlan {
    /// A valid plan has at least one sub-query.
    pub fn validate(&self) -> Result<(), String> {
        if self.sub_queries.is_empty() {
            return Err("search plan must contain at least one sub-query".to_string());
        }
        Ok(())
    }
}

/// A single document returned by a search backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDoc {
    /// Which backend produced the document.
    pub source: String,
    pub id: String,
    pub title: String,
    /// Content excerpt or summary.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Relevance in [0, 1]; higher is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// Reference to a source used in the final answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    /// Bracketed index, e.g. "[1]".
    pub id: String,
    pub title: String,
    /// How the source contributed to the answer.
    pub usage: String,
}

/// Category of the final answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    Comparison,
    Explanation,
    Recommendation,
    Summary,
}

/// Writer output: the final research answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchAnswer {
    /// Markdown answer text.
    pub answer: String,
    pub answer_type: AnswerType,
    #[serde(default)]
    pub sources: Vec<SourceReference>,
    /// Confidence in [0, 1]; clamped at decode.
    #[serde(deserialize_with = "clamp_unit")]
    pub confidence: f64,
    #[serde(default)]
    pub needs_more_info: bool,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

fn clamp_unit<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.clamp(0.0, 1.0))
}

/// Mutable state threaded through the planner → retriever → writer loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchState {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_context: Option<String>,
    pub search_mode: SearchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SearchPlan>,
    /// Unique documents accumulated across iterations, first occurrence wins.
    pub retrieved_docs: Vec<RetrievedDoc>,
    pub final_answer: String,
    pub iteration: u32,
    pub needs_more_info: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Extend `retrieved_docs`, dropping documents whose id is already
    /// present. Insertion order is preserved.
    pub fn absorb_docs(&mut self, docs: impl IntoIterator<Item = RetrievedDoc>) {
        for doc in docs {
            if !self.retrieved_docs.iter().any(|d| d.id == doc.id) {
                self.retrieved_docs.push(doc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> RetrievedDoc {
        RetrievedDoc {
            source: "keyword".to_string(),
            id: id.to_string(),
            title: format!("doc {id}"),
            content: String::new(),
            url: None,
            relevance_score: None,
        }
    }

    #[test]
    fn unknown_search_mode_decodes_as_planner() {
        let mode: SearchMode = serde_json::from_str("\"semantic\"").unwrap();
        assert_eq!(mode, SearchMode::Planner);
        let mode: SearchMode = serde_json::from_str("\"HYBRID\"").unwrap();
        assert_eq!(mode, SearchMode::Hybrid);
    }

    #[test]
    fn plan_requires_sub_queries() {
        let plan = SearchPlan {
            sub_queries: vec![],
            sources: vec![SearchSource::Keyword],
            reasoning: "none".to_string(),
        };
        assert!(plan.validate().is_err());

        let plan = SearchPlan {
            sub_queries: vec!["q".to_string()],
            sources: vec![SearchSource::Vector],
            reasoning: "one".to_string(),
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn confidence_is_clamped_at_decode() {
        let answer: ResearchAnswer = serde_json::from_value(serde_json::json!({
            "answer": "a",
            "answerType": "summary",
            "confidence": 1.7,
        }))
        .unwrap();
        assert_eq!(answer.confidence, 1.0);
    }

    #[test]
    fn absorb_docs_dedupes_first_occurrence_wins() {
        let mut state = ResearchState::new("q");
        state.absorb_docs([doc("1"), doc("2")]);
        state.absorb_docs([doc("2"), doc("3")]);
        let ids: Vec<&str> = state.retrieved_docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        // Re-running the same absorb is a no-op.
        state.absorb_docs([doc("1"), doc("2"), doc("3")]);
        assert_eq!(state.retrieved_docs.len(), 3);
    }

    #[test]
    fn answer_type_round_trips() {
        for (variant, wire) in [
            (AnswerType::Comparison, "\"comparison\""),
            (AnswerType::Explanation, "\"explanation\""),
            (AnswerType::Recommendation, "\"recommendation\""),
            (AnswerType::Summary, "\"summary\""),
        ] {
            assert_eq!(serde_json::to_string(&variant).unwrap(), wire);
            let parsed: AnswerType = serde_json::from_str(wire).unwrap();
            assert_eq!(parsed, variant);
        }
        assert!(serde_json::from_str::<AnswerType>("\"opinion\"").is_err());
    }
}
