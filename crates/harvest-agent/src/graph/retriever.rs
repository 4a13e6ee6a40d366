// Retriever node: fan out sub-queries across the selected sources,
// deduplicate by document id, first occurrence wins.

use futures::future::join_all;
use harvest_contracts::{ResearchState, RetrievedDoc, SearchMode, SearchSource};
use tracing::{error, info, warn};

use super::ResearchBackend;

const LIMIT_PER_QUERY: u32 = 5;
const VECTOR_THRESHOLD: f64 = 0.8;

/// Which sources to hit for this state. The planner mode defers to the
/// plan's own sources, falling back to keyword search.
fn determine_sources(state: &ResearchState) -> Vec<SearchSource> {
    match state.search_mode {
        SearchMode::Keyword => vec![SearchSource::Keyword],
        SearchMode::Vector => vec![SearchSource::Vector],
        SearchMode::Hybrid => vec![SearchSource::Keyword, SearchSource::Vector],
        SearchMode::Planner => match &state.plan {
            Some(plan) if !plan.sources.is_empty() => plan.sources.clone(),
            _ => vec![SearchSource::Keyword],
        },
    }
}

/// Partial failure is expected: failed searches are logged and the node
/// proceeds with whatever came back.
pub async fn retriever_node(
    mut state: ResearchState,
    backend: &dyn ResearchBackend,
) -> ResearchState {
    let Some(plan) = state.plan.clone() else {
        warn!(query = %state.query, "no plan, skipping retrieval");
        return state;
    };

    let sources = determine_sources(&state);
    info!(
        mode = ?state.search_mode,
        sources = ?sources,
        query_count = plan.sub_queries.len(),
        "starting retrieval"
    );

    // All sub-queries of all sources run concurrently; results are reduced
    // in task registration order so dedup stays deterministic.
    let mut tasks = Vec::new();
    for source in &sources {
        for query in &plan.sub_queries {
            let source = *source;
            let query = query.clone();
            tasks.push(async move {
                let result = match source {
                    SearchSource::Keyword => backend.search_keyword(&query, LIMIT_PER_QUERY).await,
                    SearchSource::Vector => {
                        backend
                            .search_vector(&query, LIMIT_PER_QUERY, VECTOR_THRESHOLD)
                            .await
                    }
                };
                (source, query, result)
            });
        }
    }

    let mut gathered: Vec<RetrievedDoc> = Vec::new();
    for (source, query, result) in join_all(tasks).await {
        match result {
            Ok(docs) => gathered.extend(docs),
            Err(err) => {
                error!(?source, query = %query, error = %err, "search failed");
            }
        }
    }

    state.absorb_docs(gathered);
    info!(doc_count = state.retrieved_docs.len(), "retrieval finished");
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use harvest_contracts::{ResearchAnswer, SearchPlan};

    fn doc(source: &str, id: &str) -> RetrievedDoc {
        RetrievedDoc {
            source: source.to_string(),
            id: id.to_string(),
            title: format!("doc {id}"),
            content: String::new(),
            url: None,
            relevance_score: None,
        }
    }

    struct CannedBackend {
        keyword: Vec<RetrievedDoc>,
        vector: Vec<RetrievedDoc>,
        fail_vector: bool,
    }

    #[async_trait]
    impl ResearchBackend for CannedBackend {
        async fn plan(&self, _state: &ResearchState) -> Result<SearchPlan> {
            unreachable!()
        }
        async fn search_keyword(&self, _q: &str, _l: u32) -> Result<Vec<RetrievedDoc>> {
            Ok(self.keyword.clone())
        }
        async fn search_vector(&self, _q: &str, _l: u32, _t: f64) -> Result<Vec<RetrievedDoc>> {
            if self.fail_vector {
                anyhow::bail!("vector backend down");
            }
            Ok(self.vector.clone())
        }
        async fn write(&self, _s: &ResearchState, _d: &str) -> Result<ResearchAnswer> {
            unreachable!()
        }
    }

    fn planned_state(mode: SearchMode, sources: Vec<SearchSource>) -> ResearchState {
        ResearchState {
            search_mode: mode,
            plan: Some(SearchPlan {
                sub_queries: vec!["a".to_string(), "b".to_string()],
                sources,
                reasoning: String::new(),
            }),
            ..ResearchState::new("q")
        }
    }

    #[test]
    fn mode_selects_sources() {
        let state = planned_state(SearchMode::Keyword, vec![SearchSource::Vector]);
        assert_eq!(determine_sources(&state), vec![SearchSource::Keyword]);

        let state = planned_state(SearchMode::Hybrid, vec![]);
        assert_eq!(
            determine_sources(&state),
            vec![SearchSource::Keyword, SearchSource::Vector]
        );

        let state = planned_state(SearchMode::Planner, vec![SearchSource::Vector]);
        assert_eq!(determine_sources(&state), vec![SearchSource::Vector]);

        // Planner mode with no plan sources falls back to keyword.
        let mut state = planned_state(SearchMode::Planner, vec![]);
        assert_eq!(determine_sources(&state), vec![SearchSource::Keyword]);
        state.plan = None;
        assert_eq!(determine_sources(&state), vec![SearchSource::Keyword]);
    }

    #[tokio::test]
    async fn dedup_across_sources_first_occurrence_wins() {
        // Keyword returns [1, 2]; vector returns [2, 3]. The union keeps
        // insertion order: [1, 2, 3].
        let backend = CannedBackend {
            keyword: vec![doc("keyword", "1"), doc("keyword", "2")],
            vector: vec![doc("vector", "2"), doc("vector", "3")],
            fail_vector: false,
        };
        let mut state = planned_state(SearchMode::Hybrid, vec![]);
        state.plan.as_mut().unwrap().sub_queries = vec!["a".to_string()];

        let state = retriever_node(state, &backend).await;
        let ids: Vec<&str> = state.retrieved_docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        // First occurrence decides the source tag.
        assert_eq!(state.retrieved_docs[1].source, "keyword");
    }

    #[tokio::test]
    async fn retrieval_is_idempotent_for_identical_queries() {
        let backend = CannedBackend {
            keyword: vec![doc("keyword", "1"), doc("keyword", "2")],
            vector: vec![],
            fail_vector: false,
        };
        let state = planned_state(SearchMode::Keyword, vec![]);
        let state = retriever_node(state, &backend).await;
        let first = state.retrieved_docs.clone();
        let state = retriever_node(state, &backend).await;
        assert_eq!(state.retrieved_docs, first);
    }

    #[tokio::test]
    async fn partial_failure_keeps_other_results() {
        let backend = CannedBackend {
            keyword: vec![doc("keyword", "1")],
            vector: vec![],
            fail_vector: true,
        };
        let state = planned_state(SearchMode::Hybrid, vec![]);
        let state = retriever_node(state, &backend).await;
        let ids: Vec<&str> = state.retrieved_docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn missing_plan_skips_retrieval() {
        let backend = CannedBackend {
            keyword: vec![doc("keyword", "1")],
            vector: vec![],
            fail_vector: false,
        };
        let state = retriever_node(ResearchState::new("q"), &backend).await;
        assert!(state.retrieved_docs.is_empty());
    }
}
