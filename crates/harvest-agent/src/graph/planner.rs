// Planner node: turn the query (and entry context) into a search plan.

use anyhow::Result;
use harvest_contracts::ResearchState;
use tracing::info;

use super::ResearchBackend;

pub async fn planner_node(
    mut state: ResearchState,
    backend: &dyn ResearchBackend,
) -> Result<ResearchState> {
    info!(
        query = %truncate(&state.query, 50),
        iteration = state.iteration,
        "planning retrieval"
    );

    let plan = backend.plan(&state).await?;
    plan.validate().map_err(anyhow::Error::msg)?;

    info!(
        query_count = plan.sub_queries.len(),
        sources = ?plan.sources,
        "created search plan"
    );

    state.plan = Some(plan);
    state.iteration += 1;
    Ok(state)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harvest_contracts::{ResearchAnswer, RetrievedDoc, SearchPlan, SearchSource};

    struct FixedPlan(SearchPlan);

    #[async_trait]
    impl ResearchBackend for FixedPlan {
        async fn plan(&self, _state: &ResearchState) -> Result<SearchPlan> {
            Ok(self.0.clone())
        }
        async fn search_keyword(&self, _q: &str, _l: u32) -> Result<Vec<RetrievedDoc>> {
            Ok(vec![])
        }
        async fn search_vector(&self, _q: &str, _l: u32, _t: f64) -> Result<Vec<RetrievedDoc>> {
            Ok(vec![])
        }
        async fn write(&self, _s: &ResearchState, _d: &str) -> Result<ResearchAnswer> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn planner_sets_plan_and_bumps_iteration() {
        let backend = FixedPlan(SearchPlan {
            sub_queries: vec!["a".to_string(), "b".to_string()],
            sources: vec![SearchSource::Keyword],
            reasoning: "split".to_string(),
        });
        let state = planner_node(ResearchState::new("query"), &backend)
            .await
            .unwrap();
        assert_eq!(state.iteration, 1);
        assert_eq!(state.plan.unwrap().sub_queries.len(), 2);
    }

    #[tokio::test]
    async fn empty_plans_are_rejected() {
        let backend = FixedPlan(SearchPlan {
            sub_queries: vec![],
            sources: vec![SearchSource::Keyword],
            reasoning: String::new(),
        });
        assert!(planner_node(ResearchState::new("query"), &backend)
            .await
            .is_err());
    }
}
