//! Research graph behavior: bounded iteration, event emission, dedup across
//! rounds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use harvest_agent::graph::{run_research, GraphEvent, ResearchBackend, MAX_ITERATIONS};
use harvest_contracts::{
    AnswerType, ResearchAnswer, ResearchState, RetrievedDoc, SearchPlan, SearchSource,
};

fn doc(id: &str) -> RetrievedDoc {
    RetrievedDoc {
        source: "keyword".to_string(),
        id: id.to_string(),
        title: format!("doc {id}"),
        content: format!("content of {id}"),
        url: None,
        relevance_score: None,
    }
}

struct GreedyBackend {
    planner_calls: Arc<AtomicU32>,
    writer_calls: Arc<AtomicU32>,
    always_needs_more: bool,
}

#[async_trait]
impl ResearchBackend for GreedyBackend {
    async fn plan(&self, state: &ResearchState) -> Result<SearchPlan> {
        let round = self.planner_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchPlan {
            sub_queries: vec![format!("{} round {round}", state.query)],
            sources: vec![SearchSource::Keyword],
            reasoning: "test plan".to_string(),
        })
    }

    async fn search_keyword(&self, query: &str, _limit: u32) -> Result<Vec<RetrievedDoc>> {
        // Every round returns one fresh doc plus a repeat of doc 0.
        let round = query.rsplit(' ').next().unwrap_or("0");
        Ok(vec![doc("0"), doc(round)])
    }

    async fn search_vector(&self, _q: &str, _l: u32, _t: f64) -> Result<Vec<RetrievedDoc>> {
        Ok(vec![])
    }

    async fn write(&self, state: &ResearchState, formatted: &str) -> Result<ResearchAnswer> {
        let call = self.writer_calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(formatted.contains("[1]"));
        Ok(ResearchAnswer {
            answer: format!("answer after iteration {} (writer call {call})", state.iteration),
            answer_type: AnswerType::Explanation,
            sources: vec![],
            confidence: 0.5,
            needs_more_info: self.always_needs_more,
            follow_ups: vec![],
        })
    }
}

#[tokio::test]
async fn terminates_after_exactly_three_planner_passes() {
    let planner_calls = Arc::new(AtomicU32::new(0));
    let writer_calls = Arc::new(AtomicU32::new(0));
    let backend = GreedyBackend {
        planner_calls: planner_calls.clone(),
        writer_calls: writer_calls.clone(),
        always_needs_more: true,
    };

    let state = run_research(ResearchState::new("cap test"), &backend, |_| {})
        .await
        .unwrap();

    // The writer always asks for more, so only the iteration cap stops it.
    assert_eq!(planner_calls.load(Ordering::SeqCst), MAX_ITERATIONS);
    assert_eq!(writer_calls.load(Ordering::SeqCst), MAX_ITERATIONS);
    assert_eq!(state.iteration, MAX_ITERATIONS);
    // The final answer is the last writer's output.
    assert!(state.final_answer.contains("writer call 3"));
}

#[tokio::test]
async fn stops_early_when_no_more_info_is_needed() {
    let planner_calls = Arc::new(AtomicU32::new(0));
    let backend = GreedyBackend {
        planner_calls: planner_calls.clone(),
        writer_calls: Arc::new(AtomicU32::new(0)),
        always_needs_more: false,
    };

    let state = run_research(ResearchState::new("single pass"), &backend, |_| {})
        .await
        .unwrap();
    assert_eq!(planner_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.iteration, 1);
    assert!(!state.final_answer.is_empty());
}

#[tokio::test]
async fn docs_accumulate_without_duplicates_across_rounds() {
    let backend = GreedyBackend {
        planner_calls: Arc::new(AtomicU32::new(0)),
        writer_calls: Arc::new(AtomicU32::new(0)),
        always_needs_more: true,
    };

    let state = run_research(ResearchState::new("dedup"), &backend, |_| {})
        .await
        .unwrap();
    // Rounds return {0,0}, {0,1}, {0,2}; the union is {0,1,2} in first-seen
    // order.
    let ids: Vec<&str> = state.retrieved_docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
}

#[tokio::test]
async fn emits_plan_and_retrieval_events_per_round() {
    let backend = GreedyBackend {
        planner_calls: Arc::new(AtomicU32::new(0)),
        writer_calls: Arc::new(AtomicU32::new(0)),
        always_needs_more: false,
    };

    let mut events = Vec::new();
    run_research(ResearchState::new("events"), &backend, |event| {
        events.push(event);
    })
    .await
    .unwrap();

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], GraphEvent::PlanReady { sub_queries: 1, .. }));
    // Round 0 returns doc 0 twice; the dedup'd set holds one document.
    assert!(matches!(events[1], GraphEvent::Retrieved { total_docs: 1 }));
}
