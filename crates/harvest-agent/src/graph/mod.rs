// The Deep Research state machine: a bounded planner → retriever → writer
// loop over [`ResearchState`].
//
// Nodes are pure over state and reach I/O only through [`ResearchBackend`],
// so the whole machine runs against fakes in tests.

pub mod planner;
pub mod retriever;
pub mod writer;

use anyhow::Result;
use async_trait::async_trait;
use harvest_contracts::{ResearchAnswer, ResearchState, RetrievedDoc, SearchPlan, SearchSource};
use tracing::info;

pub use planner::planner_node;
pub use retriever::retriever_node;
pub use writer::writer_node;

/// Hard cap on planner passes, regardless of `needs_more_info`.
pub const MAX_ITERATIONS: u32 = 3;

/// I/O surface the nodes run against.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Plan the next retrieval round (LLM structured output).
    async fn plan(&self, state: &ResearchState) -> Result<SearchPlan>;

    async fn search_keyword(&self, query: &str, limit: u32) -> Result<Vec<RetrievedDoc>>;

    async fn search_vector(
        &self,
        query: &str,
        limit: u32,
        threshold: f64,
    ) -> Result<Vec<RetrievedDoc>>;

    /// Synthesize the answer from the retrieved documents (LLM structured
    /// output, temperature 0.3).
    async fn write(&self, state: &ResearchState, formatted_docs: &str) -> Result<ResearchAnswer>;
}

/// Advisory progress events, surfaced to the client as CUSTOM wire events.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    PlanReady {
        sub_queries: usize,
        sources: Vec<SearchSource>,
        reasoning: String,
    },
    Retrieved {
        total_docs: usize,
    },
}

/// The decision edge after the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    End,
}

pub fn should_continue(state: &ResearchState) -> Decision {
    if !state.needs_more_info {
        info!(iteration = state.iteration, "research complete: sufficient information");
        return Decision::End;
    }
    if state.iteration >= MAX_ITERATIONS {
        info!(
            iteration = state.iteration,
            max_iterations = MAX_ITERATIONS,
            "research complete: max iterations reached"
        );
        return Decision::End;
    }
    info!(iteration = state.iteration, "continuing research");
    Decision::Continue
}

/// Drive the graph to termination. Planner and writer failures abort the
/// run; retrieval failures never do.
pub async fn run_research(
    mut state: ResearchState,
    backend: &dyn ResearchBackend,
    mut on_event: impl FnMut(GraphEvent),
) -> Result<ResearchState> {
    loop {
        state = planner_node(state, backend).await?;
        if let Some(plan) = &state.plan {
            on_event(GraphEvent::PlanReady {
                sub_queries: plan.sub_queries.len(),
                sources: plan.sources.clone(),
                reasoning: plan.reasoning.clone(),
            });
        }

        state = retriever_node(state, backend).await;
        on_event(GraphEvent::Retrieved {
            total_docs: state.retrieved_docs.len(),
        });

        state = writer_node(state, backend).await?;

        match should_continue(&state) {
            Decision::Continue => continue,
            Decision::End => break,
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(iteration: u32, needs_more_info: bool) -> ResearchState {
        ResearchState {
            iteration,
            needs_more_info,
            ..ResearchState::new("q")
        }
    }

    #[test]
    fn ends_when_information_is_sufficient() {
        assert_eq!(should_continue(&state_with(1, false)), Decision::End);
    }

    #[test]
    fn continues_under_the_cap() {
        assert_eq!(should_continue(&state_with(1, true)), Decision::Continue);
        assert_eq!(should_continue(&state_with(2, true)), Decision::Continue);
    }

    #[test]
    fn ends_at_max_iterations_even_if_more_is_wanted() {
        assert_eq!(should_continue(&state_with(3, true)), Decision::End);
    }
}
