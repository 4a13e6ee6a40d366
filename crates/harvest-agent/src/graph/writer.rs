// Writer node: synthesize the structured answer from retrieved documents.

use anyhow::Result;
use harvest_contracts::{ResearchState, RetrievedDoc};
use tracing::info;

use super::ResearchBackend;

const CONTENT_EXCERPT_CHARS: usize = 500;

/// Numbered document list for the writer prompt, content truncated.
pub fn format_retrieved_docs(docs: &[RetrievedDoc]) -> String {
    if docs.is_empty() {
        return "No documents retrieved.".to_string();
    }
    let mut parts = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        parts.push(format!("[{}] {}", i + 1, doc.title));
        if !doc.content.is_empty() {
            let excerpt: String = doc.content.chars().take(CONTENT_EXCERPT_CHARS).collect();
            let ellipsis = if doc.content.chars().count() > CONTENT_EXCERPT_CHARS {
                "..."
            } else {
                ""
            };
            parts.push(format!("    {excerpt}{ellipsis}"));
        }
        parts.push(String::new());
    }
    parts.join("\n")
}

pub async fn writer_node(
    mut state: ResearchState,
    backend: &dyn ResearchBackend,
) -> Result<ResearchState> {
    info!(
        doc_count = state.retrieved_docs.len(),
        iteration = state.iteration,
        "generating answer"
    );

    let formatted = format_retrieved_docs(&state.retrieved_docs);
    let answer = backend.write(&state, &formatted).await?;

    info!(
        answer_type = ?answer.answer_type,
        confidence = answer.confidence,
        needs_more_info = answer.needs_more_info,
        "generated answer"
    );

    state.final_answer = answer.answer.clone();
    state.needs_more_info = answer.needs_more_info;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str) -> RetrievedDoc {
        RetrievedDoc {
            source: "keyword".to_string(),
            id: id.to_string(),
            title: format!("Title {id}"),
            content: content.to_string(),
            url: None,
            relevance_score: None,
        }
    }

    #[test]
    fn empty_docs_have_a_placeholder() {
        assert_eq!(format_retrieved_docs(&[]), "No documents retrieved.");
    }

    #[test]
    fn docs_are_numbered_and_truncated() {
        let long = "x".repeat(600);
        let formatted = format_retrieved_docs(&[doc("1", "short"), doc("2", &long)]);
        assert!(formatted.contains("[1] Title 1"));
        assert!(formatted.contains("    short"));
        assert!(formatted.contains("[2] Title 2"));
        assert!(formatted.contains(&format!("    {}...", "x".repeat(500))));
        assert!(!formatted.contains(&"x".repeat(501)));
    }
}
