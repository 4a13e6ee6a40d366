// Trace id minting for LLM-call correlation.

use sha2::{Digest, Sha256};

/// Deterministic 32-char lowercase hex trace id for an entry-scoped
/// activity. The batch trace id keeps ids unique across batch runs.
pub fn entry_trace_id(entry_id: &str, batch_trace_id: Option<&str>) -> String {
    let input = format!("{entry_id}:{}", batch_trace_id.unwrap_or(""));
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..32].to_string()
}

/// Deterministic batch trace id derived from a workflow id.
pub fn batch_trace_id(workflow_id: &str) -> String {
    let digest = Sha256::digest(workflow_id.as_bytes());
    hex::encode(digest)[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_32_hex_chars() {
        let id = entry_trace_id("entry-1", None);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn trace_ids_are_deterministic() {
        assert_eq!(entry_trace_id("e1", Some("b1")), entry_trace_id("e1", Some("b1")));
        assert_ne!(entry_trace_id("e1", Some("b1")), entry_trace_id("e1", Some("b2")));
        assert_ne!(entry_trace_id("e1", None), entry_trace_id("e2", None));
    }

    #[test]
    fn missing_batch_id_matches_empty() {
        assert_eq!(entry_trace_id("e1", None), entry_trace_id("e1", Some("")));
    }
}
