// Deterministic 768-dimensional text embeddings.
//
// The embedding model is a lazily-constructed process-wide singleton accessed
// through a single worker thread, so all embedding calls serialize on it.
// Vectors are produced by hashed-feature projection (word unigrams plus
// character trigrams, sha256-hashed into signed buckets, L2-normalized),
// which keeps the output deterministic across processes.

use std::sync::mpsc;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tracing::info;

pub const EMBEDDING_DIM: usize = 768;

#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("text for embedding is empty")]
    EmptyText,

    #[error("embedding worker unavailable")]
    WorkerGone,
}

struct Job {
    text: String,
    reply: oneshot::Sender<Vec<f32>>,
}

/// Handle to the embedding worker thread.
pub struct Embedder {
    tx: mpsc::Sender<Job>,
}

static EMBEDDER: OnceLock<Embedder> = OnceLock::new();

impl Embedder {
    /// The process-wide embedder, spawning its worker thread on first use.
    pub fn global() -> &'static Embedder {
        EMBEDDER.get_or_init(|| {
            let (tx, rx) = mpsc::channel::<Job>();
            std::thread::Builder::new()
                .name("embedder".to_string())
                .spawn(move || {
                    info!(dim = EMBEDDING_DIM, "embedding worker started");
                    while let Ok(job) = rx.recv() {
                        let vector = compute_embedding(&job.text);
                        let _ = job.reply.send(vector);
                    }
                })
                .expect("failed to spawn embedder thread");
            Embedder { tx }
        })
    }

    /// Embed one text. Calls are serialized on the worker thread.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if text.trim().is_empty() {
            return Err(EmbedderError::EmptyText);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Job {
                text: text.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| EmbedderError::WorkerGone)?;
        reply_rx.await.map_err(|_| EmbedderError::WorkerGone)
    }

    /// Embed a batch, preserving order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

fn compute_embedding(text: &str) -> Vec<f32> {
    let mut accum = vec![0.0f32; EMBEDDING_DIM];

    for token in tokenize(text) {
        bump(&mut accum, &token, 1.0);
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 3 {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                bump(&mut accum, &trigram, 0.5);
            }
        }
    }

    let norm: f32 = accum.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut accum {
            *value /= norm;
        }
    }
    accum
}

fn bump(accum: &mut [f32], feature: &str, weight: f32) {
    let digest = Sha256::digest(feature.as_bytes());
    let bucket = u64::from_le_bytes(digest[0..8].try_into().expect("digest is 32 bytes"));
    let index = (bucket % EMBEDDING_DIM as u64) as usize;
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    accum[index] += sign * weight;
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_768d_and_normalized() {
        let vector = compute_embedding("Rust makes systems programming approachable");
        assert_eq!(vector.len(), EMBEDDING_DIM);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn embeddings_are_deterministic() {
        let a = compute_embedding("same text");
        let b = compute_embedding("same text");
        assert_eq!(a, b);
    }

    #[test]
    fn different_texts_differ() {
        let a = compute_embedding("feeds and entries");
        let b = compute_embedding("knowledge graphs");
        assert_ne!(a, b);
    }

    #[test]
    fn case_and_punctuation_are_folded() {
        let a = compute_embedding("Hello, World!");
        let b = compute_embedding("hello world");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let err = Embedder::global().embed("   ").await.unwrap_err();
        assert!(matches!(err, EmbedderError::EmptyText));
    }

    #[tokio::test]
    async fn worker_serves_concurrent_callers() {
        let embedder = Embedder::global();
        let (a, b) = tokio::join!(embedder.embed("alpha"), embedder.embed("beta"));
        assert_eq!(a.unwrap().len(), EMBEDDING_DIM);
        assert_eq!(b.unwrap().len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let embedder = Embedder::global();
        let texts = vec!["one".to_string(), "two".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").await.unwrap());
        assert_eq!(batch[1], embedder.embed("two").await.unwrap());
    }
}
