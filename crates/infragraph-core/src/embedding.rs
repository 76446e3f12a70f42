//! Embedding provider trait, deterministic fallback, and the [`Embedder`]
//! strategy that the mapper and query engine call.
//!
//! Two paths exist:
//!
//! - **Remote**: an [`EmbeddingProvider`] (OpenAI, Ollama, …) supplied by
//!   the application crate. A failed or wrong-sized response falls through
//!   to the deterministic vector for that call only.
//! - **Deterministic**: [`fallback_embedding`], a model-free vector derived
//!   from the text's UTF-16 code units. Same text, same vector, every run.
//!
//! Which path is active is decided once, when the [`Embedder`] is built,
//! and is observable through [`Embedder::strategy`].

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

/// Vector dimension shared by every collection. Changing it requires
/// recreating the collections.
pub const EMBEDDING_DIMS: usize = 1536;

/// Trait for remote embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Embed one text. Errors are absorbed by [`Embedder`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Which path an [`Embedder`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Remote,
    Deterministic,
}

/// Text → fixed-length vector. Never fails.
pub struct Embedder {
    provider: Option<Box<dyn EmbeddingProvider>>,
    dims: usize,
}

impl Embedder {
    /// An embedder that only uses [`fallback_embedding`].
    pub fn deterministic() -> Self {
        Self {
            provider: None,
            dims: EMBEDDING_DIMS,
        }
    }

    /// An embedder that calls `provider` first.
    pub fn remote(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            provider: Some(provider),
            dims: EMBEDDING_DIMS,
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self.provider {
            Some(_) => Strategy::Remote,
            None => Strategy::Deterministic,
        }
    }

    /// Model name of the remote provider, or `"deterministic"`.
    pub fn model_name(&self) -> &str {
        match &self.provider {
            Some(p) => p.model_name(),
            None => "deterministic",
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let Some(provider) = &self.provider else {
            return fallback_embedding(text, self.dims);
        };
        match provider.embed(text).await {
            Ok(v) if v.len() == self.dims => v,
            Ok(v) => {
                warn!(
                    model = provider.model_name(),
                    got = v.len(),
                    expected = self.dims,
                    "embedding has wrong dimension, using deterministic fallback"
                );
                fallback_embedding(text, self.dims)
            }
            Err(e) => {
                warn!(model = provider.model_name(), error = %e, "embedding failed, using deterministic fallback");
                fallback_embedding(text, self.dims)
            }
        }
    }
}

/// Model-free pseudo-embedding.
///
/// For UTF-16 code unit `c` at position `i`, adds `sin(c + i) * 0.1` to
/// bucket `(c * i) mod dims`, then L2-normalizes. The empty string yields
/// the all-zero vector.
///
/// This gives near-identical strings nearby vectors. It carries no
/// semantics.
pub fn fallback_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut acc = vec![0.0f64; dims];
    if dims == 0 {
        return Vec::new();
    }
    for (i, c) in text.encode_utf16().enumerate() {
        let c = c as u64;
        let i = i as u64;
        let bucket = (c.wrapping_mul(i) % dims as u64) as usize;
        acc[bucket] += ((c + i) as f64).sin() * 0.1;
    }
    let magnitude = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
    let divisor = if magnitude > 0.0 { magnitude } else { 1.0 };
    acc.into_iter().map(|x| (x / divisor) as f32).collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
