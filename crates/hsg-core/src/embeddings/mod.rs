//! Embedding pipeline.
//! `EmbeddingProvider` is a trait rather than a single struct because two
//! interchangeable backends exist, synthetic and semantic, selected per
//! [`crate::config::Tier`].

pub mod fusion;
pub mod semantic;
pub mod synthetic;

/// Failure embedding a batch of texts.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    #[error("embedding provider rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding retry budget exhausted: {0}")]
    RetriesExhausted(String),
}

/// A backend that turns text into vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable provider tag, surfaced in `EmbedLog::model` and as the
    /// `emb_kind` config echo.
    fn name(&self) -> &str;

    /// Output vector width this provider natively produces (callers resize
    /// to `vec_dim` themselves).
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts. Implementations that can only serve one
    /// in-flight request (e.g. [`semantic::SemanticHttpProvider`], which
    /// guards its HTTP call behind an internal mutex) serialize internally;
    /// callers still call this once per sector in parallel.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_batch(&[text])?.remove(0))
    }
}

pub use fusion::{fuse_mean_vec, fuse_smart_tier};
pub use semantic::SemanticHttpProvider;
pub use synthetic::SyntheticEmbedder;
