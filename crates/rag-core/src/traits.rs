//! Capability interfaces for the external providers.
//!
//! Both providers are black boxes injected at construction time. Callers
//! bound them with timeouts and race them against a
//! [`CancelToken`](crate::CancelToken); implementations only need to report
//! failures with the right error variant.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ContextWindow;

/// Embedding model trait.
///
/// Unreachable or flaky backends must fail with
/// [`RagError::ProviderUnavailable`](crate::RagError::ProviderUnavailable) so
/// the query can degrade to sparse-only retrieval.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts, one vector per text, in order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Provider name for logs and errors.
    fn name(&self) -> &str;
}

/// Generative model trait.
///
/// Transient failures (timeouts, connection errors, overloaded backend) map
/// to `ProviderUnavailable` and are retried by the dispatcher. A backend
/// that refuses the input maps to `GenerationRejected`, which is never
/// retried.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer to `query` conditioned on `context`.
    async fn generate(&self, query: &str, context: &ContextWindow) -> Result<String>;

    /// Provider name for logs and errors.
    fn name(&self) -> &str;
}
