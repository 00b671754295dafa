//! rag-embed - Embedding providers
//!
//! Implementations of [`Embedder`] used by the corpus index and the query
//! engine.
//!
//! # Providers
//!
//! - [`OllamaEmbedder`]: calls a local Ollama server (`/api/embeddings`)
//! - [`HashingEmbedder`]: deterministic signed feature hashing, no network
//!
//! [`OllamaClient`] is the shared HTTP client, also used by the generation
//! providers.

mod hashing;
mod ollama;

pub use hashing::HashingEmbedder;
pub use ollama::{OllamaClient, OllamaEmbedder};

// Re-export the Embedder trait for convenience
pub use rag_core::Embedder;
