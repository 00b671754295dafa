//! rag-llm - Generation providers
//!
//! Implementations of [`Generator`] and the prompt that frames the retrieved
//! context for the model.
//!
//! # Providers
//!
//! - [`OllamaGenerator`]: calls a local Ollama server (`/api/generate`)
//! - [`ExtractiveGenerator`]: answers with the best retrieved passage, no network

mod extractive;
mod ollama;
pub mod prompt;

pub use extractive::ExtractiveGenerator;
pub use ollama::OllamaGenerator;
pub use prompt::{build_prompt, context_block, EMPTY_CONTEXT, NO_INFORMATION, STOP_SEQUENCES};

// Re-export the Generator trait for convenience
pub use rag_core::Generator;
