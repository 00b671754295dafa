//! rag-core - Core types and traits for the RAG engine
//!
//! This crate provides the foundational types, provider traits, error
//! taxonomy and configuration shared by every stage of the retrieval and
//! generation pipeline.

pub mod cancel;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use cancel::CancelToken;
pub use config::*;
pub use error::{RagError, Result};
pub use traits::*;
pub use types::*;
