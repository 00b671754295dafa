//! rag-text - Text normalization and knowledge base parsing
//!
//! This crate turns raw text into the normalized token sequences both
//! retrieval paths and the context deduplicator work on, and parses the
//! `Q: ... A: ...` knowledge base format into source documents.
//!
//! # Normalization
//!
//! - Lowercasing
//! - Punctuation stripping (e-mail addresses and URLs are kept whole)
//! - A fixed English stopword list
//! - A light suffix-stripping stemmer
//!
//! # Example
//!
//! ```rust
//! use rag_text::normalize;
//!
//! let tokens = normalize("What mammals exist?");
//! assert_eq!(tokens, vec!["mammal", "exist"]);
//! ```

mod kb;
mod normalize;
mod stem;

pub use kb::{load_knowledge_base, parse_knowledge_base, KnowledgeBaseStats, QaPair};
pub use normalize::{is_stopword, normalize, STOPWORDS};
pub use stem::stem;
