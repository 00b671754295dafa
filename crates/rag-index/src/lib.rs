//! rag-index - Sparse and dense retrieval indexes
//!
//! This crate owns the corpus: a TF-IDF inverted index for lexical matching,
//! an exact nearest-neighbor index over document embeddings, and the
//! versioned snapshot discipline that lets queries read one consistent
//! corpus while writers publish the next.
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_index::CorpusIndex;
//! use std::sync::Arc;
//!
//! let corpus = CorpusIndex::new(Arc::new(embedder), config.sparse, config.embedding);
//! corpus.rebuild(documents).await?;
//!
//! let snapshot = corpus.snapshot()?;
//! let hits = snapshot.sparse().score(&query_tokens);
//! ```

mod corpus;
mod dense;
mod snapshot;
mod sparse;

pub use corpus::CorpusIndex;
pub use dense::DenseIndex;
pub use snapshot::CorpusSnapshot;
pub use sparse::SparseIndex;
