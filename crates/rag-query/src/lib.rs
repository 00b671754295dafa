//! rag-query - Ranking and answering engine
//!
//! This crate turns a query into a ranked candidate list and, optionally, a
//! generated answer:
//!
//! - Weighted fusion of min-max normalized sparse and dense scores
//! - Budgeted, deduplicated context assembly
//! - Generation dispatch with bounded exponential-backoff retries and a
//!   fallback answer when the generator stays unavailable
//! - Graceful degradation to sparse-only retrieval when the dense path is
//!   down or slow
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::RagEngine;
//! use rag_core::{CancelToken, QueryParams};
//!
//! let engine = RagEngine::new(corpus, Arc::new(generator), config);
//! let answer = engine
//!     .answer("How do refunds work?", QueryParams::default(), &CancelToken::new())
//!     .await?;
//! if !answer.fully_informed() {
//!     eprintln!("answer built from partial evidence");
//! }
//! ```

mod context;
mod dispatch;
mod engine;
mod fusion;

pub use context::{assemble, jaccard};
pub use dispatch::{Dispatched, Dispatcher, RetryPolicy, UNAVAILABLE_ANSWER};
pub use engine::{Explanation, RagEngine};
pub use fusion::{effective_alpha, fuse, rank_order};

// Re-export for convenience
pub use rag_core::{Answer, Retrieval, ScoredCandidate};
