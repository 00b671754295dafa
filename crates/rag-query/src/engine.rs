//! Query engine for hybrid retrieval and answering.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rag_core::{
    Answer, CancelToken, Degradation, DocId, Embedder, Generator, MatchType, Query, QueryParams,
    RagConfig, RagError, Result, Retrieval, ScoredCandidate, TermExplanation,
};
use rag_index::{CorpusIndex, CorpusSnapshot};
use rag_text::normalize;

use crate::context::assemble;
use crate::dispatch::{Dispatcher, RetryPolicy};
use crate::fusion::{effective_alpha, fuse};

/// Terms listed per side in explanations.
const EXPLAIN_TERMS: usize = 5;

/// Why a query ranked the way it did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub query: String,
    pub total_results: usize,
    pub keyword_only: usize,
    pub semantic_only: usize,
    pub both: usize,
    pub top_result: Option<ScoredCandidate>,

    /// Heaviest query terms by TF-IDF weight.
    pub important_terms: Vec<(String, f32)>,

    /// Sparse weight actually applied.
    pub alpha: f32,
    pub degradation: Option<Degradation>,

    /// Lexical overlap with one document, when requested.
    pub document: Option<TermExplanation>,
}

/// Hybrid retrieval-augmented query engine.
///
/// Each query pins one corpus snapshot, runs the sparse and dense paths
/// concurrently (the dense path bounded by `search.dense_timeout_ms`), fuses
/// the two rankings and, for [`answer`](Self::answer), assembles a context
/// window and dispatches it to the generator.
pub struct RagEngine<E: ?Sized, G: ?Sized> {
    corpus: Arc<CorpusIndex<E>>,
    dispatcher: Dispatcher<G>,
    config: RagConfig,
}

impl<E, G> RagEngine<E, G>
where
    E: Embedder + ?Sized,
    G: Generator + ?Sized,
{
    /// Create an engine over a shared corpus. Query embeddings come from the
    /// corpus's embedder so both sides share one vector space.
    pub fn new(corpus: Arc<CorpusIndex<E>>, generator: Arc<G>, config: RagConfig) -> Self {
        let dispatcher = Dispatcher::new(generator, RetryPolicy::from_config(&config.generation));
        Self {
            corpus,
            dispatcher,
            config,
        }
    }

    /// Answer from `fallback` when the generator stays unavailable after
    /// every retry. Without one the answer is a fixed apology.
    pub fn with_fallback(mut self, fallback: Arc<dyn Generator>) -> Self {
        self.dispatcher = self.dispatcher.with_fallback(fallback);
        self
    }

    pub fn corpus(&self) -> &Arc<CorpusIndex<E>> {
        &self.corpus
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Retrieve and rank candidates for `query`.
    ///
    /// A query with no match anywhere returns an empty candidate list.
    pub async fn retrieve(
        &self,
        query: &str,
        params: QueryParams,
        cancel: &CancelToken,
    ) -> Result<Retrieval> {
        cancel.check()?;
        let snapshot = self.corpus.snapshot()?;
        self.retrieve_from(&snapshot, query, params, cancel).await
    }

    /// Retrieve, assemble context and generate an answer.
    pub async fn answer(
        &self,
        query: &str,
        params: QueryParams,
        cancel: &CancelToken,
    ) -> Result<Answer> {
        let start = Instant::now();
        cancel.check()?;

        let snapshot = self.corpus.snapshot()?;
        let budget = self.config.context.budget(params.budget);
        let retrieval = self.retrieve_from(&snapshot, query, params, cancel).await?;

        let window = assemble(
            &retrieval.candidates,
            |id| snapshot.document(id),
            budget,
            self.config.context.dedup_threshold,
        );
        debug!(
            "Context window holds {} excerpts ({} of {} used)",
            window.len(),
            window.used(),
            budget.limit
        );
        if window.is_empty() {
            warn!("No retrieved context for query, answer is low-confidence");
        }

        let dispatched = self.dispatcher.dispatch(query, &window, cancel).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Answered in {}ms from {} excerpts (snapshot v{})",
            latency_ms,
            window.len(),
            snapshot.version()
        );

        Ok(Answer {
            text: dispatched.text,
            evidence: window.doc_ids(),
            degradation: retrieval.degradation,
            low_confidence: window.is_empty(),
            fallback: dispatched.fallback,
            snapshot_version: snapshot.version(),
            latency_ms,
        })
    }

    /// Explain how `query` was ranked under `params`, optionally against one
    /// document.
    pub async fn explain(
        &self,
        query: &str,
        params: QueryParams,
        doc_id: Option<DocId>,
        cancel: &CancelToken,
    ) -> Result<Explanation> {
        cancel.check()?;
        let snapshot = self.corpus.snapshot()?;
        let (_, alpha) = self.resolve(&params)?;
        let retrieval = self.retrieve_from(&snapshot, query, params, cancel).await?;

        let count = |kind: MatchType| {
            retrieval
                .candidates
                .iter()
                .filter(|c| c.match_type == kind)
                .count()
        };

        let document = match doc_id {
            Some(id) => Some(snapshot.sparse().explain(
                &retrieval.query.tokens,
                id,
                EXPLAIN_TERMS,
            )?),
            None => None,
        };

        Ok(Explanation {
            query: query.to_string(),
            total_results: retrieval.candidates.len(),
            keyword_only: count(MatchType::Sparse),
            semantic_only: count(MatchType::Dense),
            both: count(MatchType::Both),
            top_result: retrieval.candidates.first().cloned(),
            important_terms: snapshot
                .sparse()
                .important_terms(&retrieval.query.tokens, EXPLAIN_TERMS),
            alpha: effective_alpha(retrieval.sparse_hits, retrieval.dense_hits, alpha),
            degradation: retrieval.degradation,
            document,
        })
    }

    async fn retrieve_from(
        &self,
        snapshot: &CorpusSnapshot,
        text: &str,
        params: QueryParams,
        cancel: &CancelToken,
    ) -> Result<Retrieval> {
        let (top_k, alpha) = self.resolve(&params)?;
        let query = Query::new(text, normalize(text)).with_params(params);
        let fetch_k = top_k
            .saturating_mul(self.config.search.fetch_multiplier)
            .max(self.config.search.min_fetch);

        debug!("Searching for {:?} ({} tokens)", query.text, query.tokens.len());

        let timeout = self.config.search.dense_timeout();
        let (sparse, dense) = cancel
            .run(async {
                let sparse = async {
                    let mut hits = snapshot.sparse().score(&query.tokens);
                    hits.truncate(fetch_k);
                    hits
                };
                let dense = tokio::time::timeout(timeout, self.dense_search(snapshot, text, fetch_k));
                Ok(tokio::join!(sparse, dense))
            })
            .await?;

        let (dense, degradation) = match dense {
            Ok(Ok(hits)) => (hits, None),
            Ok(Err(RagError::ProviderUnavailable { provider, reason })) => {
                warn!("Dense path unavailable ({}), continuing sparse-only: {}", provider, reason);
                (
                    Vec::new(),
                    Some(Degradation::DenseUnavailable {
                        reason: format!("{}: {}", provider, reason),
                    }),
                )
            }
            Ok(Err(e)) => {
                warn!("Dense path failed, continuing sparse-only: {}", e);
                (
                    Vec::new(),
                    Some(Degradation::DenseFailed {
                        reason: e.to_string(),
                    }),
                )
            }
            Err(_) => {
                warn!(
                    "Dense path exceeded {}ms, continuing sparse-only",
                    timeout.as_millis()
                );
                (
                    Vec::new(),
                    Some(Degradation::DenseTimedOut {
                        timeout_ms: self.config.search.dense_timeout_ms,
                    }),
                )
            }
        };

        debug!(
            "Sparse path returned {} results, dense path returned {} results",
            sparse.len(),
            dense.len()
        );

        let mut candidates = fuse(&sparse, &dense, alpha);
        candidates.truncate(top_k);

        Ok(Retrieval {
            query,
            candidates,
            sparse_hits: sparse.len(),
            dense_hits: dense.len(),
            degradation,
            snapshot_version: snapshot.version(),
        })
    }

    async fn dense_search(
        &self,
        snapshot: &CorpusSnapshot,
        text: &str,
        k: usize,
    ) -> Result<Vec<(DocId, f32)>> {
        if snapshot.dense().is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.corpus.embedder().embed_query(text).await?;
        snapshot.dense().nearest(&embedding, k)
    }

    /// Apply config defaults to the per-query parameters and validate them.
    fn resolve(&self, params: &QueryParams) -> Result<(usize, f32)> {
        let search = &self.config.search;

        let top_k = params.top_k.unwrap_or(search.default_top_k);
        if top_k == 0 || top_k > search.max_top_k {
            return Err(RagError::invalid_argument(format!(
                "top_k must be between 1 and {}, got {}",
                search.max_top_k, top_k
            )));
        }

        let alpha = params.alpha.unwrap_or(search.alpha);
        if !(0.0..=1.0).contains(&alpha) {
            return Err(RagError::invalid_argument(format!(
                "alpha must be in [0, 1], got {}",
                alpha
            )));
        }

        Ok((top_k, alpha))
    }
}
