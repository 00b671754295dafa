//! The shared, versioned corpus index.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use rag_core::{
    CorpusStats, DocId, EmbeddingConfig, Embedder, RagError, Result, SourceDocument, SparseConfig,
};

use crate::snapshot::CorpusSnapshot;

struct IndexState {
    current: Arc<CorpusSnapshot>,
    /// Set when a build produced diverging indexes.
    corruption: Option<String>,
}

/// Owner of the published corpus snapshot.
///
/// Readers call [`snapshot`](Self::snapshot) once per query and keep the
/// returned `Arc` for the whole query, so a concurrent rebuild never changes
/// what they see. Writers are serialized and publish by swapping the `Arc`.
pub struct CorpusIndex<E: ?Sized> {
    embedder: Arc<E>,
    sparse_config: SparseConfig,
    embedding_config: EmbeddingConfig,
    state: RwLock<IndexState>,
    writer: Mutex<()>,
}

impl<E> CorpusIndex<E>
where
    E: Embedder + ?Sized,
{
    /// Create an index publishing the empty version-0 snapshot.
    pub fn new(embedder: Arc<E>, sparse_config: SparseConfig, embedding_config: EmbeddingConfig) -> Self {
        Self {
            embedder,
            sparse_config,
            embedding_config,
            state: RwLock::new(IndexState {
                current: Arc::new(CorpusSnapshot::empty()),
                corruption: None,
            }),
            writer: Mutex::new(()),
        }
    }

    /// The currently published snapshot.
    ///
    /// Fails with `IndexCorruption` after a build produced inconsistent
    /// indexes, until a later build succeeds.
    pub fn snapshot(&self) -> Result<Arc<CorpusSnapshot>> {
        let state = self
            .state
            .read()
            .map_err(|_| RagError::internal("corpus state lock poisoned"))?;
        if let Some(reason) = &state.corruption {
            return Err(RagError::index_corruption(reason.clone()));
        }
        Ok(Arc::clone(&state.current))
    }

    /// Replace the whole corpus with `documents`.
    pub async fn rebuild(&self, documents: Vec<SourceDocument>) -> Result<CorpusStats> {
        let _guard = self.writer.lock().await;
        info!("Rebuilding corpus index with {} documents", documents.len());
        self.publish(documents).await
    }

    /// Add new documents or replace existing ones with the same id.
    pub async fn upsert(&self, documents: Vec<SourceDocument>) -> Result<CorpusStats> {
        let _guard = self.writer.lock().await;

        let mut merged: BTreeMap<DocId, SourceDocument> = self
            .base()?
            .sources()
            .into_iter()
            .map(|doc| (doc.id, doc))
            .collect();
        let count = documents.len();
        for doc in documents {
            merged.insert(doc.id, doc);
        }

        info!("Upserting {} documents", count);
        self.publish(merged.into_values().collect()).await
    }

    /// Remove documents by id. Every id must be present.
    pub async fn remove(&self, ids: &[DocId]) -> Result<CorpusStats> {
        let _guard = self.writer.lock().await;

        let base = self.base()?;
        if let Some(missing) = ids.iter().find(|id| base.document(**id).is_none()) {
            return Err(RagError::DocumentNotFound { id: missing.0 });
        }

        let remaining: Vec<SourceDocument> = base
            .sources()
            .into_iter()
            .filter(|doc| !ids.contains(&doc.id))
            .collect();

        info!("Removing {} documents", ids.len());
        self.publish(remaining).await
    }

    /// Statistics of the published snapshot.
    pub fn stats(&self) -> Result<CorpusStats> {
        Ok(self.snapshot()?.stats())
    }

    pub fn is_corrupt(&self) -> bool {
        self.state
            .read()
            .map(|state| state.corruption.is_some())
            .unwrap_or(true)
    }

    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    /// Snapshot incremental writes start from; readable even when corrupt.
    fn base(&self) -> Result<Arc<CorpusSnapshot>> {
        let state = self
            .state
            .read()
            .map_err(|_| RagError::internal("corpus state lock poisoned"))?;
        Ok(Arc::clone(&state.current))
    }

    /// Build, verify and swap in a new snapshot. Caller holds the writer lock.
    async fn publish(&self, documents: Vec<SourceDocument>) -> Result<CorpusStats> {
        let previous = self.base()?;
        let version = previous.version() + 1;

        let built = CorpusSnapshot::build(
            version,
            documents,
            Some(&previous),
            self.embedder.as_ref(),
            &self.sparse_config,
            self.embedding_config.batch_size,
        )
        .await
        .and_then(|snapshot| snapshot.verify().map(|_| snapshot));

        let mut state = self
            .state
            .write()
            .map_err(|_| RagError::internal("corpus state lock poisoned"))?;

        match built {
            Ok(snapshot) => {
                let stats = snapshot.stats();
                state.current = Arc::new(snapshot);
                state.corruption = None;
                info!(
                    "Published corpus snapshot v{} ({} documents, {} terms)",
                    stats.version, stats.documents, stats.vocabulary
                );
                Ok(stats)
            }
            Err(RagError::IndexCorruption { reason }) => {
                error!("Corpus index corrupt, queries blocked until rebuild: {}", reason);
                state.corruption = Some(reason.clone());
                Err(RagError::IndexCorruption { reason })
            }
            Err(e) => {
                warn!(
                    "Corpus build failed, keeping snapshot v{}: {}",
                    previous.version(),
                    e
                );
                Err(e)
            }
        }
    }
}
