//! Immutable, versioned corpus snapshots.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use rag_core::{
    CorpusStats, DocId, Document, Embedder, RagError, Result, SourceDocument, SparseConfig,
};
use rag_text::normalize;

use crate::dense::DenseIndex;
use crate::sparse::SparseIndex;

/// One consistent version of the corpus: documents plus both indexes.
///
/// Never mutated after construction. Writers build a new snapshot and
/// publish it; readers keep whichever snapshot they started with.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    version: u64,
    documents: BTreeMap<DocId, Document>,
    sparse: SparseIndex,
    dense: DenseIndex,
}

impl CorpusSnapshot {
    /// The version-0 snapshot published before the first build.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index `sources` into a new snapshot.
    ///
    /// Documents whose text is unchanged since `previous` keep their
    /// embedding; the rest are embedded in batches of `batch_size`.
    pub async fn build<E>(
        version: u64,
        sources: Vec<SourceDocument>,
        previous: Option<&CorpusSnapshot>,
        embedder: &E,
        sparse_config: &SparseConfig,
        batch_size: usize,
    ) -> Result<Self>
    where
        E: Embedder + ?Sized,
    {
        let mut seen = HashSet::with_capacity(sources.len());
        for source in &sources {
            if !seen.insert(source.id) {
                return Err(RagError::invalid_argument(format!(
                    "duplicate document id {}",
                    source.id
                )));
            }
        }

        let mut documents: BTreeMap<DocId, Document> = BTreeMap::new();
        let mut pending: Vec<DocId> = Vec::new();

        for source in sources {
            let content_hash = source.content_hash();
            let reused = previous
                .and_then(|snapshot| snapshot.document(source.id))
                .filter(|doc| {
                    doc.content_hash == content_hash && doc.embedding.len() == embedder.dimension()
                })
                .map(|doc| doc.embedding.clone());

            if reused.is_none() {
                pending.push(source.id);
            }

            let tokens = normalize(&source.text);
            documents.insert(
                source.id,
                Document {
                    id: source.id,
                    text: source.text,
                    tokens,
                    content_hash,
                    sparse: Default::default(),
                    embedding: reused.unwrap_or_default(),
                    metadata: source.metadata,
                },
            );
        }

        debug!(
            "Embedding {} of {} documents with {} ({} reused)",
            pending.len(),
            documents.len(),
            embedder.name(),
            documents.len() - pending.len()
        );

        for batch in pending.chunks(batch_size.max(1)) {
            let texts: Vec<&str> = batch
                .iter()
                .filter_map(|id| documents.get(id).map(|d| d.text.as_str()))
                .collect();
            let vectors = embedder.embed_documents(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::index_corruption(format!(
                    "{} returned {} embeddings for {} documents",
                    embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            for (id, vector) in batch.iter().zip(vectors) {
                if let Some(doc) = documents.get_mut(id) {
                    doc.embedding = vector;
                }
            }
        }

        let sparse = SparseIndex::build(
            documents.values().map(|d| (d.id, d.tokens.as_slice())),
            sparse_config,
        );
        let dense = DenseIndex::build(documents.values().map(|d| (d.id, d.embedding.clone())))?;

        for doc in documents.values_mut() {
            if let Some(vector) = sparse.doc_vector(doc.id) {
                doc.sparse = vector.clone();
            }
        }

        Ok(Self {
            version,
            documents,
            sparse,
            dense,
        })
    }

    /// Check that the sparse and dense indexes cover exactly the same
    /// documents with consistently sized embeddings.
    pub fn verify(&self) -> Result<()> {
        let (docs, sparse, dense) = (self.documents.len(), self.sparse.len(), self.dense.len());
        if docs != sparse || docs != dense {
            return Err(RagError::index_corruption(format!(
                "snapshot {} holds {} documents, {} sparse and {} dense entries",
                self.version, docs, sparse, dense
            )));
        }

        for id in self.documents.keys() {
            if !self.sparse.contains(*id) || !self.dense.contains(*id) {
                return Err(RagError::index_corruption(format!(
                    "document {} is missing from an index in snapshot {}",
                    id, self.version
                )));
            }
        }

        if let Some(dimension) = self.dense.dimension() {
            if let Some(doc) = self.documents.values().find(|d| d.embedding.len() != dimension) {
                return Err(RagError::index_corruption(format!(
                    "document {} has a {}-dimensional embedding, index expects {}",
                    doc.id,
                    doc.embedding.len(),
                    dimension
                )));
            }
        }

        Ok(())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn sparse(&self) -> &SparseIndex {
        &self.sparse
    }

    pub fn dense(&self) -> &DenseIndex {
        &self.dense
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// Documents in ascending id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            version: self.version,
            documents: self.documents.len(),
            vocabulary: self.sparse.vocabulary_size(),
            dimension: self.dense.dimension(),
        }
    }

    /// Raw sources of the current documents, for rebuilding a new version.
    pub(crate) fn sources(&self) -> Vec<SourceDocument> {
        self.documents
            .values()
            .map(|doc| SourceDocument {
                id: doc.id,
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn with_dense(mut self, dense: DenseIndex) -> Self {
        self.dense = dense;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_embed::HashingEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how many texts it was asked to embed.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        embedded: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashingEmbedder::new(64),
                embedded: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_documents(texts).await
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed_query(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn sources(texts: &[&str]) -> Vec<SourceDocument> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SourceDocument::new(DocId(i as u64), *t))
            .collect()
    }

    fn mammals() -> Vec<SourceDocument> {
        sources(&["cats are mammals", "dogs are mammals", "python is a language"])
    }

    #[tokio::test]
    async fn test_build_indexes_every_document() {
        let embedder = HashingEmbedder::new(64);
        let snapshot =
            CorpusSnapshot::build(1, mammals(), None, &embedder, &SparseConfig::default(), 2)
                .await
                .unwrap();

        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.sparse().len(), 3);
        assert_eq!(snapshot.dense().len(), 3);
        assert_eq!(snapshot.dense().dimension(), Some(64));
        assert!(snapshot.verify().is_ok());

        let doc = snapshot.document(DocId(0)).unwrap();
        assert_eq!(doc.tokens, vec!["cat", "mammal"]);
        assert!(!doc.sparse.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let embedder = HashingEmbedder::new(64);
        let config = SparseConfig::default();
        let a = CorpusSnapshot::build(1, mammals(), None, &embedder, &config, 32)
            .await
            .unwrap();
        let b = CorpusSnapshot::build(2, mammals(), None, &embedder, &config, 32)
            .await
            .unwrap();

        for (da, db) in a.documents().zip(b.documents()) {
            assert_eq!(da.id, db.id);
            assert_eq!(da.sparse, db.sparse);
            assert_eq!(da.embedding, db.embedding);
        }
    }

    #[tokio::test]
    async fn test_unchanged_documents_reuse_embeddings() {
        let embedder = CountingEmbedder::new();
        let config = SparseConfig::default();
        let first = CorpusSnapshot::build(1, mammals(), None, &embedder, &config, 32)
            .await
            .unwrap();
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 3);

        let mut changed = mammals();
        changed[2].text = "rust is a language".to_string();
        CorpusSnapshot::build(2, changed, Some(&first), &embedder, &config, 32)
            .await
            .unwrap();
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let embedder = HashingEmbedder::new(8);
        let docs = vec![
            SourceDocument::new(DocId(1), "a document"),
            SourceDocument::new(DocId(1), "another document"),
        ];
        let err = CorpusSnapshot::build(1, docs, None, &embedder, &SparseConfig::default(), 8)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let embedder = HashingEmbedder::new(8);
        let snapshot =
            CorpusSnapshot::build(1, Vec::new(), None, &embedder, &SparseConfig::default(), 8)
                .await
                .unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.verify().is_ok());
        assert_eq!(snapshot.stats().dimension, None);
    }

    #[tokio::test]
    async fn test_verify_detects_divergence() {
        let embedder = HashingEmbedder::new(8);
        let snapshot =
            CorpusSnapshot::build(1, mammals(), None, &embedder, &SparseConfig::default(), 8)
                .await
                .unwrap();
        let diverged = snapshot.with_dense(DenseIndex::default());

        let err = diverged.verify().unwrap_err();
        assert_eq!(err.error_code(), "INDEX_CORRUPTION");
    }
}
