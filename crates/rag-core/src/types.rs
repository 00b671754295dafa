//! Core domain types for the RAG engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Sparse TF-IDF vector: term -> weight, ordered by term.
pub type SparseVector = BTreeMap<String, f32>;

/// Document identifier supplied by the document store.
///
/// Ordering is numeric and is the final tie-break everywhere results are
/// ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub u64);

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A raw document as supplied by the document store, before indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Unique identifier.
    pub id: DocId,

    /// Raw text.
    pub text: String,

    /// User-provided metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SourceDocument {
    /// Create a source document without metadata.
    pub fn new(id: DocId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata value.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Blake3 hash of the raw text.
    pub fn content_hash(&self) -> [u8; 32] {
        *blake3::hash(self.text.as_bytes()).as_bytes()
    }
}

/// An indexed document. Immutable once built into a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: DocId,

    /// Raw text.
    pub text: String,

    /// Normalized token sequence.
    pub tokens: Vec<String>,

    /// Blake3 hash of the raw text, used to skip re-embedding.
    #[serde(with = "serde_hash")]
    pub content_hash: [u8; 32],

    /// Precomputed L2-normalized TF-IDF vector.
    pub sparse: SparseVector,

    /// Precomputed embedding.
    pub embedding: Vec<f32>,

    /// User-provided metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Check if the source text differs from what was indexed.
    pub fn content_changed(&self, source: &SourceDocument) -> bool {
        self.content_hash != source.content_hash()
    }
}

/// Optional per-query retrieval parameters. `None` falls back to config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParams {
    /// Number of fused candidates to keep.
    pub top_k: Option<usize>,

    /// Sparse weight in fusion, in [0, 1].
    pub alpha: Option<f32>,

    /// Context budget in the configured unit.
    pub budget: Option<usize>,
}

/// A query. Created per request and discarded after the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Raw query text.
    pub text: String,

    /// Normalized tokens.
    pub tokens: Vec<String>,

    /// Retrieval parameters.
    pub params: QueryParams,
}

impl Query {
    /// Create a query from raw text and its normalized tokens.
    pub fn new(text: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            text: text.into(),
            tokens,
            params: QueryParams::default(),
        }
    }

    /// Replace the retrieval parameters.
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }
}

/// Which retrieval paths found a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Sparse,
    Dense,
    Both,
}

impl MatchType {
    /// Number of retrieval paths that found the document.
    pub fn path_count(&self) -> usize {
        match self {
            Self::Both => 2,
            Self::Sparse | Self::Dense => 1,
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sparse => "keyword",
            Self::Dense => "semantic",
            Self::Both => "both",
        };
        write!(f, "{}", s)
    }
}

/// A fused candidate. Owned by the ranking pipeline for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Document identifier.
    pub doc_id: DocId,

    /// Raw sparse cosine, 0.0 when the sparse path did not return it.
    pub sparse_score: f32,

    /// Raw dense cosine, 0.0 when the dense path did not return it.
    pub dense_score: f32,

    /// Weighted combination of the normalized scores.
    pub fused_score: f32,

    /// Paths that found the document.
    pub match_type: MatchType,
}

impl ScoredCandidate {
    /// Human-readable reason this candidate was selected.
    pub fn explanation(&self) -> String {
        match self.match_type {
            MatchType::Both => format!(
                "both semantic ({:.2}) and keyword ({:.2}) match",
                self.dense_score, self.sparse_score
            ),
            MatchType::Dense => format!("semantic match (score: {:.2})", self.dense_score),
            MatchType::Sparse => format!("keyword match (score: {:.2})", self.sparse_score),
        }
    }
}

/// Unit the context budget is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    /// Unicode scalar values.
    Chars,
    /// Whitespace-separated words.
    Tokens,
}

/// Upper bound on the size of a context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub limit: usize,
    pub unit: BudgetUnit,
}

impl Budget {
    /// A budget measured in characters.
    pub fn chars(limit: usize) -> Self {
        Self {
            limit,
            unit: BudgetUnit::Chars,
        }
    }

    /// A budget measured in whitespace tokens.
    pub fn tokens(limit: usize) -> Self {
        Self {
            limit,
            unit: BudgetUnit::Tokens,
        }
    }

    /// Size of `text` in this budget's unit.
    pub fn measure(&self, text: &str) -> usize {
        match self.unit {
            BudgetUnit::Chars => text.chars().count(),
            BudgetUnit::Tokens => text.split_whitespace().count(),
        }
    }
}

/// A document excerpt selected into the context window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Excerpt {
    pub doc_id: DocId,
    pub text: String,
    pub score: f32,
}

/// Separator placed between excerpts when the window is rendered.
pub const EXCERPT_SEPARATOR: &str = "\n\n---\n\n";

/// Ordered excerpts plus a running budget counter.
///
/// Built once per query and consumed once by generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    excerpts: Vec<Excerpt>,
    budget: Budget,
    used: usize,
}

impl ContextWindow {
    /// Create an empty window.
    pub fn new(budget: Budget) -> Self {
        Self {
            excerpts: Vec::new(),
            budget,
            used: 0,
        }
    }

    /// Append an excerpt if it fits in the remaining budget.
    ///
    /// Returns false and leaves the window untouched when it does not.
    pub fn try_push(&mut self, excerpt: Excerpt) -> bool {
        let size = self.budget.measure(&excerpt.text);
        if size > self.remaining() {
            return false;
        }
        self.used += size;
        self.excerpts.push(excerpt);
        true
    }

    pub fn excerpts(&self) -> &[Excerpt] {
        &self.excerpts
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Size consumed so far, in the budget's unit.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.budget.limit.saturating_sub(self.used)
    }

    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.excerpts.len()
    }

    /// Document ids in window order.
    pub fn doc_ids(&self) -> Vec<DocId> {
        self.excerpts.iter().map(|e| e.doc_id).collect()
    }

    /// Join the excerpts into a single context block.
    pub fn render(&self) -> String {
        self.excerpts
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(EXCERPT_SEPARATOR)
    }
}

/// Why a query ran on fewer than both retrieval paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// The embedding provider reported itself unavailable.
    DenseUnavailable { reason: String },
    /// The dense path did not answer within the join timeout.
    DenseTimedOut { timeout_ms: u64 },
    /// The dense path failed for another reason.
    DenseFailed { reason: String },
}

/// Result of the retrieval half of a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    /// The query the candidates answer.
    pub query: Query,

    /// Fused candidates, best first, truncated to top-K.
    pub candidates: Vec<ScoredCandidate>,

    /// Candidates returned by the sparse path before fusion.
    pub sparse_hits: usize,

    /// Candidates returned by the dense path before fusion.
    pub dense_hits: usize,

    /// Set when the dense path did not contribute.
    pub degradation: Option<Degradation>,

    /// Version of the snapshot the query read.
    pub snapshot_version: u64,
}

/// Final response handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated text.
    pub text: String,

    /// Documents used as evidence, in context order.
    pub evidence: Vec<DocId>,

    /// Set when the answer was produced from sparse retrieval only.
    pub degradation: Option<Degradation>,

    /// True when no retrieved context was available to generation.
    pub low_confidence: bool,

    /// True when the generator stayed unavailable after every retry and the
    /// text came from the fallback instead.
    #[serde(default)]
    pub fallback: bool,

    /// Version of the snapshot the query read.
    pub snapshot_version: u64,

    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
}

impl Answer {
    /// Whether the answer was generated from both retrieval paths and real context.
    pub fn fully_informed(&self) -> bool {
        self.degradation.is_none() && !self.low_confidence && !self.fallback
    }
}

/// Why a document matched a query lexically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermExplanation {
    pub doc_id: DocId,

    /// Terms shared by query and document.
    pub matching_terms: Vec<String>,

    /// Heaviest query terms by TF-IDF weight.
    pub query_terms: Vec<(String, f32)>,

    /// Heaviest document terms by TF-IDF weight.
    pub document_terms: Vec<(String, f32)>,
}

/// Statistics about the published corpus snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    pub version: u64,
    pub documents: usize,
    pub vocabulary: usize,
    pub dimension: Option<usize>,
}

/// Hex serialization for content hashes.
mod serde_hash {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex::encode(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid hash length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excerpt(id: u64, text: &str) -> Excerpt {
        Excerpt {
            doc_id: DocId(id),
            text: text.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_doc_id_ordering() {
        let mut ids = vec![DocId(10), DocId(2), DocId(7)];
        ids.sort();
        assert_eq!(ids, vec![DocId(2), DocId(7), DocId(10)]);
    }

    #[test]
    fn test_content_changed() {
        let source = SourceDocument::new(DocId(1), "cats are mammals");
        let doc = Document {
            id: source.id,
            text: source.text.clone(),
            tokens: vec![],
            content_hash: source.content_hash(),
            sparse: SparseVector::new(),
            embedding: vec![],
            metadata: HashMap::new(),
        };
        assert!(!doc.content_changed(&source));
        assert!(doc.content_changed(&SourceDocument::new(DocId(1), "dogs are mammals")));
    }

    #[test]
    fn test_document_hash_roundtrips_as_hex() {
        let source = SourceDocument::new(DocId(3), "hello");
        let doc = Document {
            id: source.id,
            text: source.text.clone(),
            tokens: vec!["hello".to_string()],
            content_hash: source.content_hash(),
            sparse: SparseVector::new(),
            embedding: vec![0.5],
            metadata: HashMap::new(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains(&hex::encode(doc.content_hash)));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content_hash, doc.content_hash);
    }

    #[test]
    fn test_budget_measure() {
        assert_eq!(Budget::chars(10).measure("héllo"), 5);
        assert_eq!(Budget::tokens(10).measure("one  two\nthree"), 3);
    }

    #[test]
    fn test_context_window_respects_budget() {
        let mut window = ContextWindow::new(Budget::chars(10));
        assert!(window.try_push(excerpt(1, "abcdef")));
        assert!(!window.try_push(excerpt(2, "abcdef")));
        assert!(window.try_push(excerpt(3, "abcd")));
        assert_eq!(window.used(), 10);
        assert_eq!(window.remaining(), 0);
        assert_eq!(window.doc_ids(), vec![DocId(1), DocId(3)]);
        assert_eq!(window.render(), format!("abcdef{}abcd", EXCERPT_SEPARATOR));
    }

    #[test]
    fn test_candidate_explanation() {
        let candidate = ScoredCandidate {
            doc_id: DocId(1),
            sparse_score: 0.42,
            dense_score: 0.81,
            fused_score: 0.9,
            match_type: MatchType::Both,
        };
        assert_eq!(
            candidate.explanation(),
            "both semantic (0.81) and keyword (0.42) match"
        );
        assert_eq!(MatchType::Both.path_count(), 2);
        assert_eq!(MatchType::Dense.path_count(), 1);
    }
}
