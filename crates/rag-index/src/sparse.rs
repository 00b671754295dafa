//! TF-IDF inverted index.

use std::collections::BTreeMap;

use rag_core::{DocId, RagError, Result, SparseConfig, SparseVector, TermExplanation};

/// Sparse lexical index over the corpus.
///
/// IDF is fixed at build time from the full corpus. Every map is ordered, so
/// building twice from the same documents yields bit-identical weights.
#[derive(Debug, Clone, Default)]
pub struct SparseIndex {
    config: SparseConfig,
    idf: BTreeMap<String, f32>,
    vectors: BTreeMap<DocId, SparseVector>,
    postings: BTreeMap<String, Vec<(DocId, f32)>>,
}

impl SparseIndex {
    /// Build the index from `(id, normalized tokens)` pairs.
    pub fn build<'a, I>(documents: I, config: &SparseConfig) -> Self
    where
        I: IntoIterator<Item = (DocId, &'a [String])>,
    {
        let mut counts: BTreeMap<DocId, BTreeMap<String, u32>> = BTreeMap::new();
        for (id, tokens) in documents {
            counts.insert(id, term_counts(tokens, config.ngram_max));
        }

        let mut df: BTreeMap<&str, u32> = BTreeMap::new();
        for terms in counts.values() {
            for term in terms.keys() {
                *df.entry(term.as_str()).or_default() += 1;
            }
        }

        let n = counts.len() as f64;
        let idf: BTreeMap<String, f32> = df
            .iter()
            .map(|(term, &df)| {
                let weight = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                (term.to_string(), weight as f32)
            })
            .collect();

        let mut index = Self {
            config: config.clone(),
            idf,
            vectors: BTreeMap::new(),
            postings: BTreeMap::new(),
        };

        for (id, terms) in &counts {
            let vector = index.weigh(terms);
            for (term, &weight) in &vector {
                index
                    .postings
                    .entry(term.clone())
                    .or_default()
                    .push((*id, weight));
            }
            index.vectors.insert(*id, vector);
        }

        index
    }

    /// TF-IDF vector of a token sequence against the fixed corpus statistics.
    ///
    /// Terms the corpus has never seen carry no weight and are left out.
    pub fn vectorize(&self, tokens: &[String]) -> SparseVector {
        self.weigh(&term_counts(tokens, self.config.ngram_max))
    }

    /// Score every document sharing at least one term with the query.
    ///
    /// Sorted by cosine descending, ties by ascending id. Documents with no
    /// shared term are not returned.
    pub fn score(&self, query_tokens: &[String]) -> Vec<(DocId, f32)> {
        let query = self.vectorize(query_tokens);

        let mut scores: BTreeMap<DocId, f32> = BTreeMap::new();
        for (term, &q_weight) in &query {
            if let Some(postings) = self.postings.get(term) {
                for &(id, d_weight) in postings {
                    *scores.entry(id).or_default() += q_weight * d_weight;
                }
            }
        }

        let mut results: Vec<(DocId, f32)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(id, score)| (id, score.min(1.0)))
            .collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results
    }

    /// Heaviest terms of a token sequence, by weight desc then term.
    pub fn important_terms(&self, tokens: &[String], n: usize) -> Vec<(String, f32)> {
        top_terms(&self.vectorize(tokens), n)
    }

    /// Explain the lexical overlap between a query and one document.
    pub fn explain(&self, query_tokens: &[String], id: DocId, n: usize) -> Result<TermExplanation> {
        let document = self
            .vectors
            .get(&id)
            .ok_or(RagError::DocumentNotFound { id: id.0 })?;
        let query = self.vectorize(query_tokens);

        let matching_terms = query
            .keys()
            .filter(|term| document.contains_key(*term))
            .cloned()
            .collect();

        Ok(TermExplanation {
            doc_id: id,
            matching_terms,
            query_terms: top_terms(&query, n),
            document_terms: top_terms(document, n),
        })
    }

    /// Precomputed vector of an indexed document.
    pub fn doc_vector(&self, id: DocId) -> Option<&SparseVector> {
        self.vectors.get(&id)
    }

    /// Indexed document ids in ascending order.
    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.vectors.keys().copied()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.vectors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.idf.get(term).copied()
    }

    fn weigh(&self, counts: &BTreeMap<String, u32>) -> SparseVector {
        let mut vector: SparseVector = counts
            .iter()
            .filter_map(|(term, &count)| {
                let idf = self.idf.get(term)?;
                let tf = if self.config.sublinear_tf {
                    1.0 + (count as f32).ln()
                } else {
                    count as f32
                };
                Some((term.clone(), tf * idf))
            })
            .collect();

        let norm = vector.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for weight in vector.values_mut() {
                *weight /= norm;
            }
        }
        vector
    }
}

/// Count the n-gram terms of a token sequence, n in `1..=ngram_max`.
fn term_counts(tokens: &[String], ngram_max: usize) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for n in 1..=ngram_max.max(1) {
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_default() += 1;
        }
    }
    counts
}

fn top_terms(vector: &SparseVector, n: usize) -> Vec<(String, f32)> {
    let mut terms: Vec<(String, f32)> = vector.iter().map(|(t, w)| (t.clone(), *w)).collect();
    terms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(n);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_text::normalize;

    fn corpus(texts: &[&str]) -> Vec<(DocId, Vec<String>)> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| (DocId(i as u64), normalize(text)))
            .collect()
    }

    fn build(docs: &[(DocId, Vec<String>)], config: &SparseConfig) -> SparseIndex {
        SparseIndex::build(docs.iter().map(|(id, t)| (*id, t.as_slice())), config)
    }

    fn mammals() -> SparseIndex {
        build(
            &corpus(&["cats are mammals", "dogs are mammals", "python is a language"]),
            &SparseConfig::default(),
        )
    }

    #[test]
    fn test_mammal_documents_outrank_language() {
        let index = mammals();
        let results = index.score(&normalize("what mammals exist"));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, DocId(0));
        assert_eq!(results[1].0, DocId(1));
        // Same shape, same score: tie broken by id
        assert_eq!(results[0].1, results[1].1);
    }

    #[test]
    fn test_no_overlap_returns_nothing() {
        let index = mammals();
        assert!(index.score(&normalize("quantum chromodynamics")).is_empty());
        assert!(index.score(&[]).is_empty());
    }

    #[test]
    fn test_scores_are_cosines() {
        let index = mammals();
        let results = index.score(&normalize("cats are mammals"));
        assert_eq!(results[0].0, DocId(0));
        assert!((results[0].1 - 1.0).abs() < 1e-5);
        for (_, score) in &results {
            assert!(*score > 0.0 && *score <= 1.0);
        }
    }

    #[test]
    fn test_empty_index() {
        let index = build(&[], &SparseConfig::default());
        assert!(index.is_empty());
        assert_eq!(index.vocabulary_size(), 0);
        assert!(index.score(&normalize("anything")).is_empty());
    }

    #[test]
    fn test_rebuild_is_bit_identical() {
        let docs = corpus(&["refund policy for annual plans", "annual billing cycle"]);
        let a = build(&docs, &SparseConfig::default());
        let b = build(&docs, &SparseConfig::default());

        for id in a.doc_ids() {
            let va = a.doc_vector(id).unwrap();
            let vb = b.doc_vector(id).unwrap();
            assert_eq!(va.len(), vb.len());
            for ((ta, wa), (tb, wb)) in va.iter().zip(vb.iter()) {
                assert_eq!(ta, tb);
                assert_eq!(wa.to_bits(), wb.to_bits());
            }
        }
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let index = build(
            &corpus(&["annual refund", "annual billing", "annual invoice"]),
            &SparseConfig::default(),
        );
        assert!(index.idf("refund").unwrap() > index.idf("annual").unwrap());
    }

    #[test]
    fn test_vectors_are_unit_length() {
        let index = mammals();
        for id in index.doc_ids() {
            let norm: f32 = index.doc_vector(id).unwrap().values().map(|w| w * w).sum();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bigrams() {
        let config = SparseConfig {
            ngram_max: 2,
            sublinear_tf: true,
        };
        let index = build(&corpus(&["reset password", "password reset link"]), &config);
        assert!(index.idf("reset password").is_some());

        let results = index.score(&normalize("reset password"));
        assert_eq!(results[0].0, DocId(0));
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_raw_term_frequency() {
        let config = SparseConfig {
            ngram_max: 1,
            sublinear_tf: false,
        };
        let index = build(&corpus(&["cat cat cat dog", "dog"]), &config);
        let vector = index.doc_vector(DocId(0)).unwrap();
        assert!(vector["cat"] > vector["dog"]);
    }

    #[test]
    fn test_important_terms() {
        let index = mammals();
        let terms = index.important_terms(&normalize("cats are mammals"), 1);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].0, "cat");
    }

    #[test]
    fn test_explain() {
        let index = mammals();
        let explanation = index.explain(&normalize("mammals"), DocId(1), 5).unwrap();
        assert_eq!(explanation.matching_terms, vec!["mammal".to_string()]);
        assert_eq!(explanation.document_terms.len(), 2);

        let err = index.explain(&normalize("mammals"), DocId(9), 5).unwrap_err();
        assert_eq!(err.error_code(), "DOCUMENT_NOT_FOUND");
    }
}
