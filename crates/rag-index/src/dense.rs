//! Exact nearest-neighbor index over document embeddings.

use std::collections::BTreeMap;

use rag_core::{DocId, RagError, Result};

/// Brute-force cosine index.
///
/// Vectors are stored with their norms precomputed. A corpus of a few
/// thousand Q&A pairs scans in well under a millisecond.
#[derive(Debug, Clone, Default)]
pub struct DenseIndex {
    dimension: Option<usize>,
    entries: BTreeMap<DocId, Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    vector: Vec<f32>,
    norm: f32,
}

impl DenseIndex {
    /// Build from `(id, embedding)` pairs. All embeddings must share one
    /// dimension.
    pub fn build<I>(embeddings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (DocId, Vec<f32>)>,
    {
        let mut index = Self::default();
        for (id, vector) in embeddings {
            match index.dimension {
                None => index.dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(RagError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
            }
            let norm = l2_norm(&vector);
            index.entries.insert(id, Entry { vector, norm });
        }
        Ok(index)
    }

    /// The `k` documents most similar to `query`, by cosine descending with
    /// ties broken by ascending id.
    ///
    /// An empty index or a zero query vector yields no results.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(DocId, f32)>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm == 0.0 || k == 0 {
            return Ok(Vec::new());
        }

        let mut results: Vec<(DocId, f32)> = self
            .entries
            .iter()
            .map(|(id, entry)| {
                let score = if entry.norm == 0.0 {
                    0.0
                } else {
                    dot(query, &entry.vector) / (query_norm * entry.norm)
                };
                // -0.0 and 0.0 must tie so the id decides
                (*id, score.clamp(-1.0, 1.0) + 0.0)
            })
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(k);
        Ok(results)
    }

    pub fn embedding(&self, id: DocId) -> Option<&[f32]> {
        self.entries.get(&id).map(|e| e.vector.as_slice())
    }

    /// Indexed document ids in ascending order.
    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Embedding dimension, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
