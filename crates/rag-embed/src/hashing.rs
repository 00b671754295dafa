//! Deterministic feature-hashing embedder.

use async_trait::async_trait;

use rag_core::{Embedder, Result};
use rag_text::normalize;

const DEFAULT_DIMENSION: usize = 256;

/// Offline embedder based on signed feature hashing.
///
/// Each normalized token (and each adjacent token pair) is hashed with
/// blake3 into one bucket with a +1/-1 sign; the counts are L2-normalized.
/// Texts sharing vocabulary land close together, which is enough for
/// offline runs and tests. Text without tokens embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-long vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let tokens = normalize(text);
        let mut embedding = vec![0.0f32; self.dimension];

        for token in &tokens {
            self.add_feature(&mut embedding, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut embedding, feature.as_bytes(), 0.5);
        }

        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &[u8], weight: f32) {
        let hash = blake3::hash(feature);
        let bytes = hash.as_bytes();
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[index] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
