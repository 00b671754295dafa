//! Configuration types for the RAG engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RagError, Result};
use crate::types::{Budget, BudgetUnit};

/// Main configuration for the RAG engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Sparse index configuration.
    #[serde(default)]
    pub sparse: SparseConfig,

    /// Document embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval and fusion configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Context assembly configuration.
    #[serde(default)]
    pub context: ContextConfig,

    /// Generation dispatch configuration.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Ollama provider configuration.
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Sparse (TF-IDF) index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseConfig {
    /// Longest n-gram indexed as a term (1 = unigrams only).
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,

    /// Use `1 + ln(tf)` instead of raw term counts.
    #[serde(default = "default_true")]
    pub sublinear_tf: bool,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            ngram_max: 1,
            sublinear_tf: true,
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Documents sent to the provider per call while indexing.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { batch_size: 32 }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of fused results.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Maximum number of fused results.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Sparse weight in fusion (0 = dense only, 1 = sparse only).
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Candidates fetched per path, as a multiple of top-K.
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: usize,

    /// Lower bound on candidates fetched per path.
    #[serde(default = "default_min_fetch")]
    pub min_fetch: usize,

    /// How long the query waits for the dense path before going sparse-only.
    #[serde(default = "default_dense_timeout")]
    pub dense_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 50,
            alpha: 0.4,
            fetch_multiplier: 2,
            min_fetch: 20,
            dense_timeout_ms: 5000,
        }
    }
}

impl SearchConfig {
    pub fn dense_timeout(&self) -> Duration {
        Duration::from_millis(self.dense_timeout_ms)
    }
}

/// Context assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Default context budget.
    #[serde(default = "default_budget")]
    pub budget: usize,

    /// Unit the budget is measured in.
    #[serde(default = "default_budget_unit")]
    pub unit: BudgetUnit,

    /// Token-set similarity at or above which two excerpts are redundant.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget: 2000,
            unit: BudgetUnit::Chars,
            dedup_threshold: 0.8,
        }
    }
}

impl ContextConfig {
    /// Budget with an optional per-query override of the limit.
    pub fn budget(&self, limit: Option<usize>) -> Budget {
        Budget {
            limit: limit.unwrap_or(self.budget),
            unit: self.unit,
        }
    }
}

/// Generation dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Retries after the first attempt on transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles each retry.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Ceiling on the retry delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Timeout for a single generation attempt.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            attempt_timeout_ms: 30000,
        }
    }
}

/// Ollama provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Dimension the embedding model produces.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Model used for generation.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens generated per answer.
    #[serde(default = "default_max_answer_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            embedding_model: default_embedding_model(),
            embedding_dimension: 768,
            generation_model: default_generation_model(),
            temperature: 0.7,
            max_tokens: 500,
            request_timeout_ms: 30000,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_ngram_max() -> usize {
    1
}

fn default_batch_size() -> usize {
    32
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    50
}

fn default_alpha() -> f32 {
    0.4
}

fn default_fetch_multiplier() -> usize {
    2
}

fn default_min_fetch() -> usize {
    20
}

fn default_dense_timeout() -> u64 {
    5000
}

fn default_budget() -> usize {
    2000
}

fn default_budget_unit() -> BudgetUnit {
    BudgetUnit::Chars
}

fn default_dedup_threshold() -> f32 {
    0.8
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    5000
}

fn default_attempt_timeout() -> u64 {
    30000
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimension() -> usize {
    768
}

fn default_generation_model() -> String {
    "mistral".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_answer_tokens() -> u32 {
    500
}

fn default_request_timeout() -> u64 {
    30000
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("rag.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Reject values the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.search.alpha) {
            return Err(RagError::config(format!(
                "search.alpha must be in [0, 1], got {}",
                self.search.alpha
            )));
        }
        if self.search.default_top_k == 0 || self.search.max_top_k == 0 {
            return Err(RagError::config("search top-k values must be positive"));
        }
        if self.search.default_top_k > self.search.max_top_k {
            return Err(RagError::config(
                "search.default_top_k cannot exceed search.max_top_k",
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(RagError::config("embedding.batch_size must be positive"));
        }
        if self.sparse.ngram_max == 0 {
            return Err(RagError::config("sparse.ngram_max must be at least 1"));
        }
        if self.context.budget == 0 {
            return Err(RagError::config("context.budget must be positive"));
        }
        if !(self.context.dedup_threshold > 0.0 && self.context.dedup_threshold <= 1.0) {
            return Err(RagError::config(format!(
                "context.dedup_threshold must be in (0, 1], got {}",
                self.context.dedup_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.search.default_top_k, 5);
        assert!((config.search.alpha - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.context.budget, 2000);
        assert_eq!(config.context.unit, BudgetUnit::Chars);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[search]\nalpha = 0.7\n\n[context]\nbudget = 500\nunit = \"tokens\""
        )
        .unwrap();

        let config = RagConfig::load(file.path()).unwrap();
        assert!((config.search.alpha - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.context.budget(None), Budget::tokens(500));
        assert_eq!(config.context.budget(Some(40)), Budget::tokens(40));
        assert_eq!(config.ollama.generation_model, "mistral");
    }

    #[test]
    fn test_load_rejects_bad_alpha() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nalpha = 1.5").unwrap();

        let err = RagConfig::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nalpha = ").unwrap();
        assert!(RagConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_dedup_threshold() {
        let mut config = RagConfig::default();
        config.context.dedup_threshold = 0.0;
        assert!(config.validate().is_err());
        config.context.dedup_threshold = 1.0;
        assert!(config.validate().is_ok());
    }
}
