//! Ollama HTTP client and embedding provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rag_core::{Embedder, OllamaConfig, RagError, Result};

const PROVIDER: &str = "ollama";

/// Thin async client for a local Ollama server.
///
/// Failure classification:
/// - connection errors, timeouts, HTTP 429 and 5xx: `ProviderUnavailable`
/// - any other non-success status: `GenerationRejected`
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    /// Create a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to `path` and decode the JSON reply.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::provider_unavailable(PROVIDER, format!("invalid JSON reply: {}", e)))
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| RagError::provider_unavailable(PROVIDER, format!("invalid JSON reply: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check the server is reachable and has `model` installed.
    ///
    /// `mistral` matches an installed `mistral:latest`.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        let models = self.list_models().await?;
        let installed = models.iter().any(|name| {
            name == model
                || name
                    .strip_prefix(model)
                    .is_some_and(|tag| tag.starts_with(':'))
        });

        if installed {
            debug!("Ollama health check passed for model {}", model);
            Ok(())
        } else {
            warn!("Model {} not installed on {}", model, self.base_url);
            Err(RagError::provider_unavailable(
                PROVIDER,
                format!("model '{}' is not installed (run: ollama pull {})", model, model),
            ))
        }
    }
}

fn transport_error(e: reqwest::Error) -> RagError {
    let reason = if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("cannot connect: {}", e)
    } else {
        e.to_string()
    };
    RagError::provider_unavailable(PROVIDER, reason)
}

fn status_error(status: StatusCode, body: &str) -> RagError {
    let reason = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        RagError::provider_unavailable(PROVIDER, reason)
    } else {
        RagError::generation_rejected(reason)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by Ollama's `/api/embeddings` endpoint.
///
/// The endpoint embeds one text per call, so batches are sent sequentially.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Create an embedder from the `[ollama]` configuration section.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = OllamaClient::new(
            config.base_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?;
        Ok(Self::with_client(
            client,
            config.embedding_model.clone(),
            config.embedding_dimension,
        ))
    }

    pub fn with_client(client: OllamaClient, model: String, dimension: usize) -> Self {
        Self {
            client,
            model,
            dimension,
        }
    }

    /// Verify the server is up and the embedding model is installed.
    pub async fn health_check(&self) -> Result<()> {
        self.client.ensure_model(&self.model).await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("/api/embeddings", &request)
            .await
            .map_err(|e| match e {
                // An embedding request the server refuses still leaves the
                // dense path unusable.
                RagError::GenerationRejected { reason } => {
                    RagError::provider_unavailable(PROVIDER, reason)
                }
                other => other,
            })?;

        if response.embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: response.embedding.len(),
            });
        }
        Ok(response.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
