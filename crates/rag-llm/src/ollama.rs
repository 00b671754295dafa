//! Ollama generation provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rag_core::{ContextWindow, Generator, OllamaConfig, RagError, Result};
use rag_embed::OllamaClient;

use crate::prompt::{build_prompt, STOP_SEQUENCES};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    stop: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Generator backed by Ollama's `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaGenerator {
    /// Create a generator from the `[ollama]` configuration section.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = OllamaClient::new(
            config.base_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?;
        Ok(Self {
            client,
            model: config.generation_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Verify the server is up and the generation model is installed.
    pub async fn health_check(&self) -> Result<()> {
        self.client.ensure_model(&self.model).await
    }

    fn request(&self, query: &str, context: &ContextWindow) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: build_prompt(query, context),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
                stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, query: &str, context: &ContextWindow) -> Result<String> {
        let request = self.request(query, context);
        debug!(
            "Sending {} char prompt to {} ({} excerpts)",
            request.prompt.len(),
            self.model,
            context.len()
        );

        let response: GenerateResponse = self.client.post_json("/api/generate", &request).await?;
        let answer = response.response.trim();
        if answer.is_empty() {
            return Err(RagError::provider_unavailable(
                self.model.as_str(),
                "empty response from model",
            ));
        }

        info!("Received answer from {} ({} chars)", self.model, answer.len());
        Ok(answer.to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
