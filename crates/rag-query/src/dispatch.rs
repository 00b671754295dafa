//! Generation dispatch with bounded retries and a fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use rag_core::{CancelToken, ContextWindow, GenerationConfig, Generator, RagError, Result};

/// Answer text used when neither the generator nor a fallback can respond.
pub const UNAVAILABLE_ANSWER: &str =
    "I'm having trouble connecting to the AI service. Please try again later.";

/// Retry schedule for transient generation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on a single attempt; exceeding it counts as a transient failure.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Outcome of [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub text: String,

    /// Set when the primary generator gave up and the text came from the
    /// fallback.
    pub fallback: bool,
}

/// Sends the query and context to the generator.
///
/// `ProviderUnavailable` (including an attempt timing out) is retried with
/// exponential backoff up to `max_retries` times; any other error, notably
/// `GenerationRejected`, is returned at once. Cancellation is honored during
/// attempts and backoff sleeps.
///
/// [`dispatch`](Self::dispatch) adds the fallback step: once retries are
/// exhausted the fallback generator answers from the same context, or
/// [`UNAVAILABLE_ANSWER`] is returned when there is none or it fails too.
pub struct Dispatcher<G: ?Sized> {
    generator: Arc<G>,
    fallback: Option<Arc<dyn Generator>>,
    policy: RetryPolicy,
}

impl<G> Dispatcher<G>
where
    G: Generator + ?Sized,
{
    pub fn new(generator: Arc<G>, policy: RetryPolicy) -> Self {
        Self {
            generator,
            fallback: None,
            policy,
        }
    }

    /// Answer with `fallback` when the generator stays unavailable.
    pub fn with_fallback(mut self, fallback: Arc<dyn Generator>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn generate(
        &self,
        query: &str,
        context: &ContextWindow,
        cancel: &CancelToken,
    ) -> Result<String> {
        let mut retry = 0;
        loop {
            cancel.check()?;

            let attempt = self.attempt(query, context, cancel).await;
            let error = match attempt {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            if retry >= self.policy.max_retries {
                warn!("Generation failed after {} attempts: {}", retry + 1, error);
                return Err(error);
            }

            let delay = self.policy.backoff(retry);
            warn!(
                "Generation attempt {} failed ({}), retrying in {:?}",
                retry + 1,
                error,
                delay
            );
            cancel
                .run(async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            retry += 1;
        }
    }

    /// Generate with retries, then fall back on a transient failure.
    pub async fn dispatch(
        &self,
        query: &str,
        context: &ContextWindow,
        cancel: &CancelToken,
    ) -> Result<Dispatched> {
        let error = match self.generate(query, context, cancel).await {
            Ok(text) => {
                return Ok(Dispatched {
                    text,
                    fallback: false,
                })
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        let text = match &self.fallback {
            Some(fallback) => {
                warn!(
                    "{} unavailable ({}), answering with {}",
                    self.generator.name(),
                    error,
                    fallback.name()
                );
                let timeout = self.policy.attempt_timeout;
                let call = fallback.generate(query, context);
                let outcome = cancel
                    .run(async { Ok(tokio::time::timeout(timeout, call).await) })
                    .await?;
                match outcome {
                    Ok(Ok(text)) => text,
                    Ok(Err(e)) => {
                        warn!("Fallback {} failed too: {}", fallback.name(), e);
                        UNAVAILABLE_ANSWER.to_string()
                    }
                    Err(_) => {
                        warn!("Fallback {} gave no response within {:?}", fallback.name(), timeout);
                        UNAVAILABLE_ANSWER.to_string()
                    }
                }
            }
            None => {
                warn!(
                    "{} unavailable ({}), no fallback configured",
                    self.generator.name(),
                    error
                );
                UNAVAILABLE_ANSWER.to_string()
            }
        };

        Ok(Dispatched {
            text,
            fallback: true,
        })
    }

    async fn attempt(
        &self,
        query: &str,
        context: &ContextWindow,
        cancel: &CancelToken,
    ) -> Result<String> {
        debug!("Dispatching to {}", self.generator.name());
        let timeout = self.policy.attempt_timeout;
        let call = self.generator.generate(query, context);
        let outcome = cancel
            .run(async { Ok(tokio::time::timeout(timeout, call).await) })
            .await?;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(RagError::provider_unavailable(
                self.generator.name(),
                format!("no response within {:?}", timeout),
            )),
        }
    }
}
