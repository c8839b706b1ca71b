
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::Embedder;
use crate::config::OllamaConfig;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Text encoder backed by an Ollama server's `/api/embed` endpoint
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [&'a String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            agent,
            retry_attempts: config.retry_attempts.max(1),
            backoff: DEFAULT_BACKOFF,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; doubles on each further attempt
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Check that the server answers and has the configured model
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available_models
            ))
        }
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// One `/api/embed` call for the whole batch
    #[inline]
    pub fn embed_texts(&self, texts: &[&String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };

        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build batch embedding URL")?;

        let request_json = serde_json::to_string(&request)
            .context("Failed to serialize batch embedding request")?;

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate batch embeddings")?;

        let batch_response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse batch embedding response")?;

        debug!(
            "Received {} embeddings for {} texts",
            batch_response.embeddings.len(),
            texts.len()
        );
        Ok(batch_response.embeddings)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

impl Embedder for OllamaEmbedder {
    type Input = String;

    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed_batch(&mut self, inputs: &[&String]) -> Result<Vec<Vec<f32>>> {
        self.embed_texts(inputs)
    }
}
