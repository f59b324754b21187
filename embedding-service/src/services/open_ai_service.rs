//! OpenAI embeddings client.
//!
//! Minimal client around the OpenAI REST API:
//! - POST {endpoint}/v1/embeddings: batch embeddings
//!
//! Constructor validation:
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://
//!
//! No retries here. A failed batch is reported to the caller as-is.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::embedding_model_config::EmbeddingModelConfig,
    error_handler::{ConfigError, EmbeddingError, make_snippet, validate_http_endpoint},
    services::{EmbedFuture, EmbeddingsProvider},
};

/// Thin client for the OpenAI embeddings endpoint.
///
/// Internally keeps a preconfigured `reqwest::Client` (timeout and default
/// headers).
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    model: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`ConfigError::MissingVar`] if `cfg.api_key` is `None`
    /// - [`ConfigError::InvalidFormat`] if `cfg.endpoint` is not http(s)
    /// - [`EmbeddingError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: &EmbeddingModelConfig) -> Result<Self, EmbeddingError> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let endpoint = cfg.endpoint.trim();
        validate_http_endpoint("OPENAI_URL", endpoint)?;

        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            ConfigError::InvalidFormat {
                var: "OPENAI_API_KEY",
                reason: "not a valid header value",
            }
        })?;
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let url_embeddings = format!("{}/v1/embeddings", endpoint.trim_end_matches('/'));

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout_secs,
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            model: cfg.model.clone(),
            url_embeddings,
        })
    }

    async fn post_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.model,
            input: inputs,
        };

        debug!(
            model = %self.model,
            batch = inputs.len(),
            "POST {}", self.url_embeddings
        );

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_embeddings.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %url,
                %snippet,
                model = %self.model,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI /v1/embeddings returned non-success status"
            );
            return Err(EmbeddingError::HttpStatus {
                status,
                url,
                snippet,
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            error!(
                error = %e,
                model = %self.model,
                latency_ms = started.elapsed().as_millis(),
                "failed to decode /v1/embeddings response"
            );
            EmbeddingError::Decode(format!("serde error: {e}; expected `data[].embedding`"))
        })?;

        let vectors = out.into_ordered(inputs.len())?;

        info!(
            model = %self.model,
            batch = inputs.len(),
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );
        Ok(vectors)
    }
}

impl EmbeddingsProvider for OpenAiService {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed_batch<'a>(&'a self, inputs: &'a [String]) -> EmbedFuture<'a> {
        Box::pin(self.post_embeddings(inputs))
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

/// Request body for `/v1/embeddings`.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response body for `/v1/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingsResponse {
    /// Restores input order using `index` and checks the count.
    fn into_ordered(self, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.data.len() != expected {
            return Err(EmbeddingError::CountMismatch {
                got: self.data.len(),
                want: expected,
            });
        }
        let mut data = self.data;
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}
