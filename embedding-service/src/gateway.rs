//! Rate-limited embedding entry point.
//!
//! [`EmbeddingGateway`] owns the provider and the call window. Every non-empty
//! batch costs exactly one provider call and one slot in the window; results
//! are checked for count and (when configured) vector length before they are
//! handed back. Failures are returned unchanged: the ingestion layer decides
//! whether a chunk is retried, skipped or reported.

use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    config::{default_config::config_openai_embedding, embedding_model_config::EmbeddingModelConfig},
    error_handler::{EmbeddingError, Result},
    rate_limit::RateLimitWindow,
    services::{EmbeddingsProvider, open_ai_service::OpenAiService},
};

/// Shared gateway; wrap in `Arc` and clone the handle.
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingsProvider>,
    limiter: RateLimitWindow,
    expected_dim: Option<usize>,
}

impl std::fmt::Debug for EmbeddingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("model", &self.provider.model_name())
            .field("limiter", &self.limiter)
            .field("expected_dim", &self.expected_dim)
            .finish()
    }
}

impl EmbeddingGateway {
    /// Gateway over an arbitrary provider.
    pub fn new(
        provider: Arc<dyn EmbeddingsProvider>,
        limiter: RateLimitWindow,
        expected_dim: Option<usize>,
    ) -> Self {
        Self {
            provider,
            limiter,
            expected_dim,
        }
    }

    /// OpenAI-backed gateway built from an explicit config.
    ///
    /// # Errors
    /// Propagates [`OpenAiService::new`] failures.
    pub fn from_config(cfg: &EmbeddingModelConfig) -> Result<Self> {
        let provider = OpenAiService::new(cfg)?;
        Ok(Self::new(
            Arc::new(provider),
            RateLimitWindow::new(cfg.rate_limit),
            Some(cfg.dim),
        ))
    }

    /// OpenAI-backed gateway configured from the environment.
    ///
    /// # Errors
    /// Config or client construction errors.
    pub fn from_env() -> Result<Self> {
        let cfg = config_openai_embedding()?;
        Self::from_config(&cfg)
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn expected_dim(&self) -> Option<usize> {
        self.expected_dim
    }

    pub fn limiter(&self) -> &RateLimitWindow {
        &self.limiter
    }

    /// Embeds a batch, returning one vector per input in input order.
    ///
    /// An empty batch returns immediately and does not touch the window.
    ///
    /// # Errors
    /// Provider errors, [`EmbeddingError::CountMismatch`] or
    /// [`EmbeddingError::DimensionMismatch`].
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        self.limiter.acquire().await;
        debug!(batch = inputs.len(), model = %self.model_name(), "embedding batch");

        let vectors = self.provider.embed_batch(inputs).await.map_err(|e| {
            error!(error = %e, batch = inputs.len(), "embedding batch failed");
            e
        })?;

        if vectors.len() != inputs.len() {
            return Err(EmbeddingError::CountMismatch {
                got: vectors.len(),
                want: inputs.len(),
            });
        }
        if let Some(want) = self.expected_dim {
            if let Some(bad) = vectors.iter().find(|v| v.len() != want) {
                return Err(EmbeddingError::DimensionMismatch {
                    got: bad.len(),
                    want,
                });
            }
        }
        Ok(vectors)
    }

    /// Embeds a single text (search queries).
    ///
    /// # Errors
    /// Same as [`Self::embed`].
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed(&[text.to_string()]).await?;
        out.pop().ok_or(EmbeddingError::CountMismatch { got: 0, want: 1 })
    }
}
