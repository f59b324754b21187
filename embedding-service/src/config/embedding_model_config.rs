use std::time::Duration;

/// Configuration for the embedding provider invocation.
///
/// # Fields
///
/// - `model`: model identifier sent with every batch (e.g. `"text-embedding-3-small"`).
/// - `endpoint`: provider base URL; `/v1/embeddings` is appended.
/// - `api_key`: bearer token for the provider.
/// - `dim`: expected vector length; batches returning another length are rejected.
/// - `timeout_secs`: request timeout.
/// - `rate_limit`: fixed-window call ceiling shared by every call through the gateway.
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub dim: usize,
    pub timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
}

/// Fixed-window call ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Calls allowed per window.
    pub max_calls: u64,
    /// Window length; the counter resets once per period.
    pub period: Duration,
    /// How often a blocked caller re-checks the window.
    pub poll_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 299_000,
            period: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
        }
    }
}
