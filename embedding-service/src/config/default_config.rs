//! Default embedding config loaded from environment variables.
//!
//! # Environment variables
//!
//! - `OPENAI_API_KEY`                    = bearer token (mandatory)
//! - `OPENAI_URL`                        = provider base URL (default `https://api.openai.com`)
//! - `EMBEDDING_MODEL`                   = model id (default `text-embedding-3-small`)
//! - `EMBEDDING_DIM`                     = vector length (default `1536`)
//! - `EMBEDDING_TIMEOUT_SECS`            = request timeout (default `60`)
//! - `EMBEDDING_RATE_LIMIT_MAX_CALLS`    = calls per window (default `299000`)
//! - `EMBEDDING_RATE_LIMIT_PERIOD_SECS`  = window length (default `60`)
//! - `EMBEDDING_RATE_LIMIT_POLL_MS`      = blocked-caller poll interval (default `100`)

use std::time::Duration;

use crate::{
    config::embedding_model_config::{EmbeddingModelConfig, RateLimitConfig},
    error_handler::{ConfigError, must_var, validate_http_endpoint, var_opt_u64, var_or},
};

/// Builds the OpenAI embedding config from the process environment.
///
/// # Errors
/// See [`config_openai_from_lookup`].
pub fn config_openai_embedding() -> Result<EmbeddingModelConfig, ConfigError> {
    config_openai_from_lookup(|k| std::env::var(k).ok())
}

/// Builds the OpenAI embedding config from an env-like lookup.
///
/// # Errors
/// - [`ConfigError::MissingVar`] if `OPENAI_API_KEY` is absent
/// - [`ConfigError::InvalidNumber`] for unparsable numeric variables
/// - [`ConfigError::InvalidFormat`] if `OPENAI_URL` is not http(s)
/// - [`ConfigError::OutOfRange`] for zero dimension, capacity or period
pub fn config_openai_from_lookup<F>(lookup: F) -> Result<EmbeddingModelConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = must_var(&lookup, "OPENAI_API_KEY")?;
    let endpoint = var_or(&lookup, "OPENAI_URL", "https://api.openai.com");
    validate_http_endpoint("OPENAI_URL", &endpoint)?;

    let model = var_or(&lookup, "EMBEDDING_MODEL", "text-embedding-3-small");
    let dim = var_opt_u64(&lookup, "EMBEDDING_DIM")?.unwrap_or(1536) as usize;
    let timeout_secs = var_opt_u64(&lookup, "EMBEDDING_TIMEOUT_SECS")?.unwrap_or(60);

    let defaults = RateLimitConfig::default();
    let rate_limit = RateLimitConfig {
        max_calls: var_opt_u64(&lookup, "EMBEDDING_RATE_LIMIT_MAX_CALLS")?
            .unwrap_or(defaults.max_calls),
        period: var_opt_u64(&lookup, "EMBEDDING_RATE_LIMIT_PERIOD_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.period),
        poll_interval: var_opt_u64(&lookup, "EMBEDDING_RATE_LIMIT_POLL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval),
    };

    let cfg = EmbeddingModelConfig {
        model,
        endpoint,
        api_key: Some(api_key),
        dim,
        timeout_secs,
        rate_limit,
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Validates value ranges that the env parser cannot express.
///
/// # Errors
/// [`ConfigError::EmptyModel`] or [`ConfigError::OutOfRange`].
pub fn validate(cfg: &EmbeddingModelConfig) -> Result<(), ConfigError> {
    if cfg.model.trim().is_empty() {
        return Err(ConfigError::EmptyModel);
    }
    if cfg.dim == 0 {
        return Err(ConfigError::OutOfRange {
            field: "EMBEDDING_DIM",
            detail: "must be > 0",
        });
    }
    if cfg.rate_limit.max_calls == 0 {
        return Err(ConfigError::OutOfRange {
            field: "EMBEDDING_RATE_LIMIT_MAX_CALLS",
            detail: "must be > 0",
        });
    }
    if cfg.rate_limit.period.is_zero() {
        return Err(ConfigError::OutOfRange {
            field: "EMBEDDING_RATE_LIMIT_PERIOD_SECS",
            detail: "must be > 0",
        });
    }
    Ok(())
}
