//! Unified error handling for `embedding-service`.
//!
//! A single top-level error type [`EmbeddingError`] covers the whole crate;
//! configuration problems are grouped in [`ConfigError`]. Small helpers for
//! reading and validating variables from an env-like lookup are provided here
//! and used by [`crate::config::default_config`].
//!
//! All messages include the suffix `[Embedding Service]` to simplify
//! attribution in logs.

use reqwest::StatusCode;
use thiserror::Error;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `embedding-service` crate.
///
/// Every variant is a provider-side failure from the pipeline's point of view:
/// the gateway never retries, so the caller decides what to do with the chunk.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Configuration/validation errors (startup).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying HTTP transport error (connect, timeout, body read).
    #[error("[Embedding Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("[Embedding Service] HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Short snippet of the response body.
        snippet: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("[Embedding Service] decode error: {0}")]
    Decode(String),

    /// Provider returned a different number of vectors than inputs sent.
    #[error("[Embedding Service] got {got} embeddings for {want} inputs")]
    CountMismatch { got: usize, want: usize },

    /// A returned vector has the wrong dimensionality.
    #[error("[Embedding Service] vector size mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    /// Provider-specific failure not covered above (used by custom providers).
    #[error("[Embedding Service] provider failure: {0}")]
    Provider(String),
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Errors that realistically happen at config load/validation time.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[Embedding Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (limits, timeouts, dimensions).
    #[error("[Embedding Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `EMBEDDING_DIM`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u64`).
        reason: &'static str,
    },

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[Embedding Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[Embedding Service] {field} is out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: &'static str,
    },

    /// Model name was empty.
    #[error("[Embedding Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Lookup helpers                                                            */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty variable.
///
/// # Errors
/// [`ConfigError::MissingVar`] if the variable is absent or blank.
pub fn must_var<F>(lookup: &F, name: &'static str) -> std::result::Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Returns a non-blank variable or the given default.
pub fn var_or<F>(lookup: &F, name: &'static str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parses an optional `u64` (`Ok(None)` if unset/blank).
///
/// # Errors
/// [`ConfigError::InvalidNumber`] if set but not a valid `u64`.
pub fn var_opt_u64<F>(lookup: &F, name: &'static str) -> std::result::Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => {
            v.trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected u64",
                })
        }
        _ => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// [`ConfigError::InvalidFormat`] when the scheme is missing.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> std::result::Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

/// Trims a response body to a log-friendly snippet (first 300 chars).
pub fn make_snippet(text: &str) -> String {
    const MAX: usize = 300;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |k| {
            pairs
                .iter()
                .find(|(name, _)| *name == k)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn blank_required_var_is_missing() {
        let lookup = lookup_from(&[("OPENAI_API_KEY", "   ")]);
        assert_eq!(
            must_var(&lookup, "OPENAI_API_KEY"),
            Err(ConfigError::MissingVar("OPENAI_API_KEY"))
        );
    }

    #[test]
    fn optional_number_parses_or_errors() {
        let lookup = lookup_from(&[("A", "42"), ("B", "forty")]);
        assert_eq!(var_opt_u64(&lookup, "A"), Ok(Some(42)));
        assert_eq!(var_opt_u64(&lookup, "C"), Ok(None));
        assert!(matches!(
            var_opt_u64(&lookup, "B"),
            Err(ConfigError::InvalidNumber { var: "B", .. })
        ));
    }

    #[test]
    fn snippet_is_clamped() {
        let long = "x".repeat(1000);
        let s = make_snippet(&long);
        assert_eq!(s.chars().count(), 301);
        assert_eq!(make_snippet("  short  "), "short");
    }
}
