//! Unified error types for the crate.

use embedding_service::EmbeddingError;
use reqwest::StatusCode;
use thiserror::Error;

/// Top-level error for log-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O or filesystem errors (log file reading).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Network-level failure talking to the vector store.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a status that is not worth retrying.
    #[error("{op} rejected by store: HTTP {status}: {body}")]
    Rejected {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    /// Retryable failures persisted through every attempt.
    #[error("{op} failed after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        op: &'static str,
        attempts: u32,
        last: String,
    },

    /// The store answered 2xx with a body we could not read.
    #[error("decode error in {op}: {reason}")]
    Decode { op: &'static str, reason: String },

    /// Embedding batch failed (ingestion aborts the chunk).
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}
