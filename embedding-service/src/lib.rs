//! Batch embedding gateway used by the log ingestion pipeline.
//!
//! - [`services::EmbeddingsProvider`] is the provider seam (batch in, vectors out).
//! - [`services::open_ai_service::OpenAiService`] talks to an OpenAI-compatible `/v1/embeddings`.
//! - [`rate_limit::RateLimitWindow`] is a fixed-window call ceiling shared by all calls.
//! - [`gateway::EmbeddingGateway`] puts the two together and checks alignment of the result.
//!
//! Construct the gateway once, wrap it in `Arc`, and pass clones to dependents.

pub mod config;
pub mod error_handler;
pub mod gateway;
pub mod rate_limit;
pub mod services;

pub use config::embedding_model_config::{EmbeddingModelConfig, RateLimitConfig};
pub use error_handler::{ConfigError, EmbeddingError};
pub use gateway::EmbeddingGateway;
pub use rate_limit::{Clock, RateLimitWindow, SystemClock};
pub use services::EmbeddingsProvider;
