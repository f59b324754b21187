//! Embedding providers.

use std::{future::Future, pin::Pin};

use crate::error_handler::EmbeddingError;

pub mod open_ai_service;

/// Boxed future returned by [`EmbeddingsProvider::embed_batch`].
pub type EmbedFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send + 'a>>;

/// Provider interface for batch embedding generation.
///
/// Implementations must return exactly one vector per input, in input order.
/// The gateway double-checks the count, so a misbehaving provider surfaces as
/// [`EmbeddingError::CountMismatch`] instead of misaligned points.
pub trait EmbeddingsProvider: Send + Sync {
    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Embeds an ordered batch of texts in a single round trip.
    fn embed_batch<'a>(&'a self, inputs: &'a [String]) -> EmbedFuture<'a>;
}
