//! Text-rewriting model abstraction for the polishing pipeline.

mod openai;

pub use openai::OpenAiRewriter;

use crate::error::Result;
use async_trait::async_trait;

/// Client interface to a text-rewriting model.
///
/// Rate limiting must surface as [`TolkError::RateLimited`] so the pipeline
/// can apply its cooldown-and-retry policy; other transport failures surface
/// as [`TolkError::Fetch`].
///
/// [`TolkError::RateLimited`]: crate::error::TolkError::RateLimited
/// [`TolkError::Fetch`]: crate::error::TolkError::Fetch
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// Send one rewrite request and return the model's raw text response.
    async fn rewrite(&self, prompt: &str) -> Result<String>;
}
