//! External collaborators: text generation and code-example lookup
//!
//! The engine only sees these traits; concrete clients are injected at
//! construction so tests can substitute stubs.

pub mod github;
pub mod openrouter;

pub use github::GithubExamples;
pub use openrouter::OpenRouterClient;

use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of an external collaborator
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider unreachable or returned a server-side failure
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider rejected the request due to rate limiting
    #[error("rate limited")]
    RateLimited,

    /// Provider answered but the response could not be interpreted
    #[error("malformed provider response: {0}")]
    Parse(String),

    /// Non-retryable API error (bad request, auth failure)
    #[error("provider API error: {0}")]
    Api(String),
}

impl ProviderError {
    /// Whether a bounded-backoff retry is worthwhile
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_) | ProviderError::RateLimited)
    }
}

/// Text-generation collaborator (LLM chat completion)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;
}

/// A code example fetched from an external source
#[derive(Debug, Clone)]
pub struct CodeExample {
    /// Where the example came from (repo path, URL)
    pub source: String,
    pub content: String,
}

/// Best-effort code-example lookup collaborator
#[async_trait]
pub trait ExampleSource: Send + Sync {
    async fn search_examples(
        &self,
        technology: &str,
        limit: usize,
    ) -> Result<Vec<CodeExample>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Unavailable("503".into()).is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(!ProviderError::Parse("bad json".into()).is_retryable());
        assert!(!ProviderError::Api("401".into()).is_retryable());
    }
}
