//! Error types for the external provider seams.
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, timeouts, rate limits
//! - NonRetryable: malformed output, bad session references
//!
//! Nothing in the orchestration layer propagates these to the caller as a
//! failed turn — every provider failure degrades to a valid response with an
//! informative chat message.

use thiserror::Error;

/// Failures from the text-generation service or the session store.
#[derive(Debug, Error)]
pub enum ProviderError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Provider rate limit exceeded")]
    RateLimit,

    // Non-retryable errors
    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Session lookup failed: {0}")]
    SessionLookup(String),
}

impl ProviderError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Timeout(_) | ProviderError::RateLimit
        )
    }
}
