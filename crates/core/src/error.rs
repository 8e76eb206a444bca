//! Error types for the Threadline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Threadline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Prompt construction errors ---
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// A message field failed validation; such messages are never stored.
    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("Request is empty")]
    EmptyRequest,

    #[error("Token limit exceeded: {used} tokens used, limit is {limit}")]
    TokenLimitExceeded { used: usize, limit: usize },

    #[error("Prompt is incomplete: {0}")]
    IncompletePrompt(String),

    #[error("No response at index {0}")]
    ResponseIndex(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Dangling reference: {hash} does not exist in the store")]
    DanglingReference { hash: String },

    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Corrupt store at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Prompt {0} is not a topic root")]
    NotTopicRoot(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn token_limit_error_names_both_counts() {
        let err = Error::from(PromptError::TokenLimitExceeded {
            used: 120,
            limit: 100,
        });
        assert!(err.to_string().contains("120"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn dangling_reference_names_hash() {
        let err = Error::Store(StoreError::DanglingReference {
            hash: "abc123".into(),
        });
        assert!(err.to_string().contains("abc123"));
    }
}
