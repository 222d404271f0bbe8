//! Error types for the chat completion client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Chat completion client errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration error (missing API key, invalid endpoint)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection refused, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not a valid chat completion envelope
    #[error("Invalid response envelope: {0}")]
    Envelope(String),
}

impl LlmError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Rate limiting, request timeouts and server-side failures are transient.
    /// Other 4xx statuses mean the request itself is wrong and will not get better.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Config(_) => false,
            LlmError::Network(_) | LlmError::Timeout(_) | LlmError::Envelope(_) => true,
            LlmError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
        }
    }
}
