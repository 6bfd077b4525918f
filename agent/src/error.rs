//! Error types for the chat agent client

use thiserror::Error;

/// Errors that can occur when talking to the chat agent
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// HTTP request failed (connection refused, DNS, TLS)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The agent did not answer within the configured timeout
    #[error("Agent timed out")]
    Timeout,

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Agent returned a non-success status
    #[error("Agent error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}
