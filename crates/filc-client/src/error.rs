//! Client error types

use filc_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the gateway
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON-RPC error object in the response
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        CoreError::Provider(err.to_string())
    }
}
