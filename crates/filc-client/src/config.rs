//! Client configuration

use std::time::Duration;

/// Default provider gateway endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1234/rpc/v0";

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// Bearer token for the gateway
    pub access_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("filc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
