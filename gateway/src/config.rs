//! Gateway configuration

use std::time::Duration;
use thiserror::Error;

/// Default credential key the bearer token is stored under
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Invalid gateway configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayConfigError {
    /// The API root is not an absolute http(s) URL
    #[error("API root must be an absolute http(s) URL, got '{0}'")]
    InvalidApiRoot(String),

    /// The timeout is zero
    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    /// The token key is empty
    #[error("Token key must not be empty")]
    EmptyTokenKey,
}

/// Settings for [`RequestGateway`](crate::RequestGateway)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Base URL relative endpoints are resolved against
    pub api_root: String,
    /// Per-request timeout (connect + response)
    pub timeout: Duration,
    /// Credential key holding the bearer token
    pub token_key: String,
}

impl GatewayConfig {
    /// Configuration for `api_root` with default timeout and token key
    #[must_use]
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            timeout: DEFAULT_TIMEOUT,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }

    /// Builder: Set the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: Set the credential key of the bearer token
    #[must_use]
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), GatewayConfigError> {
        let root_ok = reqwest::Url::parse(&self.api_root)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
        if !root_ok {
            return Err(GatewayConfigError::InvalidApiRoot(self.api_root.clone()));
        }
        if self.timeout.is_zero() {
            return Err(GatewayConfigError::ZeroTimeout);
        }
        if self.token_key.is_empty() {
            return Err(GatewayConfigError::EmptyTokenKey);
        }
        Ok(())
    }
}
