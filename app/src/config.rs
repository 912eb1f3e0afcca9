//! Environment-based application configuration
//!
//! Every setting has a default suited to local development; staging and
//! production require the API root to be given explicitly.
//!
//! | Variable           | Meaning                                   | Default                      |
//! |--------------------|-------------------------------------------|------------------------------|
//! | `STATEKIT_ENV`     | `development`, `staging` or `production`  | `development`                |
//! | `API_ROOT`         | Base URL endpoints are resolved against   | `http://localhost:3000/api` (dev only) |
//! | `API_TIMEOUT_SECS` | Per-request timeout                       | 30 (dev), 15 (staging), 10 (prod) |
//! | `TOKEN_KEY`        | Credential key of the bearer token        | `token`                      |
//! | `PROFILE_ENDPOINT` | Where the auth flow loads the user from   | `/me`                        |
//! | `METRICS_ADDR`     | Prometheus scrape address                 | unset (no exporter)          |
//!
//! # Example
//!
//! ```
//! use statekit_app::config::{AppConfig, Environment};
//!
//! # fn main() -> Result<(), statekit_app::config::ConfigError> {
//! let config = AppConfig::load(Environment::Development)?;
//! assert_eq!(config.profile_endpoint, "/me");
//! assert!(config.metrics_addr.is_none());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use statekit_entities::Diagnostics;
use statekit_gateway::GatewayConfig;
use statekit_gateway::config::DEFAULT_TOKEN_KEY;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DEV_API_ROOT: &str = "http://localhost:3000/api";

/// Configuration error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),
    /// Invalid environment value
    #[error("Invalid environment: {0}")]
    InvalidEnvironment(String),
    /// A variable could not be parsed
    #[error("Failed to parse {name}: {reason}")]
    ParseError {
        /// The variable
        name: String,
        /// Parser message
        reason: String,
    },
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment (local)
    #[default]
    Development,
    /// Staging environment (pre-production)
    Staging,
    /// Production environment
    Production,
}

impl Environment {
    /// Get environment from string
    ///
    /// # Errors
    ///
    /// Returns error if environment string is invalid
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidEnvironment(s.to_string())),
        }
    }

    /// Check if this is production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is development environment
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// How loudly entity reducers report dropped records
    #[must_use]
    pub const fn diagnostics(self) -> Diagnostics {
        match self {
            Self::Development => Diagnostics::Verbose,
            Self::Staging | Self::Production => Diagnostics::Quiet,
        }
    }

    /// Default log filter when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_level(self) -> &'static str {
        match self {
            Self::Development => "debug",
            Self::Staging => "info",
            Self::Production => "warn",
        }
    }

    const fn default_timeout_secs(self) -> u64 {
        match self {
            Self::Development => 30,
            Self::Staging => 15,
            Self::Production => 10,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Base URL of the backend
    pub api_root: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Credential key holding the bearer token
    pub token_key: String,
    /// Endpoint the current user is loaded from after login
    pub profile_endpoint: String,
    /// Prometheus scrape address; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// Reads `STATEKIT_ENV` (defaults to "development") and the variables
    /// listed in the module docs.
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be loaded or is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration for specific environment, with every other setting
    /// at its default
    ///
    /// # Errors
    ///
    /// Returns error if the environment requires a setting that has no default
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        if !environment.is_development() {
            return Err(ConfigError::EnvVarNotSet("API_ROOT".to_string()));
        }
        let config = Self::for_environment(environment);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `lookup`, which maps variable names to values
    ///
    /// # Errors
    ///
    /// Returns error if a variable is malformed, a required one is missing,
    /// or the result does not validate
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("STATEKIT_ENV")
            .map_or(Ok(Environment::Development), |value| Environment::parse(&value))?;

        let mut config = Self::for_environment(environment);
        match lookup("API_ROOT") {
            Some(root) => config.api_root = root,
            None if !environment.is_development() => {
                return Err(ConfigError::EnvVarNotSet("API_ROOT".to_string()));
            },
            None => {},
        }

        if let Some(value) = lookup("API_TIMEOUT_SECS") {
            config.timeout_secs = parse("API_TIMEOUT_SECS", &value)?;
        }
        if let Some(key) = lookup("TOKEN_KEY") {
            config.token_key = key;
        }
        if let Some(endpoint) = lookup("PROFILE_ENDPOINT") {
            config.profile_endpoint = endpoint;
        }
        if let Some(value) = lookup("METRICS_ADDR") {
            config.metrics_addr = Some(parse("METRICS_ADDR", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            timeout_secs: environment.default_timeout_secs(),
            ..Self::default()
        }
    }

    /// Validate entire configuration
    ///
    /// # Errors
    ///
    /// Returns error if any setting is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.profile_endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "profile endpoint cannot be empty".to_string(),
            ));
        }
        if self.environment.is_production() && self.api_root.starts_with("http://") {
            return Err(ConfigError::ValidationError(
                "production API root must use https".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the request gateway
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(self.api_root.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_token_key(self.token_key.clone())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            api_root: DEV_API_ROOT.to_string(),
            timeout_secs: Environment::Development.default_timeout_secs(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            profile_endpoint: "/me".to_string(),
            metrics_addr: None,
        }
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
