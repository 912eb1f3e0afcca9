//! The I/O the application's tasks reach through their context

use crate::config::AppConfig;
use statekit_entities::GatewayEnvironment;
use statekit_gateway::{CredentialStore, GatewayError, HttpGateway, RequestGateway};
use std::fmt;
use std::sync::Arc;

/// Gateway, credential store and settings shared by every task
#[derive(Clone)]
pub struct AppEnvironment {
    gateway: Arc<dyn HttpGateway>,
    credentials: Arc<dyn CredentialStore>,
    config: Arc<AppConfig>,
}

impl AppEnvironment {
    /// An environment over explicit collaborators
    #[must_use]
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn HttpGateway>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            config: Arc::new(config),
        }
    }

    /// An environment talking to the configured backend over HTTP
    ///
    /// The gateway and the auth flow share `credentials`, so a token stored at
    /// login is attached to every later request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BuildFailed`] if the HTTP client cannot be built.
    pub fn live(config: AppConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self, GatewayError> {
        let gateway = RequestGateway::new(config.gateway_config(), Arc::clone(&credentials))?;
        Ok(Self::new(config, Arc::new(gateway), credentials))
    }

    /// Where the bearer token lives
    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    /// The settings this environment was built from
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl GatewayEnvironment for AppEnvironment {
    fn gateway(&self) -> &dyn HttpGateway {
        self.gateway.as_ref()
    }
}

impl fmt::Debug for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppEnvironment")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
