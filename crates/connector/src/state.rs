//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ConnectorConfig;
use crate::provisioning::Provisioner;
use crate::smc::{SmcClient, SmcError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds no session: every request opens and
/// closes its own SMC session through the provisioner's client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    provisioner: Provisioner,
    product_name: String,
    public_url: String,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `provisioner` - Gateway for single-administrator writes
    /// * `product_name` - Name token issuers must present
    /// * `public_url` - Scheme, host and port the API is reachable on
    #[must_use]
    pub fn new(
        provisioner: Provisioner,
        product_name: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                provisioner,
                product_name: product_name.into(),
                public_url: public_url.into().trim_end_matches('/').to_owned(),
            }),
        }
    }

    /// Build the state from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMC HTTP client cannot be built.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, SmcError> {
        let client = SmcClient::new(config.smc.endpoint())?;
        let provisioner = Provisioner::new(
            client,
            config.role_defaults.clone(),
            config.directory.ldap_domain.clone(),
            config.directory.users_ou.clone(),
        );
        let scheme = if config.tls.is_some() { "https" } else { "http" };

        Ok(Self::new(
            provisioner,
            config.smc.name.clone(),
            format!("{scheme}://{}", config.socket_addr()),
        ))
    }

    #[must_use]
    pub fn provisioner(&self) -> &Provisioner {
        &self.inner.provisioner
    }

    /// Get a reference to the SMC client.
    #[must_use]
    pub fn smc(&self) -> &SmcClient {
        self.inner.provisioner.client()
    }

    /// Product name the token permission check compares against.
    #[must_use]
    pub fn product_name(&self) -> &str {
        &self.inner.product_name
    }

    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.inner.public_url
    }
}
