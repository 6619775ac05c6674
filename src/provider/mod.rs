/// Region-aware object-storage client factory
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::resource::ContainerManager;
use crate::swift::auth::KeystoneSession;
use crate::swift::{ObjectStorage, SwiftClient};

/// Turns a region into an authenticated object-storage client
///
/// Built once from configuration and handed to every operation. A Keystone
/// session, when configured, is authenticated on first use and reused.
pub struct Provider {
    config: ProviderConfig,
    session: OnceCell<KeystoneSession>,
}

impl Provider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    /// Region used by containers that do not declare one
    pub fn default_region(&self) -> &str {
        &self.config.region
    }

    /// Build a client for a region
    pub async fn client(&self, region: &str) -> Result<Arc<dyn ObjectStorage>> {
        if let Some(endpoint) = self.config.endpoints.get(region) {
            let token = match self.config.get_token() {
                Some(token) => token,
                None => self.session().await?.token.clone(),
            };
            debug!("Using configured endpoint for region {}: {}", region, endpoint);
            let client = SwiftClient::new(endpoint, &token)
                .with_context(|| format!("error creating object storage client for region {}", region))?;
            return Ok(Arc::new(client));
        }

        if self.config.keystone.is_none() {
            anyhow::bail!(
                "No object-storage endpoint configured for region {} and no keystone section to discover one",
                region
            );
        }

        let session = self.session().await?;
        let interface = self
            .config
            .keystone
            .as_ref()
            .map(|k| k.interface.as_str())
            .unwrap_or("public");
        let endpoint = session.object_store_endpoint(region, interface)?;
        debug!("Discovered endpoint for region {}: {}", region, endpoint);

        let client = SwiftClient::new(&endpoint, &session.token)
            .with_context(|| format!("error creating object storage client for region {}", region))?;
        Ok(Arc::new(client))
    }

    /// Build a container manager for a region
    pub async fn manager(&self, region: &str) -> Result<ContainerManager> {
        let client = self.client(region).await?;
        Ok(ContainerManager::new(client, region).with_delete_attempts(self.config.delete_attempts))
    }

    async fn session(&self) -> Result<&KeystoneSession> {
        self.session
            .get_or_try_init(|| async {
                let keystone = self.config.keystone.as_ref().context(
                    "No auth token available. Set OS_AUTH_TOKEN, provider.token or a keystone section",
                )?;
                let password = keystone.get_password()?;
                let session = KeystoneSession::authenticate(keystone, &password).await?;
                info!("Authenticated against {}", keystone.auth_url);
                Ok::<_, anyhow::Error>(session)
            })
            .await
    }
}
