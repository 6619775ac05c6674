/// Keystone v3 password authentication and service catalog lookup
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::KeystoneConfig;

/// Catalog service type of object storage
const OBJECT_STORE: &str = "object-store";

/// An authenticated identity session
#[derive(Debug, Clone)]
pub struct KeystoneSession {
    pub token: String,
    pub catalog: Vec<CatalogEntry>,
}

/// Service catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// Service endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

impl Endpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

impl KeystoneSession {
    /// Authenticate with username and password, scoped to a project
    pub async fn authenticate(config: &KeystoneConfig, password: &str) -> Result<Self> {
        let url = format!("{}/auth/tokens", config.auth_url.trim_end_matches('/'));
        info!("Authenticating as {} against {}", config.username, url);

        let request = serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": config.username,
                            "domain": { "name": config.user_domain_name },
                            "password": password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": config.project_name,
                        "domain": { "name": config.project_domain_name },
                    }
                }
            }
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send authentication request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Authentication failed with status {}: {}", status, error_text);
        }

        let token = response
            .headers()
            .get("X-Subject-Token")
            .context("Authentication response carried no X-Subject-Token header")?
            .to_str()
            .context("X-Subject-Token header is not valid text")?
            .to_string();

        let body: TokenResponse = response
            .json()
            .await
            .context("Failed to parse authentication response")?;

        debug!("Service catalog has {} entries", body.token.catalog.len());

        Ok(Self {
            token,
            catalog: body.token.catalog,
        })
    }

    /// Find the object-storage endpoint for a region and interface
    pub fn object_store_endpoint(&self, region: &str, interface: &str) -> Result<String> {
        self.catalog
            .iter()
            .filter(|entry| entry.service_type == OBJECT_STORE)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| endpoint.interface == interface && endpoint.in_region(region))
            .map(|endpoint| endpoint.url.clone())
            .with_context(|| {
                format!(
                    "No {} object-store endpoint found for region {}",
                    interface, region
                )
            })
    }
}
