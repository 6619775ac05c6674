/// Configuration management for Silo
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::resource::container::{ContainerSpec, Versioning};

/// Main configuration: provider credentials plus the desired containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiloConfig {
    /// Object-storage provider configuration
    pub provider: ProviderConfig,

    /// Containers to manage
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

/// Object-storage provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Default region for containers that do not name one
    pub region: String,

    /// Pre-issued auth token (can also be set via OS_AUTH_TOKEN env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Account endpoint per region, used together with `token`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<String, String>,

    /// Keystone password authentication, used when no static endpoint matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystone: Option<KeystoneConfig>,

    /// Maximum container delete attempts when force-destroying
    #[serde(default = "default_delete_attempts")]
    pub delete_attempts: u32,
}

/// Keystone v3 identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoneConfig {
    /// Identity endpoint (e.g., "https://keystone.example.com/v3")
    pub auth_url: String,

    pub username: String,

    /// Password (can also be set via OS_PASSWORD env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    pub project_name: String,

    #[serde(default = "default_domain")]
    pub user_domain_name: String,

    #[serde(default = "default_domain")]
    pub project_domain_name: String,

    /// Catalog interface to use (public, internal or admin)
    #[serde(default = "default_interface")]
    pub interface: String,
}

fn default_delete_attempts() -> u32 {
    5
}

fn default_domain() -> String {
    "Default".to_string()
}

fn default_interface() -> String {
    "public".to_string()
}

impl SiloConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SiloConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.provider.region.is_empty() {
            anyhow::bail!("provider.region cannot be empty");
        }

        if self.provider.delete_attempts == 0 {
            anyhow::bail!("provider.delete_attempts must be at least 1");
        }

        if let Some(keystone) = &self.provider.keystone {
            if !keystone.auth_url.starts_with("http://") && !keystone.auth_url.starts_with("https://") {
                anyhow::bail!("Invalid keystone auth_url: {}", keystone.auth_url);
            }
        }

        let mut names = HashSet::new();
        for container in &self.containers {
            container.validate()?;
            if !names.insert(container.name.as_str()) {
                anyhow::bail!("container {} is declared more than once", container.name);
            }
        }

        Ok(())
    }

    /// Look up a container declaration by name
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            provider: ProviderConfig {
                region: "RegionOne".to_string(),
                token: None,
                endpoints: BTreeMap::new(),
                keystone: Some(KeystoneConfig {
                    auth_url: "https://keystone.example.com/v3".to_string(),
                    username: "demo".to_string(),
                    password: None,
                    project_name: "demo".to_string(),
                    user_domain_name: default_domain(),
                    project_domain_name: default_domain(),
                    interface: default_interface(),
                }),
                delete_attempts: default_delete_attempts(),
            },
            containers: vec![
                ContainerSpec {
                    name: "assets-versions".to_string(),
                    ..Default::default()
                },
                ContainerSpec {
                    name: "assets".to_string(),
                    container_read: ".r:*,.rlistings".to_string(),
                    content_type: "application/octet-stream".to_string(),
                    versioning: Some(Versioning::Versions("assets-versions".to_string())),
                    metadata: [("owner".to_string(), "web".to_string())]
                        .into_iter()
                        .collect(),
                    force_destroy: true,
                    ..Default::default()
                },
            ],
        }
    }
}

impl ProviderConfig {
    /// Get the static auth token from config or environment
    pub fn get_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("OS_AUTH_TOKEN").ok())
    }
}

impl KeystoneConfig {
    /// Get the Keystone password from config or environment
    pub fn get_password(&self) -> anyhow::Result<String> {
        self.password
            .clone()
            .or_else(|| std::env::var("OS_PASSWORD").ok())
            .ok_or_else(|| anyhow::anyhow!(
                "Keystone password not found. Set OS_PASSWORD environment variable or specify in config"
            ))
    }
}
