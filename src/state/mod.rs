/// Local state file of managed containers
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::resource::ContainerState;

const STATE_VERSION: u32 = 1;

/// Recorded state of every managed container, keyed by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,

    #[serde(default)]
    pub containers: BTreeMap<String, StateEntry>,
}

/// One managed container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(flatten)]
    pub container: ContainerState,

    /// When the entry was last written
    pub updated_at: DateTime<Utc>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            containers: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load the state file; a missing file is an empty state
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let state: StateFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;

        if state.version != STATE_VERSION {
            anyhow::bail!(
                "Unsupported state file version {} in {}",
                state.version,
                path.display()
            );
        }

        Ok(state)
    }

    /// Write the state file through a temporary file and rename
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        let tmp = path.with_extension("tmp");

        tokio::fs::write(&tmp, yaml)
            .await
            .with_context(|| format!("Failed to write state file {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace state file {}", path.display()))?;

        debug!("State saved to {}", path.display());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ContainerState> {
        self.containers.get(name).map(|entry| &entry.container)
    }

    /// Names of all recorded containers, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }

    /// Record a container after an operation; one without an identifier is dropped
    pub fn record(&mut self, container: &ContainerState) {
        let name = container.attributes.name.clone();
        if container.exists() {
            self.containers.insert(
                name,
                StateEntry {
                    container: container.clone(),
                    updated_at: Utc::now(),
                },
            );
        } else {
            self.containers.remove(&name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
