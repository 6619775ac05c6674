/// Object-storage container resource: definition and create/read/update/delete
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::swift::{CreateOpts, ObjectStorage, UpdateOpts};

/// Longest container name the object store accepts
const MAX_NAME_LEN: usize = 256;

/// Versioning mode of a container, each carrying the location container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VersioningEntry", into = "VersioningEntry")]
pub enum Versioning {
    /// Prior object versions are kept in the location container
    Versions(String),
    /// Prior versions and deletion markers are kept in the location container
    History(String),
}

impl Versioning {
    pub fn location(&self) -> &str {
        match self {
            Versioning::Versions(location) | Versioning::History(location) => location,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Versioning::Versions(_) => "versions",
            Versioning::History(_) => "history",
        }
    }
}

/// `{type, location}` form of [`Versioning`] used in configuration and state files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningEntry {
    #[serde(rename = "type")]
    kind: String,
    location: String,
}

impl TryFrom<VersioningEntry> for Versioning {
    type Error = String;

    fn try_from(entry: VersioningEntry) -> Result<Self, Self::Error> {
        match entry.kind.to_ascii_lowercase().as_str() {
            "versions" => Ok(Versioning::Versions(entry.location)),
            "history" => Ok(Versioning::History(entry.location)),
            other => Err(format!(
                "unknown versioning type '{}', expected 'versions' or 'history'",
                other
            )),
        }
    }
}

impl From<Versioning> for VersioningEntry {
    fn from(versioning: Versioning) -> Self {
        VersioningEntry {
            kind: versioning.kind().to_string(),
            location: versioning.location().to_string(),
        }
    }
}

/// Declared configuration of a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name; also the resource identifier
    pub name: String,

    /// Region (defaults to the provider region); changing it replaces the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_read: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_write: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_sync_to: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_sync_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<Versioning>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Delete all objects when the container is not empty on destroy
    #[serde(default)]
    pub force_destroy: bool,
}

impl ContainerSpec {
    /// Validate the declaration
    pub fn validate(&self) -> Result<()> {
        validate_container_name(&self.name)?;

        if let Some(versioning) = &self.versioning {
            if !versioning.location().is_empty() {
                validate_container_name(versioning.location())
                    .with_context(|| format!("invalid versioning location for {}", self.name))?;
            }
        }

        for key in self.metadata.keys() {
            // The object store lower-cases header names, so only lower-case keys read back unchanged
            let valid = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
            if !valid {
                anyhow::bail!(
                    "invalid metadata key '{}' on container {}: use lower-case letters, digits and '-'",
                    key,
                    self.name
                );
            }
        }

        Ok(())
    }

    /// Region of the container, falling back to the provider default
    pub fn region_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.region.as_deref().unwrap_or(default)
    }
}

fn validate_container_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("container name cannot be empty");
    }
    if name.len() > MAX_NAME_LEN {
        anyhow::bail!("container name exceeds {} bytes: {}", MAX_NAME_LEN, name);
    }
    if name.contains('/') {
        anyhow::bail!("container name cannot contain '/': {}", name);
    }
    Ok(())
}

/// Local record of a managed container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Remote identifier (the container name); `None` once the container is gone
    pub id: Option<String>,

    /// Last applied or read attributes
    pub attributes: ContainerSpec,
}

impl ContainerState {
    /// State for adopting an existing container by name
    pub fn import(name: &str, region: Option<String>) -> Self {
        Self {
            id: Some(name.to_string()),
            attributes: ContainerSpec {
                name: name.to_string(),
                region,
                ..Default::default()
            },
        }
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }
}

/// Container failures that are not plain request errors
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("found location for both exclusive versioning types on container '{id}', versions ('{versions}') and history ('{history}')")]
    ConflictingVersioning {
        id: String,
        versions: String,
        history: String,
    },

    #[error("container '{id}' cannot change {field} in place, it must be replaced")]
    ImmutableField { id: String, field: &'static str },

    #[error("container '{id}' still not deleted after {attempts} attempts")]
    DeleteAttemptsExhausted { id: String, attempts: u32 },

    #[error("container has no identifier, it was never created or is already deleted")]
    MissingId,
}

/// Container manager for one region of object storage
pub struct ContainerManager {
    storage: Arc<dyn ObjectStorage>,
    region: String,
    delete_attempts: u32,
}

impl ContainerManager {
    /// Create a new container manager
    pub fn new(storage: Arc<dyn ObjectStorage>, region: impl Into<String>) -> Self {
        Self {
            storage,
            region: region.into(),
            delete_attempts: 5,
        }
    }

    /// Bound the number of delete attempts made when force-destroying
    pub fn with_delete_attempts(mut self, attempts: u32) -> Self {
        self.delete_attempts = attempts.max(1);
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Create the container and record its identifier
    pub async fn create(&self, spec: &ContainerSpec, state: &mut ContainerState) -> Result<()> {
        let opts = create_opts(spec);
        debug!(
            "Create options for container {}: {:?}",
            spec.name,
            header_names(&opts.headers())
        );

        self.storage
            .create_container(&spec.name, &opts)
            .await
            .with_context(|| format!("error creating container '{}'", spec.name))?;

        info!("Container created with ID: {} (region {})", spec.name, self.region());

        state.id = Some(spec.name.clone());
        state.attributes = spec.clone();
        state.attributes.region = Some(self.region.clone());

        self.read(state).await
    }

    /// Refresh the state from the remote container
    ///
    /// A container that no longer exists clears the identifier instead of failing.
    pub async fn read(&self, state: &mut ContainerState) -> Result<()> {
        let id = state.id.clone().ok_or(ContainerError::MissingId)?;

        let headers = match self.storage.get_container(&id).await {
            Ok(headers) => headers,
            Err(e) if e.is_not_found() => {
                warn!("Container '{}' not found, removing it from state", id);
                state.id = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("error reading container '{}'", id));
            }
        };
        debug!("Retrieved headers for container '{}': {:?}", id, headers);

        if let (Some(versions), Some(history)) =
            (&headers.versions_location, &headers.history_location)
        {
            return Err(ContainerError::ConflictingVersioning {
                id,
                versions: versions.clone(),
                history: history.clone(),
            }
            .into());
        }

        let attributes = &mut state.attributes;
        attributes.name = id;
        attributes.region = Some(self.region.clone());

        if headers.read.first().is_some_and(|entry| !entry.is_empty()) {
            attributes.container_read = headers.read.join(",");
        }
        if headers.write.first().is_some_and(|entry| !entry.is_empty()) {
            attributes.container_write = headers.write.join(",");
        }

        if let Some(location) = headers.versions_location {
            attributes.versioning = Some(Versioning::Versions(location));
        } else if let Some(location) = headers.history_location {
            attributes.versioning = Some(Versioning::History(location));
        }

        attributes.metadata = headers.metadata;

        Ok(())
    }

    /// Apply changed attributes in place, then refresh
    pub async fn update(&self, desired: &ContainerSpec, state: &mut ContainerState) -> Result<()> {
        let id = state.id.clone().ok_or(ContainerError::MissingId)?;

        if desired.name != id {
            return Err(ContainerError::ImmutableField { id, field: "name" }.into());
        }
        let prior_region = state.attributes.region.as_deref().unwrap_or(&self.region);
        if desired.region_or(&self.region) != self.region || prior_region != self.region {
            return Err(ContainerError::ImmutableField {
                id,
                field: "region",
            }
            .into());
        }

        let opts = update_opts(&state.attributes, desired);
        if opts.is_empty() {
            debug!("No remote attribute of container '{}' changed", id);
        } else {
            debug!(
                "Update options for container '{}': {:?}",
                id,
                header_names(&opts.headers())
            );
        }

        self.storage
            .update_container(&id, &opts)
            .await
            .with_context(|| format!("error updating container '{}'", id))?;

        info!("Container '{}' updated", id);

        state.attributes = desired.clone();
        state.attributes.region = Some(self.region.clone());

        self.read(state).await
    }

    /// Delete the container
    ///
    /// With `force_destroy` set, a conflict (container not empty) purges all
    /// objects and deletes again. At most `delete_attempts` purges run, and
    /// every purge is followed by a delete.
    pub async fn delete(&self, state: &mut ContainerState) -> Result<()> {
        let id = state.id.clone().ok_or(ContainerError::MissingId)?;
        let force_destroy = state.attributes.force_destroy;
        let mut purges = 0;

        loop {
            match self.storage.delete_container(&id).await {
                Ok(()) => {
                    info!("Container '{}' deleted", id);
                    state.id = None;
                    return Ok(());
                }
                Err(e) if e.is_conflict() && force_destroy => {
                    if purges == self.delete_attempts {
                        break;
                    }
                    purges += 1;
                    debug!(
                        "Force-destroying container '{}' (attempt {}/{}): {}",
                        id, purges, self.delete_attempts, e
                    );
                    let deleted = self.purge_objects(&id).await?;
                    info!("Deleted {} objects from container '{}'", deleted, id);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("error deleting container '{}'", id));
                }
            }
        }

        Err(ContainerError::DeleteAttemptsExhausted {
            id,
            attempts: self.delete_attempts,
        }
        .into())
    }

    /// Fetch live headers without touching any state
    pub async fn inspect(&self, name: &str) -> Result<crate::swift::ContainerHeaders> {
        self.storage
            .get_container(name)
            .await
            .with_context(|| format!("error reading container '{}'", name))
    }

    /// Delete every object in the container, one listing page at a time
    async fn purge_objects(&self, container: &str) -> Result<usize> {
        let mut marker: Option<String> = None;
        let mut deleted = 0;

        loop {
            let page = self
                .storage
                .list_object_names(container, marker.as_deref())
                .await
                .with_context(|| format!("error listing objects of container '{}'", container))?;
            if page.is_empty() {
                break;
            }

            for object in &page.names {
                match self.storage.delete_object(container, object).await {
                    Ok(()) => deleted += 1,
                    Err(e) if e.is_not_found() => {
                        debug!("Object '{}' already gone from '{}'", object, container);
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!(
                                "error deleting object '{}' from container '{}'",
                                object, container
                            )
                        });
                    }
                }
            }

            marker = page.next_marker().map(str::to_string);
        }

        Ok(deleted)
    }
}

/// Build the creation request for a declaration
pub fn create_opts(spec: &ContainerSpec) -> CreateOpts {
    let mut opts = CreateOpts {
        container_read: spec.container_read.clone(),
        container_write: spec.container_write.clone(),
        container_sync_to: spec.container_sync_to.clone(),
        container_sync_key: spec.container_sync_key.clone(),
        content_type: spec.content_type.clone(),
        metadata: spec.metadata.clone(),
        ..Default::default()
    };

    match &spec.versioning {
        Some(Versioning::Versions(location)) => opts.versions_location = location.clone(),
        Some(Versioning::History(location)) => opts.history_location = location.clone(),
        None => {}
    }

    opts
}

/// Build an update request carrying only what changed between `prior` and `desired`
pub fn update_opts(prior: &ContainerSpec, desired: &ContainerSpec) -> UpdateOpts {
    fn changed(prior: &str, desired: &str) -> Option<String> {
        (prior != desired).then(|| desired.to_string())
    }

    let mut opts = UpdateOpts {
        container_read: changed(&prior.container_read, &desired.container_read),
        container_write: changed(&prior.container_write, &desired.container_write),
        container_sync_to: changed(&prior.container_sync_to, &desired.container_sync_to),
        container_sync_key: changed(&prior.container_sync_key, &desired.container_sync_key),
        content_type: changed(&prior.content_type, &desired.content_type),
        ..Default::default()
    };

    if prior.versioning != desired.versioning {
        match &desired.versioning {
            Some(versioning) if !versioning.location().is_empty() => match versioning {
                Versioning::Versions(location) => opts.versions_location = Some(location.clone()),
                Versioning::History(location) => opts.history_location = Some(location.clone()),
            },
            _ => {
                opts.remove_versions_location = true;
                opts.remove_history_location = true;
            }
        }
    }

    if prior.metadata != desired.metadata {
        opts.metadata = Some(desired.metadata.clone());
        opts.remove_metadata = prior
            .metadata
            .keys()
            .filter(|key| !desired.metadata.contains_key(*key))
            .cloned()
            .collect();
    }

    opts
}

fn header_names(headers: &[(String, String)]) -> Vec<&str> {
    headers.iter().map(|(name, _)| name.as_str()).collect()
}
