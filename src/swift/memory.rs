/// In-memory object storage used by resource tests
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::error::StorageError;
use super::models::{split_acl, ContainerHeaders, CreateOpts, ObjectPage, UpdateOpts};
use super::ObjectStorage;

/// A request received by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String, CreateOpts),
    Get(String),
    Update(String, UpdateOpts),
    Delete(String),
    List(String, Option<String>),
    DeleteObject(String, String),
}

#[derive(Debug, Default)]
struct StoredContainer {
    headers: ContainerHeaders,
    objects: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    containers: BTreeMap<String, StoredContainer>,
    calls: Vec<Call>,
    stuck: BTreeSet<String>,
}

/// Object storage that applies requests to an in-memory account
pub struct MemoryStorage {
    inner: Mutex<Inner>,
    page_size: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_page_size(2)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size,
        }
    }

    /// Seed a container with raw headers, bypassing request semantics
    pub fn insert_container(&self, name: &str, headers: ContainerHeaders) {
        self.inner.lock().unwrap().containers.insert(
            name.to_string(),
            StoredContainer {
                headers,
                objects: BTreeSet::new(),
            },
        );
    }

    pub fn add_objects(&self, container: &str, names: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .containers
            .get_mut(container)
            .expect("container must exist");
        stored.objects.extend(names.iter().map(|n| n.to_string()));
    }

    /// Make deleting `container` fail with a conflict even when it is empty
    pub fn make_stuck(&self, container: &str) {
        self.inner.lock().unwrap().stuck.insert(container.to_string());
    }

    pub fn contains(&self, container: &str) -> bool {
        self.inner.lock().unwrap().containers.contains_key(container)
    }

    pub fn object_names(&self, container: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .containers
            .get(container)
            .map(|c| c.objects.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn updates(&self) -> Vec<UpdateOpts> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update(_, opts) => Some(opts),
                _ => None,
            })
            .collect()
    }
}

fn not_found(name: &str) -> StorageError {
    StorageError::NotFound(format!("container {} does not exist", name))
}

fn acl(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        split_acl(value)
    }
}

fn optional(value: &str) -> Option<String> {
    Some(value.to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn create_container(&self, name: &str, opts: &CreateOpts) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Create(name.to_string(), opts.clone()));

        let headers = ContainerHeaders {
            read: acl(&opts.container_read),
            write: acl(&opts.container_write),
            versions_location: optional(&opts.versions_location),
            history_location: optional(&opts.history_location),
            metadata: opts.metadata.clone(),
            ..Default::default()
        };
        let stored = inner.containers.entry(name.to_string()).or_default();
        stored.headers = headers;
        Ok(())
    }

    async fn get_container(&self, name: &str) -> Result<ContainerHeaders, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Get(name.to_string()));

        let stored = inner.containers.get(name).ok_or_else(|| not_found(name))?;
        let mut headers = stored.headers.clone();
        headers.object_count = stored.objects.len() as u64;
        Ok(headers)
    }

    async fn update_container(&self, name: &str, opts: &UpdateOpts) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Update(name.to_string(), opts.clone()));

        let stored = inner.containers.get_mut(name).ok_or_else(|| not_found(name))?;
        let headers = &mut stored.headers;
        if let Some(read) = &opts.container_read {
            headers.read = acl(read);
        }
        if let Some(write) = &opts.container_write {
            headers.write = acl(write);
        }
        if opts.remove_versions_location {
            headers.versions_location = None;
        }
        if opts.remove_history_location {
            headers.history_location = None;
        }
        if let Some(location) = opts.versions_location.as_deref().and_then(optional) {
            headers.versions_location = Some(location);
        }
        if let Some(location) = opts.history_location.as_deref().and_then(optional) {
            headers.history_location = Some(location);
        }
        if let Some(metadata) = &opts.metadata {
            headers.metadata.extend(metadata.clone());
        }
        for key in &opts.remove_metadata {
            headers.metadata.remove(key);
        }
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Delete(name.to_string()));

        let stuck = inner.stuck.contains(name);
        let stored = inner.containers.get(name).ok_or_else(|| not_found(name))?;
        if stuck || !stored.objects.is_empty() {
            return Err(StorageError::Conflict(
                "There was a conflict when trying to complete your request.".to_string(),
            ));
        }
        inner.containers.remove(name);
        Ok(())
    }

    async fn list_object_names(
        &self,
        container: &str,
        marker: Option<&str>,
    ) -> Result<ObjectPage, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(Call::List(container.to_string(), marker.map(str::to_string)));

        let stored = inner
            .containers
            .get(container)
            .ok_or_else(|| not_found(container))?;
        let names = stored
            .objects
            .iter()
            .filter(|name| marker.map_or(true, |m| name.as_str() > m))
            .take(self.page_size)
            .cloned()
            .collect();
        Ok(ObjectPage { names })
    }

    async fn delete_object(&self, container: &str, object: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(Call::DeleteObject(container.to_string(), object.to_string()));

        let stored = inner
            .containers
            .get_mut(container)
            .ok_or_else(|| not_found(container))?;
        if stored.objects.remove(object) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("object {} does not exist", object)))
        }
    }
}
