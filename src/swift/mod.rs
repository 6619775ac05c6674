/// Object-storage (Swift API) client implementation
pub mod auth;
pub mod client;
pub mod error;
#[cfg(test)]
pub mod memory;
pub mod models;

use async_trait::async_trait;

pub use client::SwiftClient;
pub use error::StorageError;
pub use models::{ContainerHeaders, CreateOpts, ObjectPage, UpdateOpts};

/// Container and object operations the resource layer depends on
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create a container (`PUT /{name}`)
    async fn create_container(&self, name: &str, opts: &CreateOpts) -> Result<(), StorageError>;

    /// Read container headers and metadata (`HEAD /{name}`)
    async fn get_container(&self, name: &str) -> Result<ContainerHeaders, StorageError>;

    /// Update container headers and metadata (`POST /{name}`)
    async fn update_container(&self, name: &str, opts: &UpdateOpts) -> Result<(), StorageError>;

    /// Delete an empty container (`DELETE /{name}`)
    async fn delete_container(&self, name: &str) -> Result<(), StorageError>;

    /// List one page of object names, starting after `marker`
    async fn list_object_names(
        &self,
        container: &str,
        marker: Option<&str>,
    ) -> Result<ObjectPage, StorageError>;

    /// Delete a single object (`DELETE /{container}/{object}`)
    async fn delete_object(&self, container: &str, object: &str) -> Result<(), StorageError>;
}
