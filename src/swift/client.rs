/// Swift-compatible object-storage API client
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use super::error::StorageError;
use super::models::{ContainerHeaders, CreateOpts, ObjectEntry, ObjectPage, UpdateOpts};
use super::ObjectStorage;

/// Number of object names requested per listing page
pub const LIST_PAGE_SIZE: usize = 1000;

/// Object-storage client bound to a single account endpoint
#[derive(Clone)]
pub struct SwiftClient {
    client: Client,
    endpoint: Url,
    page_size: usize,
}

impl SwiftClient {
    /// Create a new client for an account endpoint (e.g. `https://swift.example.com/v1/AUTH_project`)
    pub fn new(endpoint: &str, token: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid object-storage endpoint: {}", endpoint))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Object-storage endpoint cannot be used as a base URL: {}", endpoint);
        }

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(token).context("Invalid auth token format")?;
        token.set_sensitive(true);
        headers.insert("X-Auth-Token", token);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            page_size: LIST_PAGE_SIZE,
        })
    }

    /// Build the URL of a container, or of an object when `object` is given
    fn url(&self, container: &str, object: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Decode(format!("bad endpoint {}", self.endpoint)))?;
            segments.pop_if_empty().push(container);
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        headers: &[(String, String)],
    ) -> Result<RequestBuilder, StorageError> {
        debug!("{} {}", method, url);
        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StorageError::Decode(format!("header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| StorageError::Decode(format!("header {} value: {}", name, e)))?;
            builder = builder.header(name, value);
        }
        Ok(builder)
    }

    /// Send a request and turn non-success statuses into a classified error
    async fn send(&self, builder: RequestBuilder) -> Result<Response, StorageError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(StorageError::from_status(status, error_text))
        }
    }
}

#[async_trait]
impl ObjectStorage for SwiftClient {
    async fn create_container(&self, name: &str, opts: &CreateOpts) -> Result<(), StorageError> {
        let url = self.url(name, None)?;
        let builder = self.request(Method::PUT, url, &opts.headers())?;
        self.send(builder).await?;
        Ok(())
    }

    async fn get_container(&self, name: &str) -> Result<ContainerHeaders, StorageError> {
        let url = self.url(name, None)?;
        let builder = self.request(Method::HEAD, url, &[])?;
        let response = self.send(builder).await?;
        ContainerHeaders::from_header_map(response.headers())
    }

    async fn update_container(&self, name: &str, opts: &UpdateOpts) -> Result<(), StorageError> {
        let url = self.url(name, None)?;
        let builder = self.request(Method::POST, url, &opts.headers())?;
        self.send(builder).await?;
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> Result<(), StorageError> {
        let url = self.url(name, None)?;
        let builder = self.request(Method::DELETE, url, &[])?;
        self.send(builder).await?;
        Ok(())
    }

    async fn list_object_names(
        &self,
        container: &str,
        marker: Option<&str>,
    ) -> Result<ObjectPage, StorageError> {
        let mut url = self.url(container, None)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("format", "json")
                .append_pair("limit", &self.page_size.to_string());
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }

        let builder = self.request(Method::GET, url, &[])?;
        let response = self.send(builder).await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(ObjectPage::default());
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(ObjectPage::default());
        }
        let entries: Vec<ObjectEntry> = serde_json::from_str(&body)
            .map_err(|e| StorageError::Decode(format!("object listing: {}", e)))?;

        Ok(ObjectPage {
            names: entries.into_iter().map(|e| e.name).collect(),
        })
    }

    async fn delete_object(&self, container: &str, object: &str) -> Result<(), StorageError> {
        let url = self.url(container, Some(object))?;
        let builder = self.request(Method::DELETE, url, &[])?;
        self.send(builder).await?;
        Ok(())
    }
}
