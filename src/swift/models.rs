/// Object-storage API data models
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::error::StorageError;

pub const CONTAINER_READ: &str = "X-Container-Read";
pub const CONTAINER_WRITE: &str = "X-Container-Write";
pub const CONTAINER_SYNC_TO: &str = "X-Container-Sync-To";
pub const CONTAINER_SYNC_KEY: &str = "X-Container-Sync-Key";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const VERSIONS_LOCATION: &str = "X-Versions-Location";
pub const HISTORY_LOCATION: &str = "X-History-Location";
pub const REMOVE_VERSIONS_LOCATION: &str = "X-Remove-Versions-Location";
pub const REMOVE_HISTORY_LOCATION: &str = "X-Remove-History-Location";
pub const OBJECT_COUNT: &str = "X-Container-Object-Count";
pub const BYTES_USED: &str = "X-Container-Bytes-Used";
pub const META_PREFIX: &str = "X-Container-Meta-";
pub const REMOVE_META_PREFIX: &str = "X-Remove-Container-Meta-";

/// Options for creating a container.
///
/// Empty strings are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOpts {
    pub container_read: String,
    pub container_write: String,
    pub container_sync_to: String,
    pub container_sync_key: String,
    pub content_type: String,
    pub versions_location: String,
    pub history_location: String,
    pub metadata: BTreeMap<String, String>,
}

impl CreateOpts {
    /// Render the options as request headers
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        push_non_empty(&mut headers, CONTAINER_READ, &self.container_read);
        push_non_empty(&mut headers, CONTAINER_WRITE, &self.container_write);
        push_non_empty(&mut headers, CONTAINER_SYNC_TO, &self.container_sync_to);
        push_non_empty(&mut headers, CONTAINER_SYNC_KEY, &self.container_sync_key);
        push_non_empty(&mut headers, CONTENT_TYPE, &self.content_type);
        push_non_empty(&mut headers, VERSIONS_LOCATION, &self.versions_location);
        push_non_empty(&mut headers, HISTORY_LOCATION, &self.history_location);
        for (key, value) in &self.metadata {
            headers.push((format!("{}{}", META_PREFIX, key), value.clone()));
        }
        headers
    }
}

/// Options for updating a container.
///
/// `None` leaves the remote value alone. `Some("")` on an ACL, sync or
/// content-type field clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOpts {
    pub container_read: Option<String>,
    pub container_write: Option<String>,
    pub container_sync_to: Option<String>,
    pub container_sync_key: Option<String>,
    pub content_type: Option<String>,
    pub versions_location: Option<String>,
    pub history_location: Option<String>,
    pub remove_versions_location: bool,
    pub remove_history_location: bool,
    pub metadata: Option<BTreeMap<String, String>>,
    pub remove_metadata: Vec<String>,
}

impl UpdateOpts {
    /// True when the update carries nothing but the container name
    pub fn is_empty(&self) -> bool {
        self.headers().is_empty()
    }

    /// Render the options as request headers
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        let fields = [
            (CONTAINER_READ, &self.container_read),
            (CONTAINER_WRITE, &self.container_write),
            (CONTAINER_SYNC_TO, &self.container_sync_to),
            (CONTAINER_SYNC_KEY, &self.container_sync_key),
            (CONTENT_TYPE, &self.content_type),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                headers.push((name.to_string(), value.clone()));
            }
        }

        // An empty location means "unset", which is expressed through the remove flags
        if let Some(location) = self.versions_location.as_deref() {
            push_non_empty(&mut headers, VERSIONS_LOCATION, location);
        }
        if let Some(location) = self.history_location.as_deref() {
            push_non_empty(&mut headers, HISTORY_LOCATION, location);
        }
        if self.remove_versions_location {
            headers.push((REMOVE_VERSIONS_LOCATION.to_string(), "true".to_string()));
        }
        if self.remove_history_location {
            headers.push((REMOVE_HISTORY_LOCATION.to_string(), "true".to_string()));
        }

        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                headers.push((format!("{}{}", META_PREFIX, key), value.clone()));
            }
        }
        for key in &self.remove_metadata {
            headers.push((format!("{}{}", REMOVE_META_PREFIX, key), "x".to_string()));
        }

        headers
    }
}

fn push_non_empty(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if !value.is_empty() {
        headers.push((name.to_string(), value.to_string()));
    }
}

/// Headers and metadata returned when reading a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerHeaders {
    /// Read ACL entries; empty when the header is absent
    pub read: Vec<String>,
    /// Write ACL entries; empty when the header is absent
    pub write: Vec<String>,
    pub versions_location: Option<String>,
    pub history_location: Option<String>,
    pub object_count: u64,
    pub bytes_used: u64,
    pub metadata: BTreeMap<String, String>,
}

impl ContainerHeaders {
    /// Parse the headers of a container HEAD response
    pub fn from_header_map(headers: &HeaderMap) -> Result<Self, StorageError> {
        let get = |name: &str| -> Result<Option<String>, StorageError> {
            match headers.get(name) {
                Some(value) => value
                    .to_str()
                    .map(|s| Some(s.to_string()))
                    .map_err(|e| StorageError::Decode(format!("header {}: {}", name, e))),
                None => Ok(None),
            }
        };
        let count = |name: &str| -> Result<u64, StorageError> {
            match get(name)? {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|e| StorageError::Decode(format!("header {}: {}", name, e))),
                None => Ok(0),
            }
        };

        let mut metadata = BTreeMap::new();
        let prefix = META_PREFIX.to_ascii_lowercase();
        for (name, value) in headers {
            if let Some(key) = name.as_str().strip_prefix(&prefix) {
                let value = value.to_str().map_err(|e| {
                    StorageError::Decode(format!("metadata header {}: {}", name, e))
                })?;
                metadata.insert(key.to_string(), value.to_string());
            }
        }

        Ok(Self {
            read: get(CONTAINER_READ)?.map(|v| split_acl(&v)).unwrap_or_default(),
            write: get(CONTAINER_WRITE)?.map(|v| split_acl(&v)).unwrap_or_default(),
            versions_location: get(VERSIONS_LOCATION)?.filter(|v| !v.is_empty()),
            history_location: get(HISTORY_LOCATION)?.filter(|v| !v.is_empty()),
            object_count: count(OBJECT_COUNT)?,
            bytes_used: count(BYTES_USED)?,
            metadata,
        })
    }
}

/// Split an ACL header into its comma-separated entries, kept verbatim
pub fn split_acl(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

/// Entry of a JSON object listing; only the name is used
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
}

/// One page of object names
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub names: Vec<String>,
}

impl ObjectPage {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Marker for requesting the page after this one
    pub fn next_marker(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_create_headers_skip_empty() {
        let opts = CreateOpts {
            container_read: ".r:*".to_string(),
            versions_location: "archive".to_string(),
            metadata: [("a".to_string(), "1".to_string())].into_iter().collect(),
            ..Default::default()
        };

        let headers = opts.headers();
        assert_eq!(
            headers,
            vec![
                (CONTAINER_READ.to_string(), ".r:*".to_string()),
                (VERSIONS_LOCATION.to_string(), "archive".to_string()),
                ("X-Container-Meta-a".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_headers() {
        let empty = UpdateOpts::default();
        assert!(empty.is_empty());

        let opts = UpdateOpts {
            container_write: Some(String::new()),
            versions_location: Some(String::new()),
            remove_versions_location: true,
            remove_history_location: true,
            remove_metadata: vec!["old".to_string()],
            ..Default::default()
        };
        let headers = opts.headers();
        assert!(headers.contains(&(CONTAINER_WRITE.to_string(), String::new())));
        assert!(!headers.iter().any(|(n, _)| n == VERSIONS_LOCATION));
        assert!(headers.contains(&(REMOVE_VERSIONS_LOCATION.to_string(), "true".to_string())));
        assert!(headers.contains(&(REMOVE_HISTORY_LOCATION.to_string(), "true".to_string())));
        assert!(headers.contains(&("X-Remove-Container-Meta-old".to_string(), "x".to_string())));
    }

    #[test]
    fn test_parse_container_headers() {
        let map = header_map(&[
            ("x-container-read", ".r:*, .rlistings"),
            ("x-versions-location", "archive"),
            ("x-container-object-count", "3"),
            ("x-container-bytes-used", "1024"),
            ("x-container-meta-a", "1"),
        ]);

        let headers = ContainerHeaders::from_header_map(&map).unwrap();
        assert_eq!(headers.read, vec![".r:*", " .rlistings"]);
        assert_eq!(headers.read.join(","), ".r:*, .rlistings");
        assert!(headers.write.is_empty());
        assert_eq!(headers.versions_location.as_deref(), Some("archive"));
        assert_eq!(headers.history_location, None);
        assert_eq!(headers.object_count, 3);
        assert_eq!(headers.bytes_used, 1024);
        assert_eq!(headers.metadata.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_empty_acl_header_yields_empty_entry() {
        let map = header_map(&[("x-container-write", "")]);
        let headers = ContainerHeaders::from_header_map(&map).unwrap();
        assert_eq!(headers.write, vec![String::new()]);
    }

    #[test]
    fn test_bad_object_count() {
        let map = header_map(&[("x-container-object-count", "many")]);
        assert!(ContainerHeaders::from_header_map(&map).is_err());
    }
}
