/// Errors returned by the object-storage API
use reqwest::StatusCode;
use thiserror::Error;

/// Classified failure of an object-storage request
#[derive(Debug, Error)]
pub enum StorageError {
    /// The container or object does not exist (HTTP 404)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The request conflicts with remote state, e.g. deleting a non-empty container (HTTP 409)
    #[error("conflict (409): {0}")]
    Conflict(String),

    /// Any other non-success status, with the remote error text appended
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be interpreted
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StorageError {
    /// Map a non-success status and its body to an error kind
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(body),
            StatusCode::CONFLICT => StorageError::Conflict(body),
            _ => StorageError::Status { status, body },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}
