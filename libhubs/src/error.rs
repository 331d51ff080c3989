//! Error types for Hubs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubsError>;

#[derive(Error, Debug)]
pub enum HubsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HubsError {
    /// Whether this error means the session credentials were rejected
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            HubsError::Api(ApiError::Authentication(_)) | HubsError::Api(ApiError::Unauthenticated)
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Failures at the REST collaborator boundary.
///
/// Every transport or non-success response collapses into one of these
/// variants. The type is `Clone` so that a failed fetch can be stored in a
/// fetch cell and handed to several readers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    /// Map an HTTP status code and reason phrase to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ApiError::Authentication(message),
            404 => ApiError::NotFound(message),
            _ => ApiError::Status { status, message },
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}
