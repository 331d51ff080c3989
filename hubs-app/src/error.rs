//! Error types for hubs-app
//!
//! Wraps service layer errors so application code has a single error type
//! for operations that report failures to their caller.

use libhubs::error::ApiError;
use libhubs::HubsError;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Service layer error
    #[error("Service error: {0}")]
    Service(#[from] HubsError),

    /// Application state error
    #[error("Application error: {0}")]
    Application(String),
}

impl From<ApiError> for AppError {
    fn from(error: ApiError) -> Self {
        AppError::Service(HubsError::Api(error))
    }
}

/// Result type for application operations
pub type Result<T> = std::result::Result<T, AppError>;
