// Error taxonomy for the service, built on thiserror.
use thiserror::Error;

pub mod backend;
pub mod response;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use backend::BackendError;
pub use store::StoreError;
pub use validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidArgument(err.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotConfigured => AppError::FailedPrecondition(
                "Server not configured: backend endpoint / API key missing".into(),
            ),
            BackendError::Unavailable(msg) => {
                AppError::Unavailable(format!("Upstream request failed: {}", msg))
            }
            BackendError::UpstreamStatus { status, body } => {
                AppError::Internal(format!("Upstream error {}: {}", status, body))
            }
            BackendError::BadReply(msg) => {
                AppError::Internal(format!("Upstream reply not usable: {}", msg))
            }
        }
    }
}

// Custom result type
pub type AppResult<T> = Result<T, AppError>;
