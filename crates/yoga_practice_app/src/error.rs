//! Application-level errors.

use thiserror::Error;
use yoga_practice_client::YogaError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Client(#[from] YogaError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Text suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Client(e) => e.user_message(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Serialization(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.user_message()
    }
}

/// Result type alias for application operations.
pub type AppResult<T> = Result<T, AppError>;
