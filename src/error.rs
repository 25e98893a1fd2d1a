use thiserror::Error;

use crate::domain::arrangement::validation::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
    /// Detected locally. Never sent to the server.
    #[error("Arrangement is not valid: {0}")]
    Validation(#[from] ValidationError),

    /// The server refused the booking (e.g. another arranger took the room first).
    #[error("Submission rejected by server: {0}")]
    Conflict(String),

    #[error("Request to the portal failed: {0}")]
    Transient(#[from] reqwest::Error),

    #[error("Portal endpoint {endpoint} reported a failure: {message}")]
    Remote { endpoint: String, message: String },

    #[error("Result belongs to a selection that is no longer current")]
    StaleSelection,

    #[error("Portal returned a row that could not be interpreted: {0}")]
    InvalidRow(String),

    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Network level failure. Only retried on explicit user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Remote { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
