//! Error types for the admission service.
//!
//! Validation failures are not errors in this sense: they are values
//! ([`ErrorList`](crate::validation::ErrorList)) returned to the client in a
//! denied admission response. `Error` covers the cases where a request could
//! not be evaluated at all.

use thiserror::Error;

/// Error type for admission operations
#[derive(Error, Debug)]
pub enum Error {
    /// Object or patch (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SSH key generation failed
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// The admission request carried no object where one is required
    #[error("Admission request has no {0}")]
    MissingObject(&'static str),

    /// The defaulting patch could not be attached to the response
    #[error("Patch error: {0}")]
    Patch(String),

    /// No policy is registered for the requested kind
    #[error("Unsupported kind: {0}")]
    UnknownKind(String),

    /// The incoming review could not be converted to a request
    #[error("Invalid admission review: {0}")]
    InvalidReview(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener or TLS setup failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is the client's fault rather than the server's.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Serialization(_)
                | Error::MissingObject(_)
                | Error::UnknownKind(_)
                | Error::InvalidReview(_)
        )
    }
}

/// Result type alias for admission operations
pub type Result<T> = std::result::Result<T, Error>;
