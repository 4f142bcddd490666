//! Adapter error types.

use vestibule::AuthError;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the reference adapters.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// Adapter options could not be parsed.
    #[error("invalid options for adapter \"{id}\": {message}")]
    Options { id: String, message: String },

    /// Error from the gate itself.
    #[error(transparent)]
    Gate(#[from] AuthError),
}

impl Error {
    /// Creates an options error.
    pub fn options(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Options {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

impl From<Error> for AuthError {
    fn from(err: Error) -> Self {
        match err {
            Error::Gate(inner) => inner,
            Error::Options { id, message } => AuthError::adapter(id, message),
            Error::Hash(message) => AuthError::adapter("password", message),
        }
    }
}
