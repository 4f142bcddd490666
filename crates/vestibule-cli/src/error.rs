//! Error types for vestibule-cli

use thiserror::Error;

/// Result type alias for vestibule-cli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vestibule-cli
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from the gate (config loading, adapter resolution)
    #[error(transparent)]
    Gate(#[from] vestibule::AuthError),

    /// Error from the reference adapters
    #[error(transparent)]
    Adapters(#[from] vestibule_adapters::Error),

    /// Effective config could not be rendered
    #[error("Could not render config: {0}")]
    Render(#[from] toml::ser::Error),
}
