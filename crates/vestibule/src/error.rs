//! Gate error types.

use std::fmt;

use http::StatusCode;

/// Result type alias for vestibule operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Which adapter chain an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Identifies users (`authenticate` config block).
    Authentication,
    /// Grants access to identified users (`authorize` config block).
    Authorization,
}

impl AdapterKind {
    /// The capability method every adapter of this kind must provide.
    pub fn capability(&self) -> &'static str {
        match self {
            AdapterKind::Authentication => "authenticate",
            AdapterKind::Authorization => "authorize",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::Authentication => write!(f, "Authentication"),
            AdapterKind::Authorization => write!(f, "Authorization"),
        }
    }
}

/// Errors raised by the gate.
///
/// An adapter that simply fails to identify or authorize a user is not an
/// error; those are `None` / `false` results and the gate moves on.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// An adapter identifier has no registered factory.
    #[error("{kind} adapter \"{id}\" was not found.")]
    MissingAdapter { kind: AdapterKind, id: String },

    /// The identifier resolved to a factory of the wrong capability.
    #[error("{kind} objects must implement an {}() method (adapter \"{id}\").", .kind.capability())]
    ContractViolation { kind: AdapterKind, id: String },

    /// An adapter factory rejected its options.
    #[error("adapter \"{id}\" could not be constructed: {message}")]
    Adapter { id: String, message: String },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Unauthorized access with redirection disabled.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Reading a config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config text is not valid TOML for [`AuthConfig`](crate::AuthConfig).
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AuthError {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        AuthError::Config {
            message: message.into(),
        }
    }

    /// Creates an adapter construction error.
    pub fn adapter<I: Into<String>, M: Into<String>>(id: I, message: M) -> Self {
        AuthError::Adapter {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Whether this error can only happen while building a gate.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AuthError::MissingAdapter { .. }
                | AuthError::ContractViolation { .. }
                | AuthError::Adapter { .. }
                | AuthError::Config { .. }
                | AuthError::Io(_)
                | AuthError::Toml(_)
        )
    }

    /// HTTP status a framework should surface for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
