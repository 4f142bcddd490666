//! Request gating for web applications: authentication and authorization.
//!
//! Provides:
//! - [`Gate`] / [`Guard`]: the allowlist → authenticate → authorize pipeline
//! - [`Authenticator`] / [`Authorizer`]: pluggable adapter contracts
//! - [`AdapterRegistry`]: builds ordered adapter chains from config
//! - [`AuthConfig`]: gate configuration (loadable from TOML)
//! - [`Session`] / [`SessionStore`]: session contract plus an in-memory store
//! - [`AuthLayer`] / [`AuthService`]: Tower middleware
//! - [`AuthError`]: error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vestibule::{AuthConfig, AuthLayer, Gate, MemorySessionStore};
//!
//! let config = AuthConfig::load("auth.toml")?;
//! let gate = Gate::new(config, &registry)?.with_actions(["index", "view", "edit"]);
//! let app = router.layer(AuthLayer::new(Arc::new(gate), Arc::new(MemorySessionStore::new())));
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod session;
pub mod url;
pub mod user;

pub use adapter::{ActionMap, Authenticator, Authorizer, Decision, Options, TerminalResponse};
pub use config::{
    AdapterConfig, AdapterEntry, AuthConfig, FlashConfig, REDIRECT_KEY, Setting,
    UnauthorizedPolicy, UnauthorizedRedirect,
};
pub use error::{AdapterKind, AuthError, Result};
pub use gate::{AllowedActions, Gate, Guard, UserLookup, UserSource};
pub use middleware::{AuthHandle, AuthLayer, AuthService};
pub use registry::{AdapterRegistry, Provider, ResolvedAdapter, resolve_entries};
pub use request::{RequestContext, RequestInfo};
pub use session::{
    DEFAULT_IDLE_TTL, FlashMessage, MemorySession, MemorySessionStore, Session, SessionStore,
};
pub use user::{CurrentUser, UserRecord, user_from_parts};
