//! Adapter registry.
//!
//! Maps adapter ids to typed factories and turns config blocks into ordered
//! adapter chains. Resolution happens in two phases:
//!
//! 1. [`resolve_entries`] (pure): pull out the shared [`ALL`] entry and fold
//!    its options under every other entry's own options.
//! 2. [`AdapterRegistry::build_authenticators`] /
//!    [`AdapterRegistry::build_authorizers`]: look up each factory and call it.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = AdapterRegistry::new()
//!     .with_authenticator("Token", |opts| Ok(Arc::new(TokenAuth::new(opts)?)))
//!     .with_authorizer("Owner", |_| Ok(Arc::new(OwnerAuthorizer)));
//!
//! let chain = registry.build_authenticators(&AdapterConfig::from_ids(["Token"]))?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::{Authenticator, Authorizer, Options};
use crate::config::{ALL, AdapterConfig};
use crate::error::{AdapterKind, AuthError, Result};

/// Option key that points an entry at a different factory id.
pub const CLASS_NAME: &str = "class_name";

/// Builds an authenticator from its merged options.
pub type AuthenticatorFactory =
    Arc<dyn Fn(&Options) -> Result<Arc<dyn Authenticator>> + Send + Sync>;

/// Builds an authorizer from its merged options.
pub type AuthorizerFactory = Arc<dyn Fn(&Options) -> Result<Arc<dyn Authorizer>> + Send + Sync>;

#[derive(Clone)]
enum Factory {
    Authenticator(AuthenticatorFactory),
    Authorizer(AuthorizerFactory),
}

// ============================================================================
// Provider
// ============================================================================

/// A constructed adapter together with the config id it was built from.
pub struct Provider<T: ?Sized> {
    id: String,
    adapter: Arc<T>,
}

impl<T: ?Sized> Provider<T> {
    /// Wrap an adapter.
    pub fn new(id: impl Into<String>, adapter: Arc<T>) -> Self {
        Self {
            id: id.into(),
            adapter,
        }
    }

    /// Config id of this adapter.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The adapter itself.
    pub fn adapter(&self) -> &T {
        &self.adapter
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            adapter: self.adapter.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("id", &self.id).finish()
    }
}

// ============================================================================
// Config resolution
// ============================================================================

/// One adapter entry after shared options were merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAdapter {
    /// Entry id as written in config.
    pub id: String,
    /// Factory id (`class_name` option, else the entry id).
    pub factory: String,
    /// Shared options overlaid with the entry's own.
    pub options: Options,
}

/// Merge the shared [`ALL`] options into every other entry.
///
/// Entry-specific keys win over shared ones. The `all` entry itself is not
/// returned, and `class_name` is consumed from the merged options, so a
/// shared `class_name` applies to every entry that does not set its own.
pub fn resolve_entries(config: &AdapterConfig) -> Vec<ResolvedAdapter> {
    let shared = config
        .entries()
        .iter()
        .filter(|entry| entry.id.eq_ignore_ascii_case(ALL))
        .fold(Options::new(), |mut acc, entry| {
            acc.extend(entry.options.clone());
            acc
        });

    config
        .entries()
        .iter()
        .filter(|entry| !entry.id.eq_ignore_ascii_case(ALL))
        .map(|entry| {
            let mut options = shared.clone();
            options.extend(entry.options.clone());
            let factory = options
                .remove(CLASS_NAME)
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| entry.id.clone());

            ResolvedAdapter {
                id: entry.id.clone(),
                factory,
                options,
            }
        })
        .collect()
}

// ============================================================================
// AdapterRegistry
// ============================================================================

/// Registry of adapter factories keyed by id.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, Factory>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticator factory.
    pub fn register_authenticator<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Options) -> Result<Arc<dyn Authenticator>> + Send + Sync + 'static,
    {
        self.factories
            .insert(id.into(), Factory::Authenticator(Arc::new(factory)));
    }

    /// Register an authorizer factory.
    pub fn register_authorizer<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Options) -> Result<Arc<dyn Authorizer>> + Send + Sync + 'static,
    {
        self.factories
            .insert(id.into(), Factory::Authorizer(Arc::new(factory)));
    }

    /// Builder-style [`register_authenticator`](Self::register_authenticator).
    pub fn with_authenticator<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Options) -> Result<Arc<dyn Authenticator>> + Send + Sync + 'static,
    {
        self.register_authenticator(id, factory);
        self
    }

    /// Builder-style [`register_authorizer`](Self::register_authorizer).
    pub fn with_authorizer<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Options) -> Result<Arc<dyn Authorizer>> + Send + Sync + 'static,
    {
        self.register_authorizer(id, factory);
        self
    }

    /// Whether `id` has a factory.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build the authenticator chain for a config block, in order.
    pub fn build_authenticators(
        &self,
        config: &AdapterConfig,
    ) -> Result<Vec<Provider<dyn Authenticator>>> {
        let kind = AdapterKind::Authentication;
        resolve_entries(config)
            .into_iter()
            .map(|entry| match self.lookup(&entry, kind)? {
                Factory::Authenticator(factory) => {
                    log::debug!("Building authenticator '{}' ({})", entry.id, entry.factory);
                    Ok(Provider::new(entry.id, factory(&entry.options)?))
                }
                Factory::Authorizer(_) => Err(contract_violation(kind, entry)),
            })
            .collect()
    }

    /// Build the authorizer chain for a config block, in order.
    pub fn build_authorizers(&self, config: &AdapterConfig) -> Result<Vec<Provider<dyn Authorizer>>> {
        let kind = AdapterKind::Authorization;
        resolve_entries(config)
            .into_iter()
            .map(|entry| match self.lookup(&entry, kind)? {
                Factory::Authorizer(factory) => {
                    log::debug!("Building authorizer '{}' ({})", entry.id, entry.factory);
                    Ok(Provider::new(entry.id, factory(&entry.options)?))
                }
                Factory::Authenticator(_) => Err(contract_violation(kind, entry)),
            })
            .collect()
    }

    fn lookup(&self, entry: &ResolvedAdapter, kind: AdapterKind) -> Result<&Factory> {
        self.factories
            .get(&entry.factory)
            .ok_or_else(|| AuthError::MissingAdapter {
                kind,
                id: entry.factory.clone(),
            })
    }
}

fn contract_violation(kind: AdapterKind, entry: ResolvedAdapter) -> AuthError {
    log::warn!("Adapter '{}' cannot be used for {kind}", entry.factory);
    AuthError::ContractViolation {
        kind,
        id: entry.factory,
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
