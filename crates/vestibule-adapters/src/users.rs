//! User lookup and credential checking shared by the authenticators.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use vestibule::{Options, UserRecord};

use crate::error::{Error, Result};
use crate::password::verify_password;

/// Source of user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// First record whose `field` equals `value`.
    async fn find(&self, field: &str, value: &Value) -> Option<UserRecord>;
}

/// Fixed in-memory list of users.
#[derive(Debug, Clone, Default)]
pub struct StaticUserStore {
    users: Vec<UserRecord>,
}

impl StaticUserStore {
    /// Create a store over `users`.
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    /// Add a user.
    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.users.push(user);
        self
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for StaticUserStore {
    async fn find(&self, field: &str, value: &Value) -> Option<UserRecord> {
        self.users
            .iter()
            .find(|user| user.get(field) == Some(value))
            .cloned()
    }
}

/// Field names used for credentials.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fields {
    /// Username field (submitted data and user record).
    #[serde(default = "default_username")]
    pub username: String,
    /// Password field (submitted data and user record).
    #[serde(default = "default_password")]
    pub password: String,
}

fn default_username() -> String {
    "username".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
        }
    }
}

/// Options common to the password authenticators.
///
/// Unknown keys are ignored, so shared `all` options meant for other
/// adapters do not break construction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialOptions {
    /// Credential field names.
    #[serde(default)]
    pub fields: Fields,
    /// Extra field values a record must match (e.g. `{ active = true }`).
    #[serde(default)]
    pub scope: Map<String, Value>,
}

impl CredentialOptions {
    /// Parse adapter options for adapter `id`.
    pub fn from_options(id: &str, options: &Options) -> Result<Self> {
        serde_json::from_value(Value::Object(options.clone())).map_err(|e| Error::options(id, e))
    }
}

/// Username/password check against a [`UserStore`].
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn UserStore>,
    options: CredentialOptions,
}

impl Credentials {
    /// Create a checker.
    pub fn new(store: Arc<dyn UserStore>, options: CredentialOptions) -> Self {
        Self { store, options }
    }

    /// Credential field names.
    pub fn fields(&self) -> &Fields {
        &self.options.fields
    }

    /// Find the user and verify the password.
    ///
    /// The record must match the scope. The password field is removed from
    /// the returned record.
    pub async fn check(&self, username: &str, password: &str) -> Option<UserRecord> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        let fields = &self.options.fields;
        let mut user = self
            .store
            .find(&fields.username, &Value::String(username.to_string()))
            .await?;

        let in_scope = self
            .options
            .scope
            .iter()
            .all(|(field, expected)| user.get(field) == Some(expected));
        if !in_scope {
            log::debug!("User matched but is outside the configured scope");
            return None;
        }

        let hash = user.get_str(&fields.password)?;
        if !verify_password(hash, password) {
            log::debug!("Password mismatch");
            return None;
        }
        user.remove(&fields.password);
        Some(user)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
