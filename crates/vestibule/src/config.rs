//! Gate configuration.
//!
//! [`AuthConfig`] is what applications write (usually as TOML). Every field
//! is optional; [`AuthConfig::apply_defaults`] fills in only the values that
//! were left unset, so explicit settings always survive.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::Options;
use crate::error::{AuthError, Result};

/// Adapter id whose options are shared by every other entry.
pub const ALL: &str = "all";

/// Default session key holding the logged-in user record.
pub const DEFAULT_SESSION_KEY: &str = "Auth.User";

/// Session key holding the pending return-to URL.
pub const REDIRECT_KEY: &str = "Auth.redirect";

/// Default login action URL.
pub const DEFAULT_LOGIN_ACTION: &str = "/users/login";

/// Default message for denied access.
pub const DEFAULT_AUTH_ERROR: &str = "You are not authorized to access that location.";

/// Authenticator used when none is configured.
pub const DEFAULT_AUTHENTICATOR: &str = "Form";

// ============================================================================
// Adapter config blocks
// ============================================================================

/// One adapter entry: an id and its raw options.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterEntry {
    /// Adapter id (also the factory id unless `class_name` is set).
    pub id: String,
    /// Options for this adapter.
    pub options: Options,
}

/// Ordered adapter config block.
///
/// Accepts a single id (`"Form"`), a list of ids and tables
/// (`["Form", { Basic = { realm = "api" } }]`), or a table of
/// `id = { options }`. Bare ids get empty options. Order is preserved and
/// drives first-match-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterConfig {
    entries: Vec<AdapterEntry>,
}

impl AdapterConfig {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block of bare ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::new();
        for id in ids {
            config.insert(id, Options::new());
        }
        config
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, id: impl Into<String>, options: Options) -> Self {
        self.insert(id, options);
        self
    }

    /// Add an entry; a repeated id replaces the earlier options in place.
    pub fn insert(&mut self, id: impl Into<String>, options: Options) {
        let id = id.into();
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.options = options,
            None => self.entries.push(AdapterEntry { id, options }),
        }
    }

    /// Entries in configured order.
    pub fn entries(&self) -> &[AdapterEntry] {
        &self.entries
    }

    /// Whether no adapters are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn extend(&mut self, other: AdapterConfig) {
        for entry in other.entries {
            self.insert(entry.id, entry.options);
        }
    }
}

impl Serialize for AdapterConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.id, &entry.options)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AdapterConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(AdapterConfigVisitor)
    }
}

struct AdapterConfigVisitor;

impl<'de> Visitor<'de> for AdapterConfigVisitor {
    type Value = AdapterConfig;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an adapter id, a list of adapter ids/tables, or a table of adapter options")
    }

    fn visit_str<E: de::Error>(self, id: &str) -> std::result::Result<Self::Value, E> {
        Ok(AdapterConfig::from_ids([id]))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let mut config = AdapterConfig::new();
        while let Some(item) = seq.next_element::<AdapterConfig>()? {
            config.extend(item);
        }
        Ok(config)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut config = AdapterConfig::new();
        while let Some((id, options)) = map.next_entry::<String, Value>()? {
            let options = match options {
                Value::Object(options) => options,
                Value::Null => Options::new(),
                other => {
                    return Err(de::Error::custom(format!(
                        "options for adapter \"{id}\" must be a table, got {other}"
                    )));
                }
            };
            config.insert(id, options);
        }
        Ok(config)
    }
}

// ============================================================================
// Scalar settings
// ============================================================================

/// A string setting that may also be switched with a boolean.
///
/// `false` (or an empty string) turns the feature off; `true` asks for the
/// built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    /// Explicit text.
    Text(String),
    /// On (default value) or off.
    Toggle(bool),
}

impl Setting {
    /// Resolve to text, substituting `default` for `true`.
    pub fn resolve<'a>(&'a self, default: &'a str) -> Option<&'a str> {
        match self {
            Setting::Text(text) if !text.is_empty() => Some(text.as_str()),
            Setting::Text(_) | Setting::Toggle(false) => None,
            Setting::Toggle(true) => Some(default),
        }
    }
}

impl From<&str> for Setting {
    fn from(text: &str) -> Self {
        Setting::Text(text.to_string())
    }
}

/// `unauthorized_redirect` as written in config: `true`, `false` or a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnauthorizedRedirect {
    /// `true` = back to the referrer, `false` = fail with Forbidden.
    Flag(bool),
    /// Explicit target.
    Url(String),
}

/// How unauthorized access is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedPolicy<'a> {
    /// Redirect to the local referrer, else `login_redirect`, else `/`.
    Referrer,
    /// Fail with a Forbidden error.
    Forbid,
    /// Redirect to a fixed URL.
    To(&'a str),
}

/// Flash message settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashConfig {
    /// View element used to render the message.
    #[serde(default = "default_flash_element")]
    pub element: String,

    /// Message domain.
    #[serde(default = "default_flash_key")]
    pub key: String,

    /// Extra params passed with every message.
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn default_flash_element() -> String {
    "default".to_string()
}

fn default_flash_key() -> String {
    "auth".to_string()
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            element: default_flash_element(),
            key: default_flash_key(),
            params: Map::new(),
        }
    }
}

// ============================================================================
// AuthConfig
// ============================================================================

/// Gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Authenticators, tried in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticate: Option<AdapterConfig>,

    /// Authorizers, tried in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize: Option<AdapterConfig>,

    /// Element rendered (with 403) for unauthenticated background requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ajax_login: Option<String>,

    /// Flash message settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<FlashConfig>,

    /// URL of the login action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_action: Option<String>,

    /// Where to go after logging in when no return-to URL is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_redirect: Option<String>,

    /// Where to go after logging out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_redirect: Option<String>,

    /// Message flashed (or carried by Forbidden) on denied access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_error: Option<Setting>,

    /// Handling of unauthorized access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthorized_redirect: Option<UnauthorizedRedirect>,

    /// Session key for the user record; `false` = stateless only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<Setting>,

    /// Actions that never require authentication.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
}

impl AuthConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            AuthError::Toml(err) => AuthError::config(format!("{}: {err}", path.display())),
            other => other,
        })
    }

    /// Fill in every unset value with its default. Set values are kept.
    pub fn apply_defaults(&mut self) {
        if self.authenticate.is_none() {
            self.authenticate = Some(AdapterConfig::from_ids([DEFAULT_AUTHENTICATOR]));
        }
        if self.flash.is_none() {
            self.flash = Some(FlashConfig::default());
        }
        if self.login_action.is_none() {
            self.login_action = Some(DEFAULT_LOGIN_ACTION.to_string());
        }
        if self.logout_redirect.is_none() {
            self.logout_redirect = self.login_action.clone();
        }
        if self.auth_error.is_none() {
            self.auth_error = Some(Setting::Text(DEFAULT_AUTH_ERROR.to_string()));
        }
        if self.unauthorized_redirect.is_none() {
            self.unauthorized_redirect = Some(UnauthorizedRedirect::Flag(true));
        }
        if self.session_key.is_none() {
            self.session_key = Some(Setting::Text(DEFAULT_SESSION_KEY.to_string()));
        }
    }

    /// Login action URL.
    pub fn login_action(&self) -> &str {
        self.login_action.as_deref().unwrap_or(DEFAULT_LOGIN_ACTION)
    }

    /// Post-login redirect, if configured (empty counts as unset).
    pub fn login_redirect(&self) -> Option<&str> {
        self.login_redirect.as_deref().filter(|url| !url.is_empty())
    }

    /// Post-logout redirect.
    pub fn logout_redirect(&self) -> &str {
        self.logout_redirect
            .as_deref()
            .unwrap_or_else(|| self.login_action())
    }

    /// Denied-access message, or `None` when suppressed.
    pub fn auth_error(&self) -> Option<&str> {
        match &self.auth_error {
            Some(setting) => setting.resolve(DEFAULT_AUTH_ERROR),
            None => Some(DEFAULT_AUTH_ERROR),
        }
    }

    /// Session key for the user record, or `None` in stateless mode.
    pub fn session_key(&self) -> Option<&str> {
        match &self.session_key {
            Some(setting) => setting.resolve(DEFAULT_SESSION_KEY),
            None => Some(DEFAULT_SESSION_KEY),
        }
    }

    /// Element for background-request challenges.
    pub fn ajax_login(&self) -> Option<&str> {
        self.ajax_login.as_deref().filter(|element| !element.is_empty())
    }

    /// Unauthorized handling policy.
    pub fn unauthorized_policy(&self) -> UnauthorizedPolicy<'_> {
        match &self.unauthorized_redirect {
            None | Some(UnauthorizedRedirect::Flag(true)) => UnauthorizedPolicy::Referrer,
            Some(UnauthorizedRedirect::Flag(false)) => UnauthorizedPolicy::Forbid,
            Some(UnauthorizedRedirect::Url(url)) => UnauthorizedPolicy::To(url.as_str()),
        }
    }
}
