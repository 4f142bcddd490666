//! The request gate.
//!
//! [`Gate`] is built once from an [`AuthConfig`] and an [`AdapterRegistry`]
//! and is shared by every request. Each request gets its own [`Guard`],
//! which carries the per-request state: allowed actions, the cached user,
//! and the providers that succeeded.
//!
//! [`Guard::process`] runs the pipeline:
//!
//! 1. Actions outside the known set pass untouched.
//! 2. Allowed actions pass without identification.
//! 3. The user is looked up (cache, session, then stateless adapters).
//!    Nobody found runs the unauthenticated path.
//! 4. The login action, a missing `authorize` block, or a granting
//!    authorizer lets the request through. Otherwise the unauthorized path
//!    runs.

use std::collections::HashSet;
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;

use crate::adapter::{ActionMap, Authenticator, Authorizer, Decision};
use crate::config::{AdapterConfig, AuthConfig, REDIRECT_KEY, UnauthorizedPolicy};
use crate::error::{AuthError, Result};
use crate::registry::{AdapterRegistry, Provider};
use crate::request::RequestContext;
use crate::session::Session;
use crate::url;
use crate::user::UserRecord;

// ============================================================================
// Gate
// ============================================================================

/// Immutable gate shared across requests.
pub struct Gate {
    config: AuthConfig,
    authenticators: Vec<Provider<dyn Authenticator>>,
    authorizers: Vec<Provider<dyn Authorizer>>,
    actions: Option<HashSet<String>>,
}

impl Gate {
    /// Build the adapter chains for `config`.
    ///
    /// Fails on unknown adapter ids, adapters of the wrong kind, and
    /// factories that reject their options.
    pub fn new(config: AuthConfig, registry: &AdapterRegistry) -> Result<Self> {
        let mut resolved = config.clone();
        resolved.apply_defaults();

        let authenticators = match &resolved.authenticate {
            Some(block) => registry.build_authenticators(block)?,
            None => Vec::new(),
        };
        let authorizers = match &resolved.authorize {
            Some(block) => registry.build_authorizers(block)?,
            None => Vec::new(),
        };
        log::debug!(
            "Gate built with {} authenticator(s) and {} authorizer(s)",
            authenticators.len(),
            authorizers.len()
        );

        Ok(Self {
            config,
            authenticators,
            authorizers,
            actions: None,
        })
    }

    /// Restrict the gate to a known set of actions (case-insensitive).
    ///
    /// Requests for other actions pass through untouched. Without a known
    /// set every action is controlled.
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.actions = Some(
            actions
                .into_iter()
                .map(|action| action.as_ref().to_lowercase())
                .collect(),
        );
        self
    }

    /// Configuration as given (defaults not applied).
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticator chain, in order.
    pub fn authenticators(&self) -> &[Provider<dyn Authenticator>] {
        &self.authenticators
    }

    /// Authorizer chain, in order.
    pub fn authorizers(&self) -> &[Provider<dyn Authorizer>] {
        &self.authorizers
    }

    /// Whether `action` is controlled by this gate.
    pub fn is_known_action(&self, action: &str) -> bool {
        match &self.actions {
            Some(known) => known.contains(&action.to_lowercase()),
            None => true,
        }
    }

    /// Pass an action → operation mapping to every authorizer.
    pub fn map_actions(&self, map: &ActionMap) {
        for provider in &self.authorizers {
            provider.adapter().map_actions(map);
        }
    }

    /// Start a guard for one request.
    pub fn guard(self: &Arc<Self>, session: Arc<dyn Session>, request: Arc<dyn RequestContext>) -> Guard {
        let mut allowed = AllowedActions::default();
        allowed.allow(&self.config.allow);
        Guard {
            gate: Arc::clone(self),
            session,
            request,
            config: self.config.clone(),
            defaults_applied: false,
            allowed,
            user: None,
            authentication_provider: None,
            authorization_provider: None,
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("authenticators", &self.authenticators)
            .field("authorizers", &self.authorizers)
            .field("actions", &self.actions)
            .finish()
    }
}

// ============================================================================
// Allowed actions
// ============================================================================

/// Actions exempt from authentication, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedActions {
    names: HashSet<String>,
    all: bool,
    excluded: HashSet<String>,
}

impl AllowedActions {
    /// Whether `action` is exempt.
    pub fn contains(&self, action: &str) -> bool {
        let action = action.to_lowercase();
        if self.all {
            !self.excluded.contains(&action)
        } else {
            self.names.contains(&action)
        }
    }

    /// Add actions.
    pub fn allow<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for action in actions {
            let action = action.as_ref().to_lowercase();
            self.excluded.remove(&action);
            self.names.insert(action);
        }
    }

    /// Exempt every action.
    pub fn allow_all(&mut self) {
        self.all = true;
        self.excluded.clear();
    }

    /// Remove actions.
    pub fn deny<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for action in actions {
            let action = action.as_ref().to_lowercase();
            self.names.remove(&action);
            if self.all {
                self.excluded.insert(action);
            }
        }
    }

    /// Clear the set.
    pub fn deny_all(&mut self) {
        self.names.clear();
        self.excluded.clear();
        self.all = false;
    }
}

// ============================================================================
// User lookup
// ============================================================================

/// Where a resolved user came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSource {
    /// Already cached for this request.
    Cache,
    /// Read from the session.
    Session,
    /// An authenticator's stateless lookup.
    Stateless,
}

/// Result of resolving the current user.
#[derive(Debug, Clone, PartialEq)]
pub enum UserLookup {
    /// A user was resolved.
    Found { user: UserRecord, source: UserSource },
    /// Nobody could be resolved.
    NotFound,
}

// ============================================================================
// Guard
// ============================================================================

/// Per-request gate state and operations.
pub struct Guard {
    gate: Arc<Gate>,
    session: Arc<dyn Session>,
    request: Arc<dyn RequestContext>,
    config: AuthConfig,
    defaults_applied: bool,
    allowed: AllowedActions,
    user: Option<UserRecord>,
    authentication_provider: Option<Provider<dyn Authenticator>>,
    authorization_provider: Option<Provider<dyn Authorizer>>,
}

impl Guard {
    /// Run the request through the gate.
    ///
    /// `Err(AuthError::Forbidden)` is returned when access is denied and
    /// redirects are disabled.
    pub async fn process(&mut self) -> Result<Decision> {
        let action = self.request.action().to_lowercase();
        if !self.gate.is_known_action(&action) {
            log::debug!("Action '{action}' is not controlled, passing through");
            return Ok(Decision::Continue);
        }

        self.ensure_defaults();

        if self.allowed.contains(&action) {
            log::debug!("Action '{action}' is allowed without authentication");
            return Ok(Decision::Continue);
        }

        let user = match self.lookup_user().await {
            UserLookup::Found { user, source } => {
                log::debug!("User resolved from {source:?}");
                user
            }
            UserLookup::NotFound => return Ok(self.unauthenticated().await),
        };

        if self.is_login_action()
            || self.authorize_unconfigured()
            || self.is_authorized(Some(&user)).await
        {
            return Ok(Decision::Continue);
        }

        self.unauthorized()
    }

    /// Unauthenticated handling.
    ///
    /// The last authenticator's hook goes first; any decision it returns is
    /// final. Then the login action renders, normal requests are sent to the
    /// login action, and background requests get a 403.
    pub async fn unauthenticated(&mut self) -> Decision {
        let gate = Arc::clone(&self.gate);
        if let Some(last) = gate.authenticators.last() {
            if let Some(decision) = last.adapter().unauthenticated(self.request.as_ref()).await {
                log::debug!("Authenticator '{}' handled the unauthenticated request", last.id());
                return decision;
            }
        }

        if self.is_login_action() {
            if !self.request.has_data() && !self.session.exists(REDIRECT_KEY) {
                if let Some(referrer) = self.request.referrer() {
                    let target = url::local_referrer(referrer, self.host())
                        .unwrap_or_else(|| "/".to_string());
                    self.session.set(REDIRECT_KEY, Value::String(target));
                }
            }
            return Decision::Continue;
        }

        if !self.request.is_background() {
            self.flash_auth_error();
            self.session
                .set(REDIRECT_KEY, Value::String(self.request.here().to_string()));
            let login_action = self.config.login_action().to_string();
            log::debug!("Unauthenticated request sent to {login_action}");
            return Decision::Redirect(login_action);
        }

        match self.config.ajax_login() {
            Some(element) => Decision::Render {
                element: element.to_string(),
                status: StatusCode::FORBIDDEN,
            },
            None => Decision::Reject(StatusCode::FORBIDDEN),
        }
    }

    /// Unauthorized handling.
    pub fn unauthorized(&mut self) -> Result<Decision> {
        self.ensure_defaults();
        let target = match self.config.unauthorized_policy() {
            UnauthorizedPolicy::Forbid => {
                let message = self.config.auth_error().unwrap_or_default().to_string();
                log::warn!("Access denied to '{}'", self.request.here());
                return Err(AuthError::Forbidden(message));
            }
            UnauthorizedPolicy::To(target) => target.to_string(),
            UnauthorizedPolicy::Referrer => {
                let fallback = self.config.login_redirect().unwrap_or("/");
                self.request
                    .referrer()
                    .and_then(|referrer| url::local_referrer(referrer, self.host()))
                    .filter(|path| path != "/")
                    .unwrap_or_else(|| fallback.to_string())
            }
        };

        log::warn!("Access denied to '{}', redirecting to {target}", self.request.here());
        self.flash_auth_error();
        Ok(Decision::Redirect(target))
    }

    /// Log a user in.
    ///
    /// Without a record the request is identified through the authenticator
    /// chain. On success the session id is regenerated and the record is
    /// stored. Returns whether a user is now resolvable.
    pub async fn login(&mut self, user: Option<UserRecord>) -> bool {
        self.ensure_defaults();
        let user = match user.filter(|user| !user.is_empty()) {
            Some(user) => Some(user),
            None => self.identify().await,
        };

        if let Some(user) = user {
            self.session.regenerate_id();
            match self.config.session_key() {
                Some(key) => {
                    self.session.set(key, user.to_value());
                    self.user = None;
                }
                None => self.user = Some(user),
            }
            log::info!("User logged in");
        }
        self.user().is_some()
    }

    /// Log the current user out and return the post-logout URL.
    pub async fn logout(&mut self) -> String {
        self.ensure_defaults();
        let user = self.user();
        let gate = Arc::clone(&self.gate);
        for provider in &gate.authenticators {
            provider.adapter().logout(user.as_ref()).await;
        }

        if let Some(key) = self.config.session_key() {
            self.session.delete(key);
        }
        self.session.delete(REDIRECT_KEY);
        self.session.regenerate_id();
        self.user = None;
        log::info!("User logged out");

        url::normalize(self.config.logout_redirect())
    }

    /// Identify the user from the current request's credentials.
    pub async fn identify(&mut self) -> Option<UserRecord> {
        let request = Arc::clone(&self.request);
        self.identify_request(request.as_ref()).await
    }

    /// Identify a user from `request`'s credentials.
    ///
    /// The first authenticator producing a record wins and no later one is
    /// consulted.
    pub async fn identify_request(&mut self, request: &dyn RequestContext) -> Option<UserRecord> {
        let gate = Arc::clone(&self.gate);
        for provider in &gate.authenticators {
            log::debug!("Trying authenticator '{}'", provider.id());
            let Some(user) = provider.adapter().authenticate(request).await else {
                continue;
            };
            if user.is_empty() {
                continue;
            }
            if self.authentication_provider.is_none() {
                self.authentication_provider = Some(provider.clone());
            }
            return Some(user);
        }
        None
    }

    /// Whether `user` (or the current user) may access the current request.
    pub async fn is_authorized(&mut self, user: Option<&UserRecord>) -> bool {
        let request = Arc::clone(&self.request);
        self.is_authorized_for(user, request.as_ref()).await
    }

    /// Whether `user` (or the current user) may access `request`.
    ///
    /// The first authorizer granting access wins. False when no authorizers
    /// are configured or none grants.
    pub async fn is_authorized_for(
        &mut self,
        user: Option<&UserRecord>,
        request: &dyn RequestContext,
    ) -> bool {
        let current;
        let user = match user {
            Some(user) => user,
            None => match self.user() {
                Some(found) => {
                    current = found;
                    &current
                }
                None => return false,
            },
        };

        let gate = Arc::clone(&self.gate);
        for provider in &gate.authorizers {
            if provider.adapter().authorize(user, request).await {
                log::debug!("Authorizer '{}' granted access", provider.id());
                if self.authorization_provider.is_none() {
                    self.authorization_provider = Some(provider.clone());
                }
                return true;
            }
        }
        false
    }

    /// Exempt actions from authentication.
    pub fn allow<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed.allow(actions);
    }

    /// Exempt every action.
    pub fn allow_all(&mut self) {
        self.allowed.allow_all();
    }

    /// Require authentication again for actions.
    pub fn deny<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed.deny(actions);
    }

    /// Clear the allowed set.
    pub fn deny_all(&mut self) {
        self.allowed.deny_all();
    }

    /// Current allowed set.
    pub fn allowed(&self) -> &AllowedActions {
        &self.allowed
    }

    /// Pass an action → operation mapping to every authorizer.
    pub fn map_actions(&self, map: &ActionMap) {
        self.gate.map_actions(map);
    }

    /// Get or set the post-login redirect target.
    ///
    /// With a URL, it is stored as the pending target and returned. Without
    /// one, a pending target is consumed; a pending login action, or no
    /// pending target at all, yields `login_redirect` or `/`.
    pub fn redirect_url(&mut self, target: Option<&str>) -> String {
        self.ensure_defaults();
        if let Some(target) = target {
            self.session
                .set(REDIRECT_KEY, Value::String(target.to_string()));
            return target.to_string();
        }

        let fallback = self.config.login_redirect().unwrap_or("/").to_string();
        let Some(pending) = self.session.get(REDIRECT_KEY) else {
            return fallback;
        };
        self.session.delete(REDIRECT_KEY);

        match pending.as_str() {
            Some(pending)
                if !pending.is_empty()
                    && url::normalize(pending) != url::normalize(self.config.login_action()) =>
            {
                pending.to_string()
            }
            _ => fallback,
        }
    }

    /// The current user: cached for this request, else from the session.
    ///
    /// Never triggers identification.
    pub fn user(&self) -> Option<UserRecord> {
        if let Some(user) = self.user.as_ref().filter(|user| !user.is_empty()) {
            return Some(user.clone());
        }
        let key = self.config.session_key()?;
        self.session.get(key).and_then(UserRecord::from_value)
    }

    /// One field of the current user, by dotted path.
    pub fn user_field(&self, path: &str) -> Option<Value> {
        self.user()?.get(path).cloned()
    }

    /// The authenticator that identified the user during this request.
    pub fn authentication_provider(&self) -> Option<&Provider<dyn Authenticator>> {
        self.authentication_provider.as_ref()
    }

    /// The authorizer that granted access during this request.
    pub fn authorization_provider(&self) -> Option<&Provider<dyn Authorizer>> {
        self.authorization_provider.as_ref()
    }

    /// Queue an error flash message with the configured key and params.
    ///
    /// Empty messages are dropped.
    pub fn flash(&mut self, message: &str) {
        self.ensure_defaults();
        if message.is_empty() {
            return;
        }
        let flash = self.config.flash.clone().unwrap_or_default();
        let mut params = flash.params;
        params
            .entry("key".to_string())
            .or_insert(Value::String(flash.key));
        self.session.flash(message, "error", params);
    }

    /// Replace the request (e.g. once a handler has parsed submitted data).
    pub fn set_request(&mut self, request: Arc<dyn RequestContext>) {
        self.request = request;
    }

    /// Current request.
    pub fn request(&self) -> &dyn RequestContext {
        self.request.as_ref()
    }

    /// Session bound to this request.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Effective configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Per-request configuration overrides.
    pub fn config_mut(&mut self) -> &mut AuthConfig {
        &mut self.config
    }

    fn ensure_defaults(&mut self) {
        if !self.defaults_applied {
            self.config.apply_defaults();
            self.defaults_applied = true;
        }
    }

    async fn lookup_user(&mut self) -> UserLookup {
        if let Some(user) = self.user.clone().filter(|user| !user.is_empty()) {
            self.session.delete(REDIRECT_KEY);
            return UserLookup::Found {
                user,
                source: UserSource::Cache,
            };
        }
        if let Some(user) = self.user() {
            self.session.delete(REDIRECT_KEY);
            return UserLookup::Found {
                user,
                source: UserSource::Session,
            };
        }

        let gate = Arc::clone(&self.gate);
        for provider in &gate.authenticators {
            if let Some(user) = provider.adapter().get_user(self.request.as_ref()).await {
                if user.is_empty() {
                    continue;
                }
                log::debug!("Authenticator '{}' identified the request", provider.id());
                self.user = Some(user.clone());
                return UserLookup::Found {
                    user,
                    source: UserSource::Stateless,
                };
            }
        }
        UserLookup::NotFound
    }

    /// No `authorize` block at all. A block that resolves to no adapters
    /// still runs authorization, which then denies.
    fn authorize_unconfigured(&self) -> bool {
        self.config
            .authorize
            .as_ref()
            .is_none_or(AdapterConfig::is_empty)
    }

    fn is_login_action(&self) -> bool {
        url::normalize(self.request.url()) == url::normalize(self.config.login_action())
    }

    fn host(&self) -> Option<&str> {
        self.request.env("HTTP_HOST")
    }

    fn flash_auth_error(&mut self) {
        if let Some(message) = self.config.auth_error().map(str::to_string) {
            self.flash(&message);
        }
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("allowed", &self.allowed)
            .field("user", &self.user)
            .field("authentication_provider", &self.authentication_provider)
            .field("authorization_provider", &self.authorization_provider)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
