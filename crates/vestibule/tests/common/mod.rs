//! Common test utilities and harness for vestibule integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vestibule::{
    AdapterRegistry, AuthConfig, Authenticator, Authorizer, Decision, Gate, Guard, MemorySession,
    MemorySessionStore, RequestContext, RequestInfo, UserRecord,
};

/// Shared log of adapter calls, as `"<id>:<method>"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Authenticator returning a fixed record and logging every call.
pub struct Recorder {
    id: String,
    user: Option<UserRecord>,
    calls: CallLog,
}

#[async_trait]
impl Authenticator for Recorder {
    async fn authenticate(&self, _request: &dyn RequestContext) -> Option<UserRecord> {
        self.calls.lock().unwrap().push(format!("{}:authenticate", self.id));
        self.user.clone()
    }

    async fn get_user(&self, _request: &dyn RequestContext) -> Option<UserRecord> {
        self.calls.lock().unwrap().push(format!("{}:get_user", self.id));
        None
    }

    async fn unauthenticated(&self, _request: &dyn RequestContext) -> Option<Decision> {
        self.calls.lock().unwrap().push(format!("{}:unauthenticated", self.id));
        None
    }

    async fn logout(&self, _user: Option<&UserRecord>) {
        self.calls.lock().unwrap().push(format!("{}:logout", self.id));
    }
}

/// Authorizer with a fixed answer.
pub struct Fixed(pub bool);

#[async_trait]
impl Authorizer for Fixed {
    async fn authorize(&self, _user: &UserRecord, _request: &dyn RequestContext) -> bool {
        self.0
    }
}

/// Test harness.
///
/// Holds a session store, a registry of mock adapters (`Form` identifies
/// nobody, `Allow`/`Deny` authorizers) and the shared call log.
pub struct TestHarness {
    pub store: MemorySessionStore,
    pub registry: AdapterRegistry,
    pub calls: CallLog,
}

impl TestHarness {
    /// Creates a harness with the default mock adapters.
    pub fn new() -> Self {
        let harness = Self {
            store: MemorySessionStore::new(),
            registry: AdapterRegistry::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        harness
            .with_authenticator("Form", None)
            .with_authorizer("Allow", true)
            .with_authorizer("Deny", false)
    }

    /// Registers a recording authenticator under `id`.
    pub fn with_authenticator(mut self, id: &str, user: Option<UserRecord>) -> Self {
        let calls = self.calls.clone();
        let name = id.to_string();
        self.registry.register_authenticator(id, move |_| {
            Ok(Arc::new(Recorder {
                id: name.clone(),
                user: user.clone(),
                calls: calls.clone(),
            }))
        });
        self
    }

    /// Registers a fixed-answer authorizer under `id`.
    pub fn with_authorizer(mut self, id: &str, answer: bool) -> Self {
        self.registry
            .register_authorizer(id, move |_| Ok(Arc::new(Fixed(answer))));
        self
    }

    /// Builds a gate for `config`.
    pub fn gate(&self, config: AuthConfig) -> Arc<Gate> {
        Arc::new(Gate::new(config, &self.registry).expect("gate should build"))
    }

    /// Opens a fresh session.
    pub fn session(&self) -> Arc<MemorySession> {
        Arc::new(self.store.session(None))
    }

    /// Starts a guard for `request` on `session`.
    pub fn guard(&self, gate: &Arc<Gate>, session: &Arc<MemorySession>, request: RequestInfo) -> Guard {
        gate.guard(session.clone(), Arc::new(request))
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample user.
pub fn alice() -> UserRecord {
    UserRecord::new()
        .with("id", 1)
        .with("username", "alice")
        .with("profile", serde_json::json!({"name": "Alice"}))
}

/// Config with the given authenticators and login action `/users/login`.
pub fn config(authenticate: &[&str]) -> AuthConfig {
    AuthConfig {
        authenticate: Some(vestibule::AdapterConfig::from_ids(authenticate.iter().copied())),
        login_action: Some("/users/login".to_string()),
        ..Default::default()
    }
}
