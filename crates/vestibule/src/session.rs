//! Session contract and an in-memory store.
//!
//! The gate talks to one [`Session`] per request. A [`SessionStore`] is
//! shared across requests and hands out sessions by id.
//!
//! [`MemorySessionStore`] keeps every session behind its own mutex, so
//! concurrent requests on different sessions never contend on data, and
//! `regenerate_id` moves the entry under the store's write lock so no
//! request can observe a half-renamed session. Idle and emptied sessions
//! are dropped, so the store stays bounded by the active clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

/// A queued flash message.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashMessage {
    /// Message text.
    pub message: String,
    /// Category, e.g. `error`.
    pub category: String,
    /// Extra rendering params (includes `key`).
    pub params: Map<String, Value>,
}

/// Key/value state scoped to one client session.
pub trait Session: Send + Sync {
    /// Current session identifier.
    fn id(&self) -> String;

    /// Read a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value.
    fn set(&self, key: &str, value: Value);

    /// Remove a value.
    fn delete(&self, key: &str);

    /// Whether a value is present.
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Move the session to a fresh identifier, keeping its data.
    fn regenerate_id(&self);

    /// Queue a flash message. `params["key"]` selects the message domain.
    fn flash(&self, message: &str, category: &str, params: Map<String, Value>);
}

/// Shared store that opens sessions by id.
pub trait SessionStore: Send + Sync + 'static {
    /// Open the session for `id`.
    ///
    /// Unknown or missing ids get a fresh identifier; client-chosen ids are
    /// never adopted.
    fn open(&self, id: Option<&str>) -> Arc<dyn Session>;
}

/// Idle time after which [`MemorySessionStore`] discards a session.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct SessionData {
    values: HashMap<String, Value>,
    flashes: HashMap<String, Vec<FlashMessage>>,
    touched: Instant,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            flashes: HashMap::new(),
            touched: Instant::now(),
        }
    }
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.values.is_empty() && self.flashes.is_empty()
    }

    fn is_idle(&self, ttl: Duration) -> bool {
        self.touched.elapsed() > ttl
    }
}

type Entries = HashMap<String, Arc<Mutex<SessionData>>>;

struct Shared {
    entries: RwLock<Entries>,
    idle_ttl: Duration,
    last_sweep: Mutex<Instant>,
}

impl Shared {
    /// Live entry for `id`, refreshing its idle timer. Idle entries are dropped.
    fn live(&self, id: &str) -> Option<Arc<Mutex<SessionData>>> {
        let data = read(&self.entries).get(id).cloned()?;
        let idle = {
            let mut data = lock(&data);
            let idle = data.is_idle(self.idle_ttl);
            if !idle {
                data.touched = Instant::now();
            }
            idle
        };
        if idle {
            self.discard_if(id, |data| data.is_idle(self.idle_ttl));
            return None;
        }
        Some(data)
    }

    fn create(&self, id: &str) -> Arc<Mutex<SessionData>> {
        self.sweep_if_due();
        write(&self.entries)
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Remove `id` when `predicate` holds for its data.
    fn discard_if(&self, id: &str, predicate: impl Fn(&SessionData) -> bool) {
        let mut entries = write(&self.entries);
        let discard = entries.get(id).is_some_and(|data| predicate(&lock(data)));
        if discard {
            entries.remove(id);
        }
    }

    /// Drop idle entries, at most once per quarter of the idle TTL.
    fn sweep_if_due(&self) {
        {
            let mut last = lock(&self.last_sweep);
            if last.elapsed() < self.idle_ttl / 4 {
                return;
            }
            *last = Instant::now();
        }
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|_, data| !lock(data).is_idle(self.idle_ttl));
        let swept = before - entries.len();
        if swept > 0 {
            log::debug!("Swept {swept} idle session(s)");
        }
    }
}

/// In-memory [`SessionStore`].
///
/// Sessions idle for longer than the TTL are discarded, and a session left
/// with no values and no flash messages is removed immediately.
#[derive(Clone)]
pub struct MemorySessionStore {
    shared: Arc<Shared>,
}

impl MemorySessionStore {
    /// Create an empty store with [`DEFAULT_IDLE_TTL`].
    pub fn new() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }

    /// Create an empty store discarding sessions idle for longer than `ttl`.
    pub fn with_idle_ttl(ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                idle_ttl: ttl,
                last_sweep: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Idle TTL.
    pub fn idle_ttl(&self) -> Duration {
        self.shared.idle_ttl
    }

    /// Open a session with its concrete type (handy for inspecting flashes).
    pub fn session(&self, id: Option<&str>) -> MemorySession {
        self.shared.sweep_if_due();
        let known = id.filter(|id| self.shared.live(id).is_some());
        MemorySession {
            shared: self.shared.clone(),
            id: Mutex::new(known.map_or_else(new_session_id, str::to_string)),
        }
    }

    /// Number of live sessions holding data.
    pub fn len(&self) -> usize {
        read(&self.shared.entries)
            .values()
            .filter(|data| !lock(data).is_idle(self.shared.idle_ttl))
            .count()
    }

    /// Whether the store holds no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn open(&self, id: Option<&str>) -> Arc<dyn Session> {
        Arc::new(self.session(id))
    }
}

/// Handle to one session inside a [`MemorySessionStore`].
pub struct MemorySession {
    shared: Arc<Shared>,
    id: Mutex<String>,
}

impl MemorySession {
    /// Drain queued flash messages for `key`.
    pub fn take_flash(&self, key: &str) -> Vec<FlashMessage> {
        let Some(data) = self.existing() else {
            return Vec::new();
        };
        let drained = lock(&data).flashes.remove(key).unwrap_or_default();
        self.shared.discard_if(&self.id(), SessionData::is_empty);
        drained
    }

    fn existing(&self) -> Option<Arc<Mutex<SessionData>>> {
        let id = lock(&self.id).clone();
        self.shared.live(&id)
    }

    fn entry(&self) -> Arc<Mutex<SessionData>> {
        if let Some(data) = self.existing() {
            return data;
        }
        let id = lock(&self.id).clone();
        self.shared.create(&id)
    }
}

impl Session for MemorySession {
    fn id(&self) -> String {
        lock(&self.id).clone()
    }

    fn get(&self, key: &str) -> Option<Value> {
        let data = self.existing()?;
        let value = lock(&data).values.get(key).cloned();
        value
    }

    fn set(&self, key: &str, value: Value) {
        let data = self.entry();
        lock(&data).values.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        if let Some(data) = self.existing() {
            lock(&data).values.remove(key);
            self.shared.discard_if(&self.id(), SessionData::is_empty);
        }
    }

    fn regenerate_id(&self) {
        let mut id = lock(&self.id);
        let fresh = new_session_id();
        let mut entries = write(&self.shared.entries);
        if let Some(data) = entries.remove(id.as_str()) {
            entries.insert(fresh.clone(), data);
        }
        log::debug!("Session id regenerated");
        *id = fresh;
    }

    fn flash(&self, message: &str, category: &str, params: Map<String, Value>) {
        let key = params
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or("flash")
            .to_string();
        let data = self.entry();
        lock(&data)
            .flashes
            .entry(key)
            .or_default()
            .push(FlashMessage {
                message: message.to_string(),
                category: category.to_string(),
                params,
            });
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
