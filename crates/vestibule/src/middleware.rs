//! Tower middleware running every request through a [`Gate`].
//!
//! `AuthLayer` and `AuthService` open the client's session from a cookie,
//! run [`Guard::process`] and turn its [`Decision`] into a response. Requests
//! that may continue carry three extensions into the inner service:
//!
//! - [`CurrentUser`] when a user was resolved
//! - [`AuthHandle`] for login/logout/redirect bookkeeping in handlers
//! - the [`RequestInfo`] the gate saw
//!
//! A `Set-Cookie` header is added whenever the session id changed
//! (new session, login, logout).

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_TYPE, COOKIE, HeaderName, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request, StatusCode};
use tokio::sync::{Mutex, MutexGuard};
use tower::{Layer, Service};

use crate::adapter::{Decision, TerminalResponse};
use crate::error::AuthError;
use crate::gate::{Gate, Guard};
use crate::request::RequestInfo;
use crate::session::SessionStore;
use crate::user::CurrentUser;

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "vestibule_session";

/// Per-request [`Guard`] shared with handlers through request extensions.
#[derive(Clone)]
pub struct AuthHandle(Arc<Mutex<Guard>>);

impl AuthHandle {
    /// Wrap a guard.
    pub fn new(guard: Guard) -> Self {
        Self(Arc::new(Mutex::new(guard)))
    }

    /// Lock the guard.
    pub async fn lock(&self) -> MutexGuard<'_, Guard> {
        self.0.lock().await
    }
}

/// Tower `Layer` that puts a [`Gate`] in front of services.
#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<Gate>,
    store: Arc<dyn SessionStore>,
    cookie: String,
}

impl AuthLayer {
    /// Create a layer for `gate`, keeping sessions in `store`.
    pub fn new(gate: Arc<Gate>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            gate,
            store,
            cookie: DEFAULT_COOKIE_NAME.to_string(),
        }
    }

    /// Use a different session cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie = name.into();
        self
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            gate: self.gate.clone(),
            store: self.store.clone(),
            cookie: self.cookie.clone(),
        }
    }
}

/// Tower `Service` that gates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    gate: Arc<Gate>,
    store: Arc<dyn SessionStore>,
    cookie: String,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let gate = self.gate.clone();
        let store = self.store.clone();
        let cookie = self.cookie.clone();

        Box::pin(async move {
            let incoming = session_cookie(req.headers(), &cookie);
            let session = store.open(incoming.as_deref());

            let (mut parts, body) = req.into_parts();
            let info = RequestInfo::from_parts(&parts);
            let mut guard = gate.guard(session.clone(), Arc::new(info.clone()));

            let mut response = match guard.process().await {
                Ok(Decision::Continue) => {
                    if let Some(user) = guard.user() {
                        parts.extensions.insert(CurrentUser(user));
                    }
                    parts.extensions.insert(info);
                    parts.extensions.insert(AuthHandle::new(guard));
                    let resp = inner
                        .call(Request::from_parts(parts, body))
                        .await
                        .unwrap_or_else(|infallible| match infallible {});
                    resp.into_response()
                }
                Ok(decision) => decision_response(decision),
                Err(err) => error_response(&err),
            };

            let id = session.id();
            if incoming.as_deref() != Some(id.as_str()) {
                let value = format!("{cookie}={id}; Path=/; HttpOnly; SameSite=Lax");
                match HeaderValue::from_str(&value) {
                    Ok(value) => {
                        response.headers_mut().append(SET_COOKIE, value);
                    }
                    Err(e) => log::warn!("Session cookie not set: {e}"),
                }
            }

            Ok(response)
        })
    }
}

/// Session id from the `Cookie` header(s).
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Build the response for a terminal gate decision.
fn decision_response(decision: Decision) -> Response {
    match decision {
        Decision::Continue => StatusCode::OK.into_response(),
        Decision::Redirect(url) => match HeaderValue::from_str(&url) {
            Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
            Err(_) => {
                log::error!("Redirect target is not a valid header value: {url:?}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Decision::Reject(status) => status.into_response(),
        Decision::Render { element, status } => json_error(
            status,
            serde_json::json!({
                "error": {
                    "category": "authentication",
                    "element": element,
                }
            }),
        ),
        Decision::Respond(terminal) => terminal_response(terminal),
    }
}

fn terminal_response(terminal: TerminalResponse) -> Response {
    let mut response = (terminal.status, terminal.body).into_response();
    for (name, value) in terminal.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => log::warn!("Dropping invalid adapter header '{name}'"),
        }
    }
    response
}

/// Build the response for a gate error.
fn error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Forbidden(message) => json_error(
            err.status(),
            serde_json::json!({
                "error": {
                    "category": "authorization",
                    "message": message,
                }
            }),
        ),
        other => {
            log::error!("Gate failed: {other}");
            json_error(
                other.status(),
                serde_json::json!({
                    "error": {
                        "category": "internal",
                        "message": "internal error",
                    }
                }),
            )
        }
    }
}

fn json_error(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(CONTENT_TYPE, "application/json")],
        serde_json::to_string(&body).unwrap_or_default(),
    )
        .into_response()
}
