//! Adapter contracts and gate decisions.
//!
//! Credential schemes plug in as [`Authenticator`]s, access policies as
//! [`Authorizer`]s. Both are consulted in configured order; the first one
//! to succeed wins.

use std::collections::HashMap;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::{Map, Value};

use crate::request::RequestContext;
use crate::user::UserRecord;

/// Options handed to an adapter factory.
pub type Options = Map<String, Value>;

/// Action name → operation name (e.g. `"publish" → "update"`).
pub type ActionMap = HashMap<String, String>;

/// A complete response produced by an adapter, e.g. an auth challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalResponse {
    /// Status code.
    pub status: StatusCode,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
}

impl TerminalResponse {
    /// Create a response with an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Outcome of running a request through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Let the request through.
    Continue,
    /// Send the client elsewhere.
    Redirect(String),
    /// Bare rejection.
    Reject(StatusCode),
    /// Render a named view element with the given status.
    Render { element: String, status: StatusCode },
    /// An adapter-built response.
    Respond(TerminalResponse),
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_continue(&self) -> bool {
        matches!(self, Decision::Continue)
    }
}

/// Identifies a user from request credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Identify a user from credentials carried by the request.
    async fn authenticate(&self, request: &dyn RequestContext) -> Option<UserRecord>;

    /// Stateless identification on every request (tokens, HTTP auth).
    async fn get_user(&self, _request: &dyn RequestContext) -> Option<UserRecord> {
        None
    }

    /// Called when nobody could be identified. Any `Some` is terminal.
    async fn unauthenticated(&self, _request: &dyn RequestContext) -> Option<Decision> {
        None
    }

    /// Adapter-specific cleanup when the user logs out.
    async fn logout(&self, _user: Option<&UserRecord>) {}
}

/// Decides whether an identified user may perform the requested action.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Grant (`true`) or deny (`false`) access.
    async fn authorize(&self, user: &UserRecord, request: &dyn RequestContext) -> bool;

    /// Extend the action → operation mapping.
    fn map_actions(&self, _map: &ActionMap) {}
}
