//! Request context seen by the gate and its adapters.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Header that marks a programmatic (background) request.
pub const REQUESTED_WITH: &str = "x-requested-with";

/// What the gate needs to know about an incoming request.
///
/// The framework owns routing and parsing; the gate only reads through
/// this narrow view.
pub trait RequestContext: Send + Sync {
    /// Resolved action name, as routed (not yet lowercased).
    fn action(&self) -> &str;

    /// Application-relative path of the request (compared to the login action).
    fn url(&self) -> &str;

    /// Full path (plus query) of the request, used as a return-to target.
    fn here(&self) -> &str;

    /// Submitted form/body data.
    fn data(&self) -> &Map<String, Value>;

    /// Whether the request carries submitted data.
    fn has_data(&self) -> bool {
        !self.data().is_empty()
    }

    /// Whether this is a programmatic/background request.
    fn is_background(&self) -> bool;

    /// Raw `Referer` header value.
    fn referrer(&self) -> Option<&str>;

    /// Environment lookup (`HTTP_*` header names and server variables).
    fn env(&self, key: &str) -> Option<&str>;
}

/// Owned request snapshot implementing [`RequestContext`].
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    action: String,
    url: String,
    here: String,
    data: Map<String, Value>,
    submitted: bool,
    background: bool,
    referrer: Option<String>,
    env: HashMap<String, String>,
}

impl RequestInfo {
    /// Create a request for `action` at `url`.
    pub fn new(action: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            action: action.into(),
            here: url.clone(),
            url,
            ..Default::default()
        }
    }

    /// Build from HTTP request parts.
    ///
    /// The body is not read, so `data` stays empty, but a body-carrying
    /// request (not `GET`/`HEAD`, with a content length or type) still
    /// reports [`has_data`](RequestContext::has_data).
    ///
    /// The action is the first segment of the (possibly nested) path,
    /// `index` when that path is empty: the `/action/args` convention of a
    /// controller mounted under a prefix. `url` and `here` come from the
    /// original URI when a router recorded one.
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        let original = parts
            .extensions
            .get::<axum::extract::OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let here = original
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| original.path().to_string());

        let mut env = HashMap::new();
        for (name, value) in &parts.headers {
            if let Ok(value) = value.to_str() {
                let key = format!("HTTP_{}", name.as_str().to_uppercase().replace('-', "_"));
                env.insert(key, value.to_string());
            }
        }
        env.insert("REQUEST_METHOD".to_string(), parts.method.to_string());

        let background = parts
            .headers
            .get(REQUESTED_WITH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
        let referrer = parts
            .headers
            .get(http::header::REFERER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            action: action_from_path(parts.uri.path()),
            url: original.path().to_string(),
            here,
            data: Map::new(),
            submitted: carries_body(parts),
            background,
            referrer,
            env,
        }
    }

    /// Override the routed action name.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Override the return-to URL.
    pub fn with_here(mut self, here: impl Into<String>) -> Self {
        self.here = here.into();
        self
    }

    /// Attach submitted data.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Mark as a programmatic request.
    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Set the referrer.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Set an environment value.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl RequestContext for RequestInfo {
    fn action(&self) -> &str {
        &self.action
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn here(&self) -> &str {
        &self.here
    }

    fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    fn has_data(&self) -> bool {
        self.submitted || !self.data.is_empty()
    }

    fn is_background(&self) -> bool {
        self.background
    }

    fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}

fn carries_body(parts: &http::request::Parts) -> bool {
    if parts.method == http::Method::GET || parts.method == http::Method::HEAD {
        return false;
    }
    let length = parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    match length {
        Some(length) => length > 0,
        None => parts.headers.contains_key(http::header::CONTENT_TYPE),
    }
}

/// First path segment of `path`, or `index` for the root.
pub fn action_from_path(path: &str) -> String {
    path.split('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("index")
        .to_string()
}
