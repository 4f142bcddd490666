//! HTTP Basic authentication.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use serde_json::Value;
use vestibule::{
    Authenticator, Decision, Options, RequestContext, TerminalResponse, UserRecord,
};

use crate::error::{Error, Result};
use crate::users::{CredentialOptions, Credentials, UserStore};

/// Stateless authentication from the `Authorization: Basic` header.
///
/// Unauthenticated requests get a `401` challenge naming the realm
/// (`realm` option, else the request host, else `localhost`).
#[derive(Debug, Clone)]
pub struct BasicAuthenticator {
    credentials: Credentials,
    realm: Option<String>,
}

impl BasicAuthenticator {
    /// Build from adapter options.
    pub fn new(store: Arc<dyn UserStore>, options: &Options) -> Result<Self> {
        let realm = match options.get("realm") {
            None | Some(Value::Null) => None,
            Some(Value::String(realm)) => Some(realm.clone()),
            Some(other) => {
                return Err(Error::options("Basic", format!("realm must be a string, got {other}")));
            }
        };
        let options = CredentialOptions::from_options("Basic", options)?;
        Ok(Self {
            credentials: Credentials::new(store, options),
            realm,
        })
    }

    fn realm(&self, request: &dyn RequestContext) -> String {
        self.realm
            .clone()
            .or_else(|| request.env("HTTP_HOST").map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Decode `Basic <base64(user:pass)>`.
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn authenticate(&self, request: &dyn RequestContext) -> Option<UserRecord> {
        self.get_user(request).await
    }

    async fn get_user(&self, request: &dyn RequestContext) -> Option<UserRecord> {
        let (username, password) = decode_basic(request.env("HTTP_AUTHORIZATION")?)?;
        self.credentials.check(&username, &password).await
    }

    async fn unauthenticated(&self, request: &dyn RequestContext) -> Option<Decision> {
        let challenge = format!("Basic realm=\"{}\"", self.realm(request));
        Some(Decision::Respond(
            TerminalResponse::new(StatusCode::UNAUTHORIZED)
                .with_header("WWW-Authenticate", challenge)
                .with_body("Authentication required"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::store;
    use serde_json::json;
    use vestibule::RequestInfo;

    fn with_auth(user: &str, pass: &str) -> RequestInfo {
        let token = STANDARD.encode(format!("{user}:{pass}"));
        RequestInfo::new("view", "/posts/view/1").with_env("HTTP_AUTHORIZATION", format!("Basic {token}"))
    }

    #[test]
    fn test_decode_basic() {
        assert_eq!(
            decode_basic("Basic YWxpY2U6d29uZGVybGFuZA=="),
            Some(("alice".to_string(), "wonderland".to_string()))
        );
        assert_eq!(decode_basic("Bearer abc"), None);
        assert_eq!(decode_basic("Basic !!!"), None);
        assert_eq!(decode_basic("Basic bm9jb2xvbg=="), None);
    }

    #[tokio::test]
    async fn test_basic_get_user() {
        let auth = BasicAuthenticator::new(store(), &Options::new()).unwrap();
        let user = auth.get_user(&with_auth("alice", "wonderland")).await.unwrap();
        assert_eq!(user.get_str("username"), Some("alice"));
        assert!(auth.get_user(&with_auth("alice", "nope")).await.is_none());
        assert!(auth.get_user(&RequestInfo::new("view", "/")).await.is_none());
    }

    #[tokio::test]
    async fn test_basic_challenge_uses_realm_option() {
        let mut options = Options::new();
        options.insert("realm".into(), json!("api"));
        let auth = BasicAuthenticator::new(store(), &options).unwrap();
        let decision = auth.unauthenticated(&RequestInfo::new("view", "/")).await.unwrap();
        match decision {
            Decision::Respond(resp) => {
                assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
                assert_eq!(
                    resp.headers,
                    vec![("WWW-Authenticate".to_string(), "Basic realm=\"api\"".to_string())]
                );
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_basic_challenge_defaults_to_host() {
        let auth = BasicAuthenticator::new(store(), &Options::new()).unwrap();
        let request = RequestInfo::new("view", "/").with_env("HTTP_HOST", "example.com");
        let Some(Decision::Respond(resp)) = auth.unauthenticated(&request).await else {
            panic!("expected a challenge");
        };
        assert_eq!(resp.headers[0].1, "Basic realm=\"example.com\"");

        let Some(Decision::Respond(resp)) = auth.unauthenticated(&RequestInfo::new("view", "/")).await
        else {
            panic!("expected a challenge");
        };
        assert_eq!(resp.headers[0].1, "Basic realm=\"localhost\"");
    }

    #[test]
    fn test_realm_must_be_string() {
        let mut options = Options::new();
        options.insert("realm".into(), json!(5));
        assert!(BasicAuthenticator::new(store(), &options).is_err());
    }
}
