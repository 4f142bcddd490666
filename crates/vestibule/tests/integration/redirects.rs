//! Integration tests for redirect bookkeeping.

use serde_json::json;
use vestibule::{AdapterConfig, AuthConfig, Decision, REDIRECT_KEY, RequestInfo, Session};

use crate::common::{TestHarness, alice, config};

#[tokio::test]
async fn test_login_flow_returns_to_original_page() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        login_redirect: Some("/dashboard".into()),
        ..config(&["Form"])
    });
    let session = harness.session();

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("view", "/posts/view/9"));
    assert_eq!(
        guard.process().await.unwrap(),
        Decision::Redirect("/users/login".into())
    );

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));
    assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    assert!(guard.login(Some(alice())).await);
    assert_eq!(guard.redirect_url(None), "/posts/view/9");
    assert_eq!(guard.redirect_url(None), "/dashboard");
}

#[tokio::test]
async fn test_redirect_url_second_read_falls_back() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

    session.set(REDIRECT_KEY, json!("/posts/3"));
    assert_eq!(guard.redirect_url(None), "/posts/3");
    assert_eq!(guard.redirect_url(None), "/");
}

#[tokio::test]
async fn test_stashed_login_action_yields_login_redirect() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        login_redirect: Some("/home".into()),
        ..config(&["Form"])
    });
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

    for stashed in ["/users/login", "users/login/", "/users//login?next=1"] {
        session.set(REDIRECT_KEY, json!(stashed));
        assert_eq!(guard.redirect_url(None), "/home");
        assert!(session.get(REDIRECT_KEY).is_none());
    }
}

#[tokio::test]
async fn test_login_page_keeps_existing_pending_redirect() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    session.set(REDIRECT_KEY, json!("/posts/1"));

    let request = RequestInfo::new("login", "/users/login")
        .with_referrer("http://example.com/about")
        .with_env("HTTP_HOST", "example.com");
    let mut guard = harness.guard(&gate, &session, request);
    assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    assert_eq!(session.get(REDIRECT_KEY), Some(json!("/posts/1")));
}

#[tokio::test]
async fn test_login_page_stores_root_for_foreign_referrer() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();

    let request = RequestInfo::new("login", "/users/login")
        .with_referrer("https://elsewhere.test/page")
        .with_env("HTTP_HOST", "example.com");
    let mut guard = harness.guard(&gate, &session, request);
    guard.process().await.unwrap();
    assert_eq!(session.get(REDIRECT_KEY), Some(json!("/")));
}

#[tokio::test]
async fn test_unauthorized_without_referrer_uses_login_redirect() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        authorize: Some(AdapterConfig::from_ids(["Deny"])),
        login_redirect: Some("/dashboard".into()),
        ..config(&["Form"])
    });
    let session = harness.session();
    session.set("Auth.User", alice().to_value());

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("edit", "/edit/1"));
    assert_eq!(
        guard.process().await.unwrap(),
        Decision::Redirect("/dashboard".into())
    );
    assert_eq!(session.take_flash("auth").len(), 1);
}

#[tokio::test]
async fn test_authorized_user_passes_and_clears_stale_redirect() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        authorize: Some(AdapterConfig::from_ids(["Deny", "Allow"])),
        ..config(&["Form"])
    });
    let session = harness.session();
    session.set("Auth.User", alice().to_value());
    session.set(REDIRECT_KEY, json!("/old"));

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("edit", "/edit/1"));
    assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    assert_eq!(guard.authorization_provider().map(|p| p.id()), Some("Allow"));
    assert!(session.get(REDIRECT_KEY).is_none());
}
