//! Integration tests for `Guard::process`.

use http::StatusCode;
use serde_json::json;
use vestibule::config::DEFAULT_AUTH_ERROR;
use vestibule::{
    AdapterConfig, AuthConfig, AuthError, Decision, REDIRECT_KEY, RequestInfo, Session,
    UnauthorizedRedirect,
};

use crate::common::{TestHarness, alice, config};

#[tokio::test]
async fn test_unauthenticated_view_redirects_to_login() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("view", "/posts/view/3"));

    let decision = guard.process().await.unwrap();
    assert_eq!(decision, Decision::Redirect("/users/login".into()));
    assert_eq!(session.get(REDIRECT_KEY), Some(json!("/posts/view/3")));

    let flashes = session.take_flash("auth");
    assert_eq!(flashes.len(), 1);
    assert_eq!(flashes[0].message, DEFAULT_AUTH_ERROR);
}

#[tokio::test]
async fn test_session_user_without_authorizers_continues() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    session.set("Auth.User", alice().to_value());

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("view", "/posts/view/3"));
    assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_denied_without_redirect_is_forbidden() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        authorize: Some(AdapterConfig::from_ids(["Deny"])),
        unauthorized_redirect: Some(UnauthorizedRedirect::Flag(false)),
        auth_error: Some("Keep out".into()),
        ..config(&["Form"])
    });
    let session = harness.session();
    session.set("Auth.User", alice().to_value());

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("edit", "/posts/edit/3"));
    let err = guard.process().await.unwrap_err();
    match &err {
        AuthError::Forbidden(message) => assert_eq!(message, "Keep out"),
        other => panic!("expected Forbidden, got {other:?}"),
    }
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert!(session.take_flash("auth").is_empty());
}

#[tokio::test]
async fn test_background_request_without_ajax_login_is_rejected() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    let request = RequestInfo::new("view", "/posts/view/3").background();

    let mut guard = harness.guard(&gate, &session, request);
    assert_eq!(
        guard.process().await.unwrap(),
        Decision::Reject(StatusCode::FORBIDDEN)
    );
    assert!(session.get(REDIRECT_KEY).is_none());
}

#[tokio::test]
async fn test_allowed_actions_skip_identification() {
    let harness = TestHarness::new().with_authenticator("Token", Some(alice()));
    let gate = harness.gate(config(&["Form", "Token"]));
    let session = harness.session();

    for action in ["index", "INDEX", "Index"] {
        let mut guard = harness.guard(&gate, &session, RequestInfo::new(action, "/posts"));
        guard.allow(["index"]);
        assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    }
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_allow_all_exempts_every_action() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();

    for action in ["index", "view", "edit", "delete"] {
        let mut guard = harness.guard(&gate, &session, RequestInfo::new(action, "/posts"));
        guard.allow_all();
        assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    }
    assert!(session.get(REDIRECT_KEY).is_none());
}

#[tokio::test]
async fn test_deny_after_allow_all_restores_check() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("edit", "/posts/edit/1"));
    guard.allow_all();
    guard.deny(["edit"]);
    assert_eq!(
        guard.process().await.unwrap(),
        Decision::Redirect("/users/login".into())
    );
}

#[tokio::test]
async fn test_allow_list_is_per_request() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("view", "/view"));
    guard.allow(["view"]);
    assert_eq!(guard.process().await.unwrap(), Decision::Continue);

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("view", "/view"));
    assert!(!guard.process().await.unwrap().is_continue());
}

#[tokio::test]
async fn test_unauthenticated_hook_of_last_authenticator_only() {
    let harness = TestHarness::new().with_authenticator("Basic", None);
    let gate = harness.gate(config(&["Basic", "Form"]));
    let session = harness.session();

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("view", "/view"));
    guard.process().await.unwrap();
    assert_eq!(
        harness.calls(),
        ["Basic:get_user", "Form:get_user", "Form:unauthenticated"]
    );
}

#[tokio::test]
async fn test_all_block_only_denies_access() {
    let harness = TestHarness::new();
    let mut options = vestibule::Options::new();
    options.insert("action_path".into(), json!("controllers/"));
    let gate = harness.gate(AuthConfig {
        authorize: Some(AdapterConfig::new().with("all", options)),
        ..config(&["Form"])
    });
    let session = harness.session();
    session.set("Auth.User", alice().to_value());

    assert!(gate.authorizers().is_empty());

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("edit", "/edit"));
    assert_eq!(guard.process().await.unwrap(), Decision::Redirect("/".into()));
    assert!(!guard.is_authorized(None).await);
    assert!(guard.authorization_provider().is_none());
    assert_eq!(session.take_flash("auth")[0].message, DEFAULT_AUTH_ERROR);
}

#[tokio::test]
async fn test_missing_authorize_block_lets_user_through() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    session.set("Auth.User", alice().to_value());

    let mut guard = harness.guard(&gate, &session, RequestInfo::new("edit", "/edit"));
    assert_eq!(guard.process().await.unwrap(), Decision::Continue);
    assert!(!guard.is_authorized(None).await);
}
