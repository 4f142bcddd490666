//! Integration tests for identification, login and logout.

use proptest::prelude::*;
use serde_json::json;
use vestibule::{
    AuthConfig, REDIRECT_KEY, RequestInfo, Session, Setting, UserRecord,
};

use crate::common::{TestHarness, alice, config};

#[tokio::test]
async fn test_identify_stops_at_first_success() {
    let bob = UserRecord::new().with("id", 2).with("username", "bob");
    let harness = TestHarness::new()
        .with_authenticator("Empty", Some(UserRecord::new()))
        .with_authenticator("Alice", Some(alice()))
        .with_authenticator("Bob", Some(bob));
    let gate = harness.gate(config(&["Form", "Empty", "Alice", "Bob"]));
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

    let user = guard.identify().await.expect("alice should be identified");
    assert_eq!(user, alice());
    assert_eq!(
        harness.calls(),
        ["Form:authenticate", "Empty:authenticate", "Alice:authenticate"]
    );
    assert_eq!(guard.authentication_provider().map(|p| p.id()), Some("Alice"));
}

#[tokio::test]
async fn test_login_then_user_returns_same_record() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

    assert!(guard.login(Some(alice())).await);
    assert_eq!(guard.user(), Some(alice()));
    assert_eq!(guard.user_field("profile.name"), Some(json!("Alice")));

    let next = harness.guard(&gate, &session, RequestInfo::new("view", "/view"));
    assert_eq!(next.user(), Some(alice()));
}

#[tokio::test]
async fn test_login_without_record_identifies_request() {
    let harness = TestHarness::new().with_authenticator("Alice", Some(alice()));
    let gate = harness.gate(config(&["Form", "Alice"]));
    let session = harness.session();
    let before = session.id();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

    assert!(guard.login(None).await);
    assert_ne!(session.id(), before);
    assert_eq!(guard.user_field("username"), Some(json!("alice")));
}

#[tokio::test]
async fn test_logout_clears_user_and_pending_redirect() {
    let harness = TestHarness::new();
    let gate = harness.gate(config(&["Form"]));
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("logout", "/users/logout"));
    guard.login(Some(alice())).await;
    guard.redirect_url(Some("/posts/3"));
    let before = session.id();

    assert_eq!(guard.logout().await, "/users/login");
    assert!(guard.user().is_none());
    assert!(session.get(REDIRECT_KEY).is_none());
    assert_ne!(session.id(), before);
    assert_eq!(harness.calls(), ["Form:logout"]);
}

#[tokio::test]
async fn test_stateless_login_keeps_user_in_request_only() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        session_key: Some(Setting::Toggle(false)),
        ..config(&["Form"])
    });
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

    assert!(guard.login(Some(alice())).await);
    assert_eq!(guard.user(), Some(alice()));
    assert!(session.get("Auth.User").is_none());

    let next = harness.guard(&gate, &session, RequestInfo::new("view", "/view"));
    assert!(next.user().is_none());
}

#[tokio::test]
async fn test_custom_session_key() {
    let harness = TestHarness::new();
    let gate = harness.gate(AuthConfig {
        session_key: Some("Api.User".into()),
        ..config(&["Form"])
    });
    let session = harness.session();
    let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));
    guard.login(Some(alice())).await;

    assert_eq!(session.get("Api.User"), Some(alice().to_value()));
    assert!(session.get("Auth.User").is_none());
}

#[tokio::test]
async fn test_user_does_not_trigger_identification() {
    let harness = TestHarness::new().with_authenticator("Alice", Some(alice()));
    let gate = harness.gate(config(&["Alice"]));
    let session = harness.session();
    let guard = harness.guard(&gate, &session, RequestInfo::new("view", "/view"));

    assert!(guard.user().is_none());
    assert!(harness.calls().is_empty());
}

proptest! {
    #[test]
    fn test_identify_returns_first_success(outcomes in prop::collection::vec(any::<bool>(), 1..6)) {
        let mut harness = TestHarness::new();
        let mut ids = Vec::new();
        for (i, succeeds) in outcomes.iter().enumerate() {
            let id = format!("A{i}");
            let user = succeeds.then(|| UserRecord::new().with("id", i as u64));
            harness = harness.with_authenticator(&id, user);
            ids.push(id);
        }
        let gate = harness.gate(AuthConfig {
            authenticate: Some(vestibule::AdapterConfig::from_ids(ids.iter().cloned())),
            ..Default::default()
        });
        let session = harness.session();
        let mut guard = harness.guard(&gate, &session, RequestInfo::new("login", "/users/login"));

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let user = runtime.block_on(guard.identify());

        let first = outcomes.iter().position(|ok| *ok);
        prop_assert_eq!(user.and_then(|u| u.get("id").cloned()), first.map(|i| json!(i as u64)));

        let expected: Vec<String> = ids
            .iter()
            .take(first.map_or(ids.len(), |i| i + 1))
            .map(|id| format!("{id}:authenticate"))
            .collect();
        prop_assert_eq!(harness.calls(), expected);
    }
}
