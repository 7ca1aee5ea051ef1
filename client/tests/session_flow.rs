//! End-to-end flows against a mock identity service and backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use shared::SubscriptionSnapshot;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stratmarket::app::App;
use stratmarket::config::ClientConfig;
use stratmarket::core::error::{ApiError, AuthError};
use stratmarket::services::api::RequestDescriptor;
use stratmarket::services::identity::HttpIdentityProvider;
use stratmarket::services::storage::MemoryStore;
use stratmarket::SessionState;

const ANON_KEY: &str = "anon-key";

fn grant_json(token: &str, id: &str, email: &str) -> Value {
    json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": format!("{}-refresh", token),
        "user": { "id": id, "email": email, "created_at": "2024-01-01T00:00:00Z" },
    })
}

async fn mount_account(server: &MockServer, email: &str, password: &str, token: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({ "email": email, "password": password })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(grant_json(token, &format!("id-{}", email), email))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

fn app_for(identity: &MockServer, api_url: &str) -> App {
    let config = ClientConfig::default()
        .with_api_url(api_url)
        .with_auth(identity.uri(), ANON_KEY);
    let provider = Arc::new(HttpIdentityProvider::new(Some(&identity.uri()), Some(ANON_KEY)));
    App::new(config, provider, Arc::new(MemoryStore::new()))
}

fn signed_in_email(state: &SessionState) -> Option<String> {
    state.session().map(|session| session.email.clone())
}

#[tokio::test]
async fn test_login_then_subscription_uses_bearer_token() {
    let server = MockServer::start().await;
    mount_account(&server, "a@b.com", "secret-a", "tok-a", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/subscription/status"))
        .and(header("authorization", "Bearer tok-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plan": "pro",
            "isActive": true,
            "canRunBacktest": true,
            "backtestsRemaining": 50,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&server, &server.uri());
    app.session.restore().await;
    let session = app.session.login("a@b.com", "secret-a").await.expect("login succeeds");
    assert_eq!(session.email, "a@b.com");

    let snapshot = app.subscription.refresh().await;

    assert_eq!(snapshot.plan, "pro");
    assert_eq!(snapshot.backtests_remaining, 50);
    assert_eq!(app.subscription().plan, "pro");
}

#[tokio::test]
async fn test_later_login_wins_over_slower_earlier_login() {
    let server = MockServer::start().await;
    mount_account(&server, "x@y.com", "secret-x", "tok-x", Duration::from_millis(300)).await;
    mount_account(&server, "a@b.com", "secret-a", "tok-a", Duration::ZERO).await;

    let app = app_for(&server, &server.uri());
    app.session.restore().await;

    let (first, second) = tokio::join!(app.session.login("x@y.com", "secret-x"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.session.login("a@b.com", "secret-a").await
    });

    assert!(matches!(first, Err(AuthError::Superseded)));
    assert_eq!(second.expect("second login succeeds").email, "a@b.com");
    assert_eq!(signed_in_email(&app.session.state()).as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn test_unreachable_backend_serves_free_tier() {
    let server = MockServer::start().await;
    mount_account(&server, "a@b.com", "secret-a", "tok-a", Duration::ZERO).await;

    // Nothing listens on port 1
    let app = app_for(&server, "http://127.0.0.1:1");
    app.session.restore().await;
    app.session.login("a@b.com", "secret-a").await.expect("login succeeds");

    let snapshot = app.subscription.refresh().await;

    assert_eq!(*snapshot, SubscriptionSnapshot::free_tier());
    assert!(snapshot.can_run_backtest);
    assert_eq!(snapshot.backtests_remaining, 3);
}

#[tokio::test]
async fn test_authenticated_call_without_session_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscription/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let app = app_for(&server, &server.uri());
    app.session.restore().await;

    let result = app
        .call(RequestDescriptor::get("/subscription/status").authenticated())
        .await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_rejected_credential_ends_session() {
    let server = MockServer::start().await;
    mount_account(&server, "a@b.com", "secret-a", "tok-a", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/strategies"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "jwt expired" })))
        .mount(&server)
        .await;

    let app = app_for(&server, &server.uri());
    app.session.restore().await;
    app.session.login("a@b.com", "secret-a").await.expect("login succeeds");

    let result = app.call(RequestDescriptor::get("/strategies").authenticated()).await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    assert_eq!(app.session.state(), SessionState::Unauthenticated);
    assert!(app.subscription().is_free());
}

#[tokio::test]
async fn test_failed_login_reports_error_and_stays_signed_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let app = app_for(&server, &server.uri());
    app.session.restore().await;

    let result = app.session.login("a@b.com", "wrong").await;

    assert!(result.is_err());
    assert_eq!(app.session.state(), SessionState::Unauthenticated);
}
