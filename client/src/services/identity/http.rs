//! # HTTP Identity Provider
//!
//! [`IdentityProvider`] over a GoTrue-style REST API (`/auth/v1/*`).
//! Every request carries the public `apikey` header; user-scoped calls add
//! `Authorization: Bearer <access token>`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    mask_email, CodeExchangeRequest, IdentityErrorBody, IdentityUser, PasswordGrantRequest, ProfileFields,
    RecoverRequest, RefreshGrantRequest, SignupRequest, SignupResponse, TokenResponse, UpdatePasswordRequest,
    VerificationKind, VerifyRequest,
};

use super::{AuthGrant, Credential, SignUpOutcome};
use crate::core::error::AuthError;
use crate::core::service::IdentityProvider;
use crate::services::api::client::transport_error_message;

const SERVICE_NAME: &str = "identity service";

/// Identity provider talking to the identity service over HTTPS.
pub struct HttpIdentityProvider {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpIdentityProvider {
    /// Create a provider. Either value may be unset; calls then fail with
    /// [`AuthError::Configuration`] instead of panicking.
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        Self::with_timeout(base_url, api_key, std::time::Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: Option<&str>, api_key: Option<&str>, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            api_key: api_key.map(str::to_string),
        }
    }

    fn endpoint(&self, path: &str) -> Result<String, AuthError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("Identity service URL is not configured".to_string()))?;
        Ok(format!("{}/auth/v1/{}", base, path))
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> Result<RequestBuilder, AuthError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("Identity service key is not configured".to_string()))?;

        let mut builder = self.client.request(method, self.endpoint(path)?).header("apikey", api_key);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    /// Send a request; non-2xx responses are classified into an [`AuthError`].
    ///
    /// `credential_rejected` is returned when the service refuses the supplied
    /// credential (password, refresh token or access token).
    async fn send(
        &self,
        builder: RequestBuilder,
        credential_rejected: AuthError,
    ) -> Result<reqwest::Response, AuthError> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Identity service network error");
            AuthError::Network(transport_error_message(&e, SERVICE_NAME))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: IdentityErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let error = classify_failure(status, &body, credential_rejected);

        tracing::warn!(
            status = status.as_u16(),
            code = body.code().unwrap_or("none"),
            error = %error,
            "Identity service rejected request"
        );
        Err(error)
    }

    async fn send_json<B, T>(
        &self,
        builder: RequestBuilder,
        body: &B,
        credential_rejected: AuthError,
    ) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(builder.json(body), credential_rejected).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::error!(error = %e, "Identity response parse error");
            AuthError::Rejected(format!("Unexpected response from {}", SERVICE_NAME))
        })
    }

    async fn token_grant<B>(&self, grant_type: &str, body: &B, rejected: AuthError) -> Result<AuthGrant, AuthError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let builder = self
            .request(Method::POST, "token", None)?
            .query(&[("grant_type", grant_type)]);
        let token: TokenResponse = self.send_json(builder, body, rejected).await?;
        Ok(into_grant(token))
    }
}

fn into_grant(token: TokenResponse) -> AuthGrant {
    AuthGrant {
        credential: Credential::from_token_response(&token, Utc::now()),
        user: token.user,
    }
}

/// Map an identity-service failure onto the auth error taxonomy.
fn classify_failure(status: StatusCode, body: &IdentityErrorBody, credential_rejected: AuthError) -> AuthError {
    let message = body.message().unwrap_or_default();
    let code = body.code().unwrap_or_default();

    if code == "email_not_confirmed" || message.to_ascii_lowercase().contains("email not confirmed") {
        return AuthError::Unverified;
    }

    let rejected_code = matches!(
        code,
        "invalid_grant" | "invalid_credentials" | "bad_jwt" | "session_not_found" | "refresh_token_not_found"
    );
    if rejected_code || status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return credential_rejected;
    }

    if message.is_empty() {
        AuthError::Rejected(format!("Identity service error: {}", status.as_u16()))
    } else {
        AuthError::Rejected(message.to_string())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[tracing::instrument(skip_all, fields(email = %mask_email(email)))]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        let request = PasswordGrantRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.token_grant("password", &request, AuthError::InvalidCredentials).await
    }

    #[tracing::instrument(skip_all, fields(email = %mask_email(email)))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileFields,
    ) -> Result<SignUpOutcome, AuthError> {
        let request = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            data: profile.clone(),
        };

        let builder = self.request(Method::POST, "signup", None)?;
        let response: SignupResponse = self
            .send_json(builder, &request, AuthError::Rejected("Sign-up was refused".to_string()))
            .await?;

        Ok(match response {
            SignupResponse::Session(token) => SignUpOutcome::Session(into_grant(token)),
            SignupResponse::User(user) => SignUpOutcome::ConfirmationRequired {
                email: user.email.unwrap_or_else(|| email.to_string()),
            },
        })
    }

    #[tracing::instrument(skip_all)]
    async fn verify_email(&self, token_hash: &str) -> Result<AuthGrant, AuthError> {
        let request = VerifyRequest {
            kind: VerificationKind::Signup,
            token_hash: token_hash.to_string(),
        };

        let builder = self.request(Method::POST, "verify", None)?;
        let token: TokenResponse = self
            .send_json(
                builder,
                &request,
                AuthError::Rejected("Verification link is invalid or has expired".to_string()),
            )
            .await?;
        Ok(into_grant(token))
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<AuthGrant, AuthError> {
        let request = CodeExchangeRequest {
            auth_code: code.to_string(),
        };
        self.token_grant(
            "pkce",
            &request,
            AuthError::Rejected("Sign-in link is invalid or has expired".to_string()),
        )
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError> {
        let request = RefreshGrantRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.token_grant("refresh_token", &request, AuthError::SessionExpired).await
    }

    #[tracing::instrument(skip_all)]
    async fn fetch_user(&self, access_token: &str) -> Result<IdentityUser, AuthError> {
        let builder = self.request(Method::GET, "user", Some(access_token))?;
        let response = self.send(builder, AuthError::SessionExpired).await?;
        response.json::<IdentityUser>().await.map_err(|e| {
            tracing::error!(error = %e, "User record parse error");
            AuthError::Rejected(format!("Unexpected response from {}", SERVICE_NAME))
        })
    }

    #[tracing::instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let builder = self.request(Method::POST, "logout", Some(access_token))?;
        self.send(builder, AuthError::SessionExpired).await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(email = %mask_email(email)))]
    async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let request = RecoverRequest {
            email: email.to_string(),
        };

        let mut builder = self.request(Method::POST, "recover", None)?;
        if let Some(redirect) = redirect_to {
            builder = builder.query(&[("redirect_to", redirect)]);
        }
        self.send(builder.json(&request), AuthError::Rejected("Password reset was refused".to_string()))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthError> {
        let request = UpdatePasswordRequest {
            password: new_password.to_string(),
        };

        let builder = self.request(Method::PUT, "user", Some(access_token))?;
        self.send(builder.json(&request), AuthError::SessionExpired).await?;
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError> {
        let endpoint = self.endpoint("authorize")?;
        let url = reqwest::Url::parse_with_params(&endpoint, &[("provider", provider), ("redirect_to", redirect_to)])
            .map_err(|e| AuthError::Configuration(format!("Invalid identity service URL: {}", e)))?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_json(id: &str, email: &str) -> serde_json::Value {
        json!({ "id": id, "email": email, "created_at": "2024-01-01T00:00:00Z" })
    }

    fn token_json(token: &str, id: &str, email: &str) -> serde_json::Value {
        json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": format!("{}-refresh", token),
            "user": user_json(id, email),
        })
    }

    fn provider(server: &MockServer) -> HttpIdentityProvider {
        HttpIdentityProvider::new(Some(&server.uri()), Some("anon-key"))
    }

    #[tokio::test]
    async fn test_password_sign_in_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({ "email": "a@b.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("tok-a", "u1", "a@b.com")))
            .expect(1)
            .mount(&server)
            .await;

        let grant = provider(&server)
            .sign_in_with_password("a@b.com", "pw")
            .await
            .expect("sign in succeeds");

        assert_eq!(grant.credential.access_token, "tok-a");
        assert_eq!(grant.credential.refresh_token.as_deref(), Some("tok-a-refresh"));
        assert!(grant.credential.expires_at.is_some());
        assert_eq!(grant.user.map(|u| u.id), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn test_password_sign_in_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let result = provider(&server).sign_in_with_password("a@b.com", "wrong").await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_password_sign_in_unconfirmed_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "email_not_confirmed",
                "msg": "Email not confirmed"
            })))
            .mount(&server)
            .await;

        let result = provider(&server).sign_in_with_password("a@b.com", "pw").await;
        assert_eq!(result, Err(AuthError::Unverified));
    }

    #[tokio::test]
    async fn test_sign_up_requiring_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(body_json(json!({
                "email": "new@b.com",
                "password": "Secret123",
                "data": { "name": "New User" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u9", "new@b.com")))
            .mount(&server)
            .await;

        let profile = ProfileFields {
            name: Some("New User".to_string()),
            ..Default::default()
        };
        let outcome = provider(&server)
            .sign_up("new@b.com", "Secret123", &profile)
            .await
            .expect("sign up succeeds");

        assert_eq!(
            outcome,
            SignUpOutcome::ConfirmationRequired {
                email: "new@b.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_user_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "invalid JWT" })))
            .mount(&server)
            .await;

        let result = provider(&server).fetch_user("stale").await;
        assert_eq!(result, Err(AuthError::SessionExpired));
    }

    #[tokio::test]
    async fn test_server_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/recover"))
            .and(query_param("redirect_to", "https://app.example.com/reset"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "msg": "For security purposes, you can only request this once every 60 seconds"
            })))
            .mount(&server)
            .await;

        let result = provider(&server)
            .request_password_reset("a@b.com", Some("https://app.example.com/reset"))
            .await;

        assert!(matches!(result, Err(AuthError::Rejected(ref msg)) if msg.contains("60 seconds")));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_without_request() {
        let provider = HttpIdentityProvider::new(None, None);

        let result = provider.sign_in_with_password("a@b.com", "pw").await;
        assert!(matches!(result, Err(AuthError::Configuration(_))));
        assert!(matches!(provider.authorize_url("google", "https://x"), Err(AuthError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        // Port 9 (discard) is reliably closed on test hosts
        let provider = HttpIdentityProvider::new(Some("http://127.0.0.1:9"), Some("anon-key"));

        let result = provider.sign_in_with_password("a@b.com", "pw").await;
        assert!(matches!(result, Err(AuthError::Network(_))));
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let provider = HttpIdentityProvider::new(Some("https://id.example.com/"), Some("anon-key"));

        let url = provider
            .authorize_url("google", "https://app.example.com/auth/callback?next=/dashboard")
            .expect("url builds");

        assert!(url.starts_with("https://id.example.com/auth/v1/authorize?provider=google&redirect_to="));
        assert!(url.contains("https%3A%2F%2Fapp.example.com%2Fauth%2Fcallback"));
    }
}
