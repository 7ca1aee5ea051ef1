use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Password grant (`POST /auth/v1/token?grant_type=password`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordGrantRequest {
    pub email: String,
    pub password: String,
}

/// Refresh grant (`POST /auth/v1/token?grant_type=refresh_token`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshGrantRequest {
    pub refresh_token: String,
}

/// Authorization-code exchange (`POST /auth/v1/token?grant_type=pkce`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeExchangeRequest {
    pub auth_code: String,
}

/// Optional profile fields collected by the registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Signup request (`POST /auth/v1/signup`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    /// Stored by the identity service as `user_metadata`
    #[serde(default)]
    pub data: ProfileFields,
}

/// Kind of one-time token delivered by an email link
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    Signup,
    Recovery,
    Email,
}

/// Email-link verification (`POST /auth/v1/verify`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyRequest {
    #[serde(rename = "type")]
    pub kind: VerificationKind,
    pub token_hash: String,
}

/// Password recovery email (`POST /auth/v1/recover`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoverRequest {
    pub email: String,
}

/// Password change for the signed-in user (`PUT /auth/v1/user`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

/// Token payload returned by every successful grant
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityUser>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// Tokens never reach log output
impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}

/// Profile metadata stored alongside the identity record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// External account (OAuth provider) linked to an identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedIdentity {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// User record as returned by the identity service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub identities: Vec<LinkedIdentity>,
}

impl IdentityUser {
    /// Earliest link time of an identity that did not come from the email provider.
    pub fn external_linked_at(&self) -> Option<DateTime<Utc>> {
        self.identities
            .iter()
            .filter(|identity| identity.provider != "email")
            .filter_map(|identity| identity.created_at)
            .min()
    }
}

/// Signup response: a live session when the service auto-confirms, otherwise
/// the bare user record awaiting email confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SignupResponse {
    Session(TokenResponse),
    User(IdentityUser),
}

/// Error body returned by the identity service.
///
/// Different endpoints populate different fields, so all are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl IdentityErrorBody {
    /// Most descriptive human-readable message present in the body.
    pub fn message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .or(self.error.as_deref())
    }

    /// Machine-readable code (`error_code`, falling back to `error`).
    pub fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_response_with_session() {
        let json = r#"{
            "access_token": "token-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": { "id": "u1", "email": "a@b.com", "created_at": "2024-01-01T00:00:00Z" }
        }"#;

        let response: SignupResponse = serde_json::from_str(json).expect("valid signup json");
        match response {
            SignupResponse::Session(token) => {
                assert_eq!(token.access_token, "token-1");
                assert_eq!(token.user.map(|u| u.id), Some("u1".to_string()));
            }
            SignupResponse::User(_) => panic!("Expected session variant"),
        }
    }

    #[test]
    fn test_signup_response_pending_confirmation() {
        let json = r#"{ "id": "u2", "email": "new@b.com", "created_at": "2024-01-01T00:00:00Z" }"#;

        let response: SignupResponse = serde_json::from_str(json).expect("valid signup json");
        assert!(matches!(response, SignupResponse::User(ref user) if user.id == "u2"));
    }

    #[test]
    fn test_external_linked_at_ignores_email_identity() {
        let user: IdentityUser = serde_json::from_str(
            r#"{
                "id": "u3",
                "created_at": "2024-01-01T00:00:00Z",
                "identities": [
                    { "provider": "email", "created_at": "2024-01-01T00:00:00Z" },
                    { "provider": "google", "created_at": "2024-03-01T00:00:00Z" },
                    { "provider": "github", "created_at": "2024-02-01T00:00:00Z" }
                ]
            }"#,
        )
        .expect("valid user json");

        let linked = user.external_linked_at().expect("linked identity present");
        assert_eq!(linked.to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }

    #[test]
    fn test_identity_error_message_precedence() {
        let body: IdentityErrorBody = serde_json::from_str(
            r#"{ "error": "invalid_grant", "error_description": "Invalid login credentials" }"#,
        )
        .expect("valid error json");

        assert_eq!(body.message(), Some("Invalid login credentials"));
        assert_eq!(body.code(), Some("invalid_grant"));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = TokenResponse {
            access_token: "secret-access".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(60),
            expires_at: None,
            refresh_token: Some("secret-refresh".to_string()),
            user: None,
        };

        let printed = format!("{:?}", token);
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }
}
