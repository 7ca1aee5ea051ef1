//! # API Client
//!
//! The single choke point between the client core and the marketplace backend.
//!
//! Every call goes through [`ApiClient::call`], which attaches the bearer
//! credential (when one is held), normalizes failures into [`ApiError`] and
//! reports rejected credentials back to the session store. It neither
//! deduplicates nor caches; that is the derived-state providers' job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::error::ApiError;
use crate::core::service::CredentialSource;

/// Longest raw response text echoed into an error message.
const MAX_ERROR_TEXT: usize = 300;

/// One outbound backend request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Path below the base URL, e.g. `/subscription/status`
    pub path: String,
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Fail with `Unauthorized` instead of sending when no credential is held
    pub requires_auth: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            headers: Vec::new(),
            requires_auth: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

/// HTTP client for the marketplace backend.
///
/// Cheap to share behind an `Arc`; `reqwest::Client` pools connections internally.
pub struct ApiClient {
    pub(crate) client: Client,
    base_url: Option<String>,
    credentials: Option<Arc<dyn CredentialSource>>,
}

impl ApiClient {
    /// Create a client for `base_url`. An unset base URL makes every call fail
    /// with [`ApiError::Configuration`].
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            credentials: None,
        }
    }

    /// Attach the source of bearer credentials (normally the session store).
    pub fn with_credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Issue a request and return the decoded JSON body.
    ///
    /// A 2xx response with an empty or non-JSON body resolves to `{}`.
    /// Only the method and path are logged, never the credential.
    #[tracing::instrument(
        skip(self, descriptor),
        fields(
            method = %descriptor.method,
            path = %descriptor.path,
            request_id = %uuid::Uuid::new_v4(),
        )
    )]
    pub async fn call(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ApiError::Configuration("Backend API URL is not configured".to_string()))?;

        let token = match &self.credentials {
            Some(source) => source.bearer_token().await,
            None => None,
        };

        if descriptor.requires_auth && token.is_none() {
            tracing::debug!("Rejected before sending: no credential held");
            return Err(ApiError::Unauthorized("Sign in to continue".to_string()));
        }

        let headers = header_map(&descriptor.headers)?;
        let url = join_url(base, &descriptor.path);
        let mut builder = self.client.request(descriptor.method.clone(), url).headers(headers);
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &descriptor.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "API network error");
            ApiError::Network(transport_error_message(&e, "backend"))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::warn!(error = %e, "API response body error");
            ApiError::Network(transport_error_message(&e, "backend"))
        })?;

        tracing::debug!(
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis(),
            "API call completed"
        );

        if status == reqwest::StatusCode::UNAUTHORIZED {
            if let (Some(source), Some(token)) = (&self.credentials, &token) {
                source.on_unauthorized(token);
            }
            let message = structured_message(&text).unwrap_or_else(|| "Session expired, please sign in again".to_string());
            tracing::warn!("API call rejected credential");
            return Err(ApiError::Unauthorized(message));
        }

        if !status.is_success() {
            let message = error_message(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), error = %message, "API call failed");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(success_body(&text))
    }

    /// [`call`](Self::call) and decode the body into `T`.
    pub async fn call_json<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T, ApiError> {
        let value = self.call(descriptor).await?;
        serde_json::from_value(value).map_err(|e| {
            tracing::error!(error = %e, "API response parse error");
            ApiError::Decode(e.to_string())
        })
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, ApiError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("Invalid header name: {:?}", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::InvalidRequest(format!("Invalid value for header {}", name)))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base, path.trim_start_matches('/'))
}

fn success_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Message from a structured error body: `error`, `message` or `detail`,
/// where `error` may itself be an object carrying `message`.
fn structured_message(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;

    let candidate = |key: &str| match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(inner) => inner.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    candidate("error")
        .or_else(|| candidate("message"))
        .or_else(|| candidate("detail"))
}

/// Message for a non-2xx response: structured body, else raw text, else a generic line.
pub(crate) fn error_message(status: u16, text: &str) -> String {
    if let Some(message) = structured_message(text) {
        return message;
    }

    let raw = text.trim();
    if raw.is_empty() {
        return format!("API Error: {}", status);
    }

    match raw.char_indices().nth(MAX_ERROR_TEXT) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}

/// User-facing description of a transport failure. Never includes the error chain.
pub(crate) fn transport_error_message(error: &reqwest::Error, service: &str) -> String {
    if error.is_timeout() {
        format!("The {} did not respond in time. Check your connection and try again.", service)
    } else if error.is_connect() {
        format!(
            "Unable to reach the {}. Check your internet connection; if this persists the server may be down or rejecting cross-origin (CORS) requests.",
            service
        )
    } else {
        format!(
            "Request to the {} failed. Check your connection or the server's CORS configuration.",
            service
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedToken {
        token: Mutex<Option<String>>,
        rejected: AtomicUsize,
    }

    impl FixedToken {
        fn new(token: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                token: Mutex::new(token.map(str::to_string)),
                rejected: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialSource for FixedToken {
        async fn bearer_token(&self) -> Option<String> {
            self.token.lock().clone()
        }

        fn on_unauthorized(&self, _token: &str) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client(server: &MockServer, source: Arc<FixedToken>) -> ApiClient {
        ApiClient::new(Some(&server.uri()), Duration::from_secs(5)).with_credentials(source)
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/strategies"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server, FixedToken::new(Some("tok-1")))
            .call(RequestDescriptor::get("/strategies"))
            .await
            .expect("call succeeds");

        assert_eq!(value, json!({ "items": [] }));
    }

    #[tokio::test]
    async fn test_public_call_without_credential_proceeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server, FixedToken::new(None))
            .call(RequestDescriptor::get("health"))
            .await
            .expect("public call succeeds");

        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_call_without_credential_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client(&server, FixedToken::new(None))
            .call(RequestDescriptor::get("/protected").authenticated())
            .await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_401_is_unauthorized_and_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portfolio"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Token expired" })))
            .mount(&server)
            .await;

        let source = FixedToken::new(Some("stale"));
        let result = client(&server, source.clone())
            .call(RequestDescriptor::get("/portfolio").authenticated())
            .await;

        assert_eq!(result, Err(ApiError::Unauthorized("Token expired".to_string())));
        assert_eq!(source.rejected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_message_from_structured_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/strategies"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "message": "Name is required" })))
            .mount(&server)
            .await;

        let result = client(&server, FixedToken::new(Some("tok")))
            .call(RequestDescriptor::post("/strategies", json!({})))
            .await;

        assert_eq!(
            result,
            Err(ApiError::Api {
                status: 422,
                message: "Name is required".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_error_message_from_raw_text_then_generic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/text"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = client(&server, FixedToken::new(None));

        let text = api.call(RequestDescriptor::get("/text")).await;
        assert_eq!(
            text,
            Err(ApiError::Api {
                status: 502,
                message: "Bad Gateway".to_string()
            })
        );

        let empty = api.call(RequestDescriptor::get("/empty")).await;
        assert_eq!(
            empty,
            Err(ApiError::Api {
                status: 500,
                message: "API Error: 500".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_2xx_non_json_is_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/strategies/7/favorite"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let api = client(&server, FixedToken::new(Some("tok")));

        let no_content = api
            .call(RequestDescriptor::post("/strategies/7/favorite", json!({})))
            .await
            .expect("204 resolves");
        assert_eq!(no_content, json!({}));

        let plain = api.call(RequestDescriptor::get("/plain")).await.expect("text resolves");
        assert_eq!(plain, json!({}));
    }

    #[tokio::test]
    async fn test_custom_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .and(header("x-trading-mode", "stocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, FixedToken::new(None))
            .call(RequestDescriptor::get("/markets").with_header("X-Trading-Mode", "stocks"))
            .await
            .expect("call succeeds");
    }

    #[tokio::test]
    async fn test_malformed_header_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;
        let api = client(&server, FixedToken::new(None));

        let bad_name = api
            .call(RequestDescriptor::get("/markets").with_header("X Trading Mode", "stocks"))
            .await;
        let bad_value = api
            .call(RequestDescriptor::get("/markets").with_header("X-Trading-Mode", "stocks\r\nx: y"))
            .await;

        assert!(matches!(bad_name, Err(ApiError::InvalidRequest(_))));
        assert!(matches!(bad_value, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_network_failure_is_network_error() {
        let api = ApiClient::new(Some("http://127.0.0.1:9"), Duration::from_secs(2));

        let result = api.call(RequestDescriptor::get("/health")).await;
        match result {
            Err(ApiError::Network(message)) => assert!(message.contains("CORS")),
            other => panic!("Expected network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_base_url_is_configuration_error() {
        let api = ApiClient::new(None, Duration::from_secs(2));

        let result = api.call(RequestDescriptor::get("/health")).await;
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_call_json_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": "many" })))
            .mount(&server)
            .await;

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Count {
            count: u32,
        }

        let result = client(&server, FixedToken::new(None))
            .call_json::<Count>(RequestDescriptor::get("/count"))
            .await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_error_message_truncates_long_text() {
        let long = "x".repeat(1_000);
        let message = error_message(500, &long);
        assert_eq!(message.len(), MAX_ERROR_TEXT + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_nested_error_object() {
        assert_eq!(
            error_message(400, r#"{ "error": { "code": 12, "message": "Symbol not tradable" } }"#),
            "Symbol not tradable"
        );
    }
}
