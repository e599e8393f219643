//! services/web/src/adapters/backend.rs
//!
//! This module contains the REST adapter for the marketplace backend. It implements
//! the auth, search and device-token ports from the `core` crate using `reqwest`.

use async_trait::async_trait;
use marketplace_core::domain::{
    BundleSummary, ProviderSummary, SearchResults, Session, User,
};
use marketplace_core::ports::{
    AuthService, DeviceTokenRegistry, LoginOutcome, PortError, PortResult, SearchService,
    GENERIC_FAILURE_MESSAGE,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct VerifyOtpRequest<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct DeviceTokenRequest<'a> {
    token: &'a str,
    platform: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default, alias = "requiresVerification")]
    requires_otp: bool,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    user: User,
}

#[derive(Deserialize)]
struct UserResponse {
    user: User,
}

#[derive(Deserialize, Default)]
struct ProvidersResponse {
    #[serde(default)]
    providers: Vec<ProviderSummary>,
}

#[derive(Deserialize, Default)]
struct BundlesResponse {
    #[serde(default)]
    bundles: Vec<BundleSummary>,
}

/// Error payload returned by the backend. Either field may carry the reason.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks JSON to the marketplace REST backend.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a new `BackendClient` rooted at `base_url` (no trailing slash).
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Where the browser is sent to start the Google OAuth flow.
    pub fn google_auth_url(&self) -> String {
        self.url("/auth/google")
    }

    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        request
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = self.send(request).await?;
        read_json(response).await
    }

    async fn send_empty(&self, request: RequestBuilder) -> PortResult<()> {
        let response = self.send(request).await?;
        check_status(response).await.map(|_| ())
    }
}

/// Maps a non-2xx response to a `PortError` carrying the backend's reason.
async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!("Backend responded {} with body: {}", status, body);
    let reason = reason_from_body(&body);
    Err(match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized(reason),
        StatusCode::NOT_FOUND => {
            PortError::NotFound(reason.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()))
        }
        _ => PortError::Rejected(reason.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Unexpected(format!("Malformed backend response: {}", e)))
}

fn reason_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
}

/// The human-readable reason in an error body, or the generic fallback.
pub fn error_message_from_body(body: &str) -> String {
    reason_from_body(body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

/// Builds a session from the query string of the OAuth callback URL
/// (`?token=...&user=<json>`), as handed back by the backend's Google flow.
pub fn session_from_oauth_callback(callback_url: &str) -> PortResult<Session> {
    let url = Url::parse(callback_url)
        .map_err(|e| PortError::Unexpected(format!("Invalid callback URL: {}", e)))?;

    let mut token = None;
    let mut user_json = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "token" => token = Some(value.into_owned()),
            "user" => user_json = Some(value.into_owned()),
            "error" => return Err(PortError::Rejected(value.into_owned())),
            _ => {}
        }
    }

    let token = token
        .filter(|t| !t.trim().is_empty())
        .ok_or(PortError::Unauthorized(None))?;
    let user_json = user_json.ok_or_else(|| {
        PortError::Unexpected("OAuth callback did not include the user".to_string())
    })?;
    let user: User = serde_json::from_str(&user_json)
        .map_err(|e| PortError::Unexpected(format!("Invalid user in OAuth callback: {}", e)))?;
    Ok(Session::new(token, user))
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthService for BackendClient {
    async fn login(&self, email: &str, password: &str) -> PortResult<LoginOutcome> {
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });
        let response: LoginResponse = self.send_json(request).await?;

        if response.requires_otp {
            return Ok(LoginOutcome::OtpRequired {
                email: response.email.unwrap_or_else(|| email.to_string()),
            });
        }
        match (response.token, response.user) {
            (Some(token), Some(user)) => Ok(LoginOutcome::SignedIn(Session::new(token, user))),
            _ => Err(PortError::Unexpected(
                "Login response carried neither a session nor an OTP challenge".to_string(),
            )),
        }
    }

    async fn verify_otp(&self, email: &str, code: &str) -> PortResult<Session> {
        let request = self
            .client
            .post(self.url("/auth/verify-otp"))
            .json(&VerifyOtpRequest { email, otp: code });
        let response: AuthResponse = self.send_json(request).await?;
        Ok(Session::new(response.token, response.user))
    }

    async fn resend_otp(&self, email: &str) -> PortResult<()> {
        let request = self
            .client
            .post(self.url("/auth/resend-otp"))
            .json(&EmailRequest { email });
        self.send_empty(request).await
    }

    async fn logout(&self, token: &str) -> PortResult<()> {
        let request = self.client.post(self.url("/auth/logout")).bearer_auth(token);
        self.send_empty(request).await
    }

    async fn delete_account(&self, token: &str) -> PortResult<()> {
        let request = self.client.delete(self.url("/users/me")).bearer_auth(token);
        self.send_empty(request).await
    }

    async fn current_user(&self, token: &str) -> PortResult<User> {
        let request = self.client.get(self.url("/users/me")).bearer_auth(token);
        let response: UserResponse = self.send_json(request).await?;
        Ok(response.user)
    }
}

#[async_trait]
impl SearchService for BackendClient {
    async fn search(&self, zip_code: &str, service: &str) -> PortResult<SearchResults> {
        let query = [("zipCode", zip_code), ("service", service)];
        let providers = self.send_json::<ProvidersResponse>(
            self.client.get(self.url("/providers/search")).query(&query),
        );
        let bundles = self.send_json::<BundlesResponse>(
            self.client.get(self.url("/bundles/search")).query(&query),
        );

        // The two lookups are independent; issue them together.
        let (providers, bundles) = futures::try_join!(providers, bundles)?;
        Ok(SearchResults {
            providers: providers.providers,
            bundles: bundles.bundles,
        })
    }
}

#[async_trait]
impl DeviceTokenRegistry for BackendClient {
    async fn register_device_token(&self, auth_token: &str, device_token: &str) -> PortResult<()> {
        let request = self
            .client
            .post(self.url("/notifications/device-token"))
            .bearer_auth(auth_token)
            .json(&DeviceTokenRequest {
                token: device_token,
                platform: "web",
            });
        self.send_empty(request).await.inspect_err(|e| {
            warn!("Failed to register device token: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use marketplace_core::domain::UserRole;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn user_json() -> Value {
        json!({ "_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "customer" })
    }

    async fn spawn_backend(router: Router) -> BackendClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        BackendClient::new(Client::new(), format!("http://{}/api/", addr))
    }

    #[test]
    fn error_body_message_is_preferred_over_fallback() {
        assert_eq!(error_message_from_body(r#"{"message":"Invalid OTP"}"#), "Invalid OTP");
        assert_eq!(error_message_from_body(r#"{"error":"Email taken"}"#), "Email taken");
        assert_eq!(error_message_from_body("<html>oops</html>"), GENERIC_FAILURE_MESSAGE);
        assert_eq!(error_message_from_body(r#"{"message":""}"#), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn oauth_callback_yields_a_session() {
        let user = serde_json::to_string(&user_json()).unwrap();
        let mut url = Url::parse("http://localhost:3000/auth/callback").unwrap();
        url.query_pairs_mut().append_pair("token", "abc").append_pair("user", &user);

        let session = session_from_oauth_callback(url.as_str()).unwrap();
        assert_eq!(session.token, "abc");
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user_type, UserRole::Customer);
    }

    #[test]
    fn oauth_callback_error_is_surfaced() {
        let err = session_from_oauth_callback("http://localhost/cb?error=access_denied").unwrap_err();
        assert!(matches!(err, PortError::Rejected(ref m) if m == "access_denied"));
    }

    #[tokio::test]
    async fn login_reports_otp_challenge() {
        let router = Router::new().route(
            "/api/auth/login",
            post(|| async { Json(json!({ "requiresOtp": true, "email": "ada@example.com" })) }),
        );
        let backend = spawn_backend(router).await;

        let outcome = backend.login("ada@example.com", "secret").await.unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::OtpRequired {
                email: "ada@example.com".into()
            }
        );
    }

    #[tokio::test]
    async fn rejected_verification_carries_backend_message() {
        let router = Router::new().route(
            "/api/auth/verify-otp",
            post(|Json(body): Json<Value>| async move {
                if body["otp"] == "1234" {
                    (AxumStatus::OK, Json(json!({ "token": "tok", "user": user_json() })))
                } else {
                    (AxumStatus::BAD_REQUEST, Json(json!({ "message": "Invalid or expired OTP" })))
                }
            }),
        );
        let backend = spawn_backend(router).await;

        let session = backend.verify_otp("ada@example.com", "1234").await.unwrap();
        assert_eq!(session.token, "tok");

        let err = backend.verify_otp("ada@example.com", "0000").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid or expired OTP");
    }

    #[tokio::test]
    async fn search_combines_providers_and_bundles() {
        let router = Router::new()
            .route(
                "/api/providers/search",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("zipCode").map(String::as_str), Some("10001"));
                    Json(json!({ "providers": [{ "_id": "p1", "name": "Sparkle Cleaning" }] }))
                }),
            )
            .route(
                "/api/bundles/search",
                get(|| async {
                    Json(json!({ "bundles": [{
                        "_id": "b1", "title": "Block clean", "service": "cleaning", "zipCode": "10001"
                    }] }))
                }),
            );
        let backend = spawn_backend(router).await;

        let results = backend.search("10001", "cleaning").await.unwrap();
        assert_eq!(results.providers.len(), 1);
        assert_eq!(results.bundles[0].id, "b1");
    }

    #[tokio::test]
    async fn device_token_registration_sends_bearer_token() {
        let router = Router::new().route(
            "/api/notifications/device-token",
            post(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer tok") => AxumStatus::NO_CONTENT,
                    _ => AxumStatus::UNAUTHORIZED,
                }
            }),
        );
        let backend = spawn_backend(router).await;

        backend.register_device_token("tok", "device-1").await.unwrap();
        let err = backend.register_device_token("nope", "device-1").await.unwrap_err();
        assert!(matches!(err, PortError::Unauthorized(None)));
    }

    #[tokio::test]
    async fn unauthorized_and_not_found_bodies_reach_the_user() {
        let router = Router::new()
            .route(
                "/api/auth/verify-otp",
                post(|| async {
                    (AxumStatus::UNAUTHORIZED, Json(json!({ "message": "Invalid OTP" })))
                }),
            )
            .route(
                "/api/auth/login",
                post(|| async {
                    (
                        AxumStatus::NOT_FOUND,
                        Json(json!({ "message": "No account for this email" })),
                    )
                }),
            );
        let backend = spawn_backend(router).await;

        let err = backend.verify_otp("ada@example.com", "0000").await.unwrap_err();
        assert!(matches!(err, PortError::Unauthorized(Some(_))));
        assert_eq!(err.user_message(), "Invalid OTP");

        let err = backend.login("nobody@example.com", "secret").await.unwrap_err();
        assert_eq!(err.user_message(), "No account for this email");
    }
}
