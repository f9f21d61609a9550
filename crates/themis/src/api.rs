//! HTTP client for the `/auth/*` endpoints.
//!
//! These calls never go through [`crate::AuthGateway`]: login and refresh
//! are what produce tokens, and logout must not trigger a refresh.

use crate::profile::WireUser;
use crate::{AuthError, AuthResult, RefreshError};
use credential_store::TokenPair;
use expediente_config::Config;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub(crate) fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Server-provided message from an error body, if it carries one.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "mensaje", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map(str::to_string)
}

/// Message for a failed response: the server's own text, or a body summary.
pub(crate) fn error_message(body: &str) -> String {
    server_message(body).unwrap_or_else(|| summarize_response_body(body))
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// `POST /auth/login` response.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: WireUser,
    pub tokens: TokenPair,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// `GET /auth/me` response.
#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub user: WireUser,
}

/// Unauthenticated client for the auth endpoints, plus the shared HTTP
/// client and base URL every other request is built from.
#[derive(Clone)]
pub struct AuthApi {
    http: Client,
    base_url: Url,
}

impl AuthApi {
    pub fn new(base_url: Url, request_timeout: Duration) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn from_config(config: &Config) -> AuthResult<Self> {
        Self::new(config.api_base_url()?, config.request_timeout())
    }

    /// Use an existing client. A base path such as `/api` is preserved when
    /// endpoints are joined onto it.
    pub fn with_client(http: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn endpoint(&self, path: &str) -> AuthResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Exchange credentials for a token pair and the user profile.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        let url = self.endpoint(LOGIN_PATH)?;
        debug!(url = %url, "Signing in");

        let response = self
            .http
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body_summary = %summarize_response_body(&body), "Login rejected");
        match status.as_u16() {
            400 | 401 | 403 | 422 => Err(AuthError::Authentication(
                server_message(&body).unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
            )),
            code => Err(AuthError::Api {
                status: code,
                message: error_message(&body),
            }),
        }
    }

    /// Trade a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let url = self
            .endpoint(REFRESH_PATH)
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let response = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let pair: TokenPair = response
                .json()
                .await
                .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
            if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
                return Err(RefreshError::InvalidResponse(
                    "empty token in refresh response".to_string(),
                ));
            }
            return Ok(pair);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body_summary = %summarize_response_body(&body), "Token refresh failed");
        if status.is_server_error() {
            Err(RefreshError::Server {
                status: status.as_u16(),
            })
        } else {
            Err(RefreshError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }

    /// Tell the server a refresh token is no longer in use.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> AuthResult<()> {
        let url = self.endpoint(LOGOUT_PATH)?;
        let mut request = self.http.post(url).json(&LogoutRequest { refresh_token });
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> AuthApi {
        AuthApi::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = AuthApi::with_client(
            Client::new(),
            Url::parse("https://tribunal.example/api/v2").unwrap(),
        );
        assert_eq!(
            api.endpoint("/auth/login").unwrap().as_str(),
            "https://tribunal.example/api/v2/auth/login"
        );
        assert_eq!(
            api.endpoint("expedientes?page=2").unwrap().as_str(),
            "https://tribunal.example/api/v2/expedientes?page=2"
        );
    }

    #[test]
    fn test_error_message_prefers_server_text() {
        assert_eq!(
            error_message(r#"{"mensaje":"Token vencido"}"#),
            "Token vencido"
        );
        let summary = error_message("<html>secret stack trace</html>");
        assert!(summary.starts_with("len="));
        assert!(!summary.contains("secret"));
    }

    #[tokio::test]
    async fn test_login_decodes_user_and_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": "ana@example.org", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": { "id": 1, "rol": "juez" },
                "tokens": { "accessToken": "AT1", "refreshToken": "RT1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = api_for(&server).login("ana@example.org", "pw").await.unwrap();
        assert_eq!(response.tokens, TokenPair::new("AT1", "RT1"));
        let user = crate::UserProfile::from_wire(response.user, Some("ana@example.org"));
        assert_eq!(user.role, crate::Role::Judge);
    }

    #[tokio::test]
    async fn test_login_rejection_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = api_for(&server).login("ana@example.org", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::Authentication(ref m) if m == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_refresh_classifies_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refreshToken": "RT-revoked" })))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "revoked" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refreshToken": "RT-outage" })))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let api = api_for(&server);
        assert_eq!(
            api.refresh("RT-revoked").await.unwrap_err(),
            RefreshError::Rejected {
                status: 401,
                message: "revoked".to_string()
            }
        );
        assert_eq!(
            api.refresh("RT-outage").await.unwrap_err(),
            RefreshError::Server { status: 503 }
        );
    }

    #[tokio::test]
    async fn test_logout_sends_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .and(body_json(json!({ "refreshToken": "RT1" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        api_for(&server).logout(Some("AT1"), Some("RT1")).await.unwrap();
    }
}
