//! Authenticated request pipeline.

use crate::api::{error_message, summarize_response_body};
use crate::{AuthApi, AuthError, AuthResult, TokenRefreshCoordinator};
use credential_store::CredentialStore;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Replays allowed per call after a 401.
const MAX_REPLAYS: u32 = 1;

/// Description of one API call. The gateway owns the Authorization header;
/// callers describe everything else.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    async fn read(response: reqwest::Response) -> AuthResult<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-2xx response into [`AuthError::Api`].
    pub fn error_for_status(self) -> AuthResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let body = self.text();
        warn!(status = %self.status, body_summary = %summarize_response_body(&body), "API request failed");
        Err(AuthError::Api {
            status: self.status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Per-call replay bookkeeping, threaded through one `request` invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallContext {
    replays: u32,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replays(&self) -> u32 {
        self.replays
    }

    pub fn can_replay(&self) -> bool {
        self.replays < MAX_REPLAYS
    }

    fn record_replay(&mut self) {
        self.replays += 1;
    }
}

/// Attaches the stored access token to outgoing calls and recovers from a
/// single 401 by refreshing and replaying once.
#[derive(Clone)]
pub struct AuthGateway {
    api: AuthApi,
    store: Arc<CredentialStore>,
    refresher: TokenRefreshCoordinator,
}

impl AuthGateway {
    pub fn new(api: AuthApi, store: Arc<CredentialStore>, refresher: TokenRefreshCoordinator) -> Self {
        Self {
            api,
            store,
            refresher,
        }
    }

    pub fn refresher(&self) -> &TokenRefreshCoordinator {
        &self.refresher
    }

    /// Send `request` with the current access token.
    ///
    /// Any status other than 401 is returned as-is; callers decide what a
    /// 404 or 500 means. A 401 triggers one refresh and one replay of the
    /// same method, path, query and body. A second 401 is an
    /// [`AuthError::Authentication`].
    pub async fn request(&self, request: &ApiRequest) -> AuthResult<ApiResponse> {
        if request.headers.contains_key(AUTHORIZATION) {
            return Err(AuthError::Validation(
                "Authorization header is managed by the session".to_string(),
            ));
        }

        let mut ctx = CallContext::new();
        let mut token = self.store.access_token();

        loop {
            let response = self.send(request, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if !ctx.can_replay() {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    replays = ctx.replays(),
                    "Request still unauthorized after token refresh"
                );
                return Err(AuthError::Authentication(
                    "Request was rejected after refreshing the session".to_string(),
                ));
            }

            ctx.record_replay();
            token = Some(self.token_after_rejection(token.as_deref()).await?);
            debug!(method = %request.method, path = %request.path, "Replaying request with refreshed token");
        }
    }

    /// GET `path`, require 2xx and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AuthResult<T> {
        self.request(&ApiRequest::get(path))
            .await?
            .error_for_status()?
            .json()
    }

    /// Access token to replay with after `rejected` drew a 401.
    ///
    /// If the store already holds a different token, another call has
    /// rotated it since this one was sent, so it is reused without a refresh.
    async fn token_after_rejection(&self, rejected: Option<&str>) -> AuthResult<String> {
        if let Some(current) = self.store.access_token() {
            if Some(current.as_str()) != rejected {
                debug!("Token already rotated, replaying without refresh");
                return Ok(current);
            }
        }
        Ok(self.refresher.refresh().await?.access_token)
    }

    async fn send(&self, request: &ApiRequest, access_token: Option<&str>) -> AuthResult<ApiResponse> {
        let url = self.api.endpoint(&request.path)?;
        let mut builder = self
            .api
            .http()
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(method = %request.method, path = %request.path, status = %response.status(), "API response");
        ApiResponse::read(response).await
    }
}
