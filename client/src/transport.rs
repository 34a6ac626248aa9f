//! HTTP transport: bearer-token state machine and a thin JSON request
//! helper. The wire protocol it must satisfy is fixed externally, but
//! the plumbing here is real.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{ClientError, Result};
use crate::wire::TokenResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The bearer-token state: absent, or valid until `expires_at` (falls
/// back to `None` on a 401/403 from the token endpoint).
#[derive(Debug, Clone)]
enum TokenState {
    None,
    Valid { access_token: String, expires_at: i64 },
}

/// Raw (status, body) pair. Each caller interprets status codes according
/// to its own endpoint's rules: a 404 means "absent" for an AK fetch but
/// "not found" elsewhere; a 403 means "success" for delete but
/// "forbidden" elsewhere.
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: bytes::Bytes,
}

impl RawResponse {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.bytes)
            .map_err(|e| ClientError::TransportError(format!("decode response: {}", e)))
    }

    /// Case-insensitive header lookup, e.g. the `X-Backup-Client` header
    /// on a registration response.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    }
}

pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    api_key_id: String,
    api_secret: String,
    token: Mutex<TokenState>,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, api_key_id: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client with static config never fails to build");
        Self {
            http,
            base_url: base_url.into(),
            api_key_id: api_key_id.into(),
            api_secret: api_secret.into(),
            token: Mutex::new(TokenState::None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Acquire (or refresh, or reuse) the bearer token. Any authenticated
    /// request passes through here first.
    async fn ensure_token(&self) -> Result<String> {
        {
            let guard = self.token.lock().await;
            if let TokenState::Valid { access_token, expires_at } = &*guard {
                if *expires_at > now_unix() {
                    return Ok(access_token.clone());
                }
            }
        }

        tracing::debug!(target: "auth", "refreshing bearer token");
        let resp = self
            .http
            .post(self.url("/v1/auth/token"))
            .basic_auth(&self.api_key_id, Some(&self.api_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ClientError::TransportError(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let mut guard = self.token.lock().await;
            *guard = TokenState::None;
            return Err(ClientError::AuthFailure);
        }
        if !status.is_success() {
            return Err(ClientError::TransportError(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::TransportError(format!("decode token response: {}", e)))?;

        let mut guard = self.token.lock().await;
        *guard = TokenState::Valid {
            access_token: body.access_token.clone(),
            expires_at: body.expires_at,
        };
        tracing::debug!(target: "auth", expires_at = body.expires_at, "bearer token refreshed");
        Ok(body.access_token)
    }

    /// Drop the cached token — invalidated on client close.
    pub async fn clear_token(&self) {
        let mut guard = self.token.lock().await;
        *guard = TokenState::None;
    }

    async fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<RawResponse> {
        let token = self.ensure_token().await?;
        let mut req = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::TransportError(e.to_string()))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        tracing::debug!(target: "transport", %method, path, %status, "request completed");
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::TransportError(e.to_string()))?;
        Ok(RawResponse { status, headers, bytes })
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<RawResponse> {
        self.request::<()>(Method::GET, path, query, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<RawResponse> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<RawResponse> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<RawResponse> {
        self.request::<()>(Method::DELETE, path, &[], None).await
    }

    /// An unauthenticated POST: used only for registration, which is
    /// gated by a one-time token in the request body rather than a
    /// bearer token or API-key credentials.
    pub async fn post_unauthenticated<B: Serialize>(&self, path: &str, body: &B) -> Result<RawResponse> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::TransportError(e.to_string()))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::TransportError(e.to_string()))?;
        Ok(RawResponse { status, headers, bytes })
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
