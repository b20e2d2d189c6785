//! Authenticated HTTP client for the storefront API
//!
//! Attaches the stored access token to every request. A 401 triggers one
//! silent refresh through `/auth/token/refresh/` and a single replay of the
//! original request; a failed refresh clears the stored tokens and flags a
//! forced logout for the application root to act on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
use super::ApiError;
use crate::auth::TokenStore;

pub const REFRESH_PATH: &str = "/auth/token/refresh/";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the server rotates refresh tokens.
    refresh: Option<String>,
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    /// Serializes refreshes so concurrent 401s share one refresh call.
    refresh_guard: Mutex<()>,
    forced_logout: AtomicBool,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            refresh_guard: Mutex::new(()),
            forced_logout: AtomicBool::new(false),
        }
    }

    /// Client talking to `base_url` over HTTP.
    pub fn connect(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(base_url)?), tokens))
    }

    pub fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    /// True once per failed refresh; the caller must drop session state.
    pub fn take_forced_logout(&self) -> bool {
        self.forced_logout.swap(false, Ordering::SeqCst)
    }

    /// Send a request, refreshing the access token once on 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let sent_with = self.tokens.access_token();
        let resp = self
            .transport
            .execute(&request, sent_with.as_deref())
            .await?;

        if resp.status != 401 {
            return check_response(resp, &request.path);
        }

        if self.tokens.refresh_token().is_none() {
            tracing::debug!("401 for {} and no refresh token", request.path);
            return check_response(resp, &request.path);
        }

        let access = match self.refresh_access_token(sent_with.as_deref()).await {
            Ok(access) => access,
            Err(e) => {
                tracing::warn!("Token refresh failed, logging out: {}", e);
                if let Err(clear_err) = self.tokens.clear() {
                    tracing::error!("Failed to clear tokens: {:#}", clear_err);
                }
                self.forced_logout.store(true, Ordering::SeqCst);
                return Err(ApiError::Refresh(Box::new(e)));
            }
        };

        tracing::debug!(
            "Retrying {} {} with refreshed token",
            request.method,
            request.path
        );
        let retried = self.transport.execute(&request, Some(access.as_str())).await?;
        check_response(retried, &request.path)
    }

    /// Send and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        let path = request.path.clone();
        self.send(request).await?.decode(&path)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// `stale` is the access token the failing request carried. If another
    /// caller replaced it while we waited on the guard, that token is reused
    /// and no second refresh call is made.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.refresh_guard.lock().await;

        if let Some(current) = self.tokens.access_token() {
            if Some(current.as_str()) != stale {
                tracing::debug!("Access token already refreshed by another request");
                return Ok(current);
            }
        }

        let refresh = self.tokens.refresh_token().ok_or(ApiError::NoRefreshToken)?;

        tracing::info!("Refreshing access token...");
        let request =
            ApiRequest::post(REFRESH_PATH).json(&serde_json::json!({ "refresh": refresh }))?;
        let resp = self.transport.execute(&request, None).await?;
        let body: RefreshResponse = check_response(resp, REFRESH_PATH)?.decode(REFRESH_PATH)?;

        match body.refresh {
            Some(rotated) => self.tokens.save(&crate::auth::TokenPair {
                access: body.access.clone(),
                refresh: rotated,
            })?,
            None => self.tokens.set_access_token(&body.access)?,
        }

        tracing::info!("Access token refreshed");
        Ok(body.access)
    }
}

/// Map a non-success status to `ApiError::Status`, keeping the JSON body.
fn check_response(resp: ApiResponse, path: &str) -> Result<ApiResponse, ApiError> {
    if resp.is_success() {
        return Ok(resp);
    }
    Err(ApiError::Status {
        status: resp.status,
        path: path.to_string(),
        body: resp.json_value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::auth::MemoryTokenStore;
    use reqwest::Method;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const PROFILE: &str = "/auth/profile/";

    fn client(mock: &Arc<MockTransport>, store: &Arc<MemoryTokenStore>) -> ApiClient {
        ApiClient::new(mock.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_attaches_bearer_when_token_present() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, PROFILE, 200, json!({"id": 1}));
        let store = Arc::new(MemoryTokenStore::with_pair("acc", "ref"));

        assert_ok!(client(&mock, &store).send(ApiRequest::get(PROFILE)).await);
        assert_eq!(mock.requests()[0].bearer.as_deref(), Some("acc"));
    }

    #[tokio::test]
    async fn test_no_bearer_without_token() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, "/api/categories/", 200, json!([]));
        let store = Arc::new(MemoryTokenStore::new());

        assert_ok!(client(&mock, &store).send(ApiRequest::get("/api/categories/")).await);
        assert!(mock.requests()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_refresh_then_single_retry() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, PROFILE, 401, json!({"detail": "expired"}))
            .reply(Method::GET, PROFILE, 200, json!({"id": 1}));
        mock.reply(Method::POST, REFRESH_PATH, 200, json!({"access": "acc2"}));
        let store = Arc::new(MemoryTokenStore::with_pair("acc1", "ref"));
        let api = client(&mock, &store);

        assert_ok!(api.send(ApiRequest::get(PROFILE)).await);

        let calls = mock.calls(Method::GET, PROFILE);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].bearer.as_deref(), Some("acc1"));
        assert_eq!(calls[1].bearer.as_deref(), Some("acc2"));

        let refresh = mock.calls(Method::POST, REFRESH_PATH);
        assert_eq!(refresh.len(), 1);
        assert!(refresh[0].bearer.is_none());
        assert_eq!(refresh[0].body, Some(json!({"refresh": "ref"})));

        assert_eq!(store.access_token().as_deref(), Some("acc2"));
        assert_eq!(store.refresh_token().as_deref(), Some("ref"));
        assert!(!api.take_forced_logout());
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_persisted() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, PROFILE, 401, json!({}))
            .reply(Method::GET, PROFILE, 200, json!({}));
        mock.reply(
            Method::POST,
            REFRESH_PATH,
            200,
            json!({"access": "acc2", "refresh": "ref2"}),
        );
        let store = Arc::new(MemoryTokenStore::with_pair("acc1", "ref1"));

        assert_ok!(client(&mock, &store).send(ApiRequest::get(PROFILE)).await);
        assert_eq!(store.refresh_token().as_deref(), Some("ref2"));
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried_again() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, PROFILE, 401, json!({"detail": "nope"}));
        mock.reply(Method::POST, REFRESH_PATH, 200, json!({"access": "acc2"}));
        let store = Arc::new(MemoryTokenStore::with_pair("acc1", "ref"));

        let err = client(&mock, &store)
            .send(ApiRequest::get(PROFILE))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(mock.calls(Method::GET, PROFILE).len(), 2);
        assert_eq!(mock.calls(Method::POST, REFRESH_PATH).len(), 1);
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, PROFILE, 401, json!({"detail": "Authentication required"}));
        let store = Arc::new(MemoryTokenStore::new());
        store.set_access_token("acc").unwrap();
        let api = client(&mock, &store);

        let err = api.send(ApiRequest::get(PROFILE)).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(
            err.body().and_then(|b| b["detail"].as_str()),
            Some("Authentication required")
        );
        assert_eq!(mock.requests().len(), 1);
        assert!(!api.take_forced_logout());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_tokens_and_forces_logout() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, PROFILE, 401, json!({}));
        mock.reply(
            Method::POST,
            REFRESH_PATH,
            401,
            json!({"detail": "Token is invalid or expired"}),
        );
        let store = Arc::new(MemoryTokenStore::with_pair("acc", "ref"));
        let api = client(&mock, &store);

        let err = api.send(ApiRequest::get(PROFILE)).await.unwrap_err();
        assert!(matches!(err, ApiError::Refresh(_)));
        assert!(store.load().is_none());
        assert!(store.refresh_token().is_none());
        assert!(api.take_forced_logout());
        assert!(!api.take_forced_logout());
        assert_eq!(mock.calls(Method::GET, PROFILE).len(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_pass_through() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, "/api/products/9/", 404, json!({"detail": "Not found."}));
        mock.fail(Method::GET, "/api/cart/current/", "connection refused");
        let store = Arc::new(MemoryTokenStore::with_pair("acc", "ref"));
        let api = client(&mock, &store);

        let err = assert_err!(api.send(ApiRequest::get("/api/products/9/")).await);
        assert_eq!(err.status(), Some(404));
        let err = assert_err!(api.send(ApiRequest::get("/api/cart/current/")).await);
        assert!(matches!(err, ApiError::Transport { .. }));
        assert!(mock.calls(Method::POST, REFRESH_PATH).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let mock = Arc::new(MockTransport::new());
        // First two calls carry the stale token, the replays succeed.
        mock.reply(Method::GET, PROFILE, 401, json!({}))
            .reply(Method::GET, PROFILE, 401, json!({}))
            .reply(Method::GET, PROFILE, 200, json!({}));
        mock.reply(Method::POST, REFRESH_PATH, 200, json!({"access": "acc2"}));
        let store = Arc::new(MemoryTokenStore::with_pair("acc1", "ref"));
        let api = client(&mock, &store);

        let (a, b) = tokio::join!(
            api.send(ApiRequest::get(PROFILE)),
            api.send(ApiRequest::get(PROFILE))
        );
        assert_ok!(a);
        assert_ok!(b);
        assert_eq!(mock.calls(Method::POST, REFRESH_PATH).len(), 1);
    }
}
