//! Wire-level request execution
//!
//! The client never talks to reqwest directly; it hands an `ApiRequest` to a
//! `Transport`, which lets tests script the server side.

use futures::future::BoxFuture;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::ApiError;

/// A request relative to the API base URL
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Raw response: status code and body bytes
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as JSON, `Value::Null` if empty or malformed.
    pub fn json_value(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn decode<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// Executes one request. `bearer` is attached as `Authorization: Bearer`.
pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiError>>;
}

/// Production transport over reqwest.
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        url::Url::parse(base_url).map_err(|e| ApiError::Transport {
            path: base_url.to_string(),
            message: format!("invalid base URL: {}", e),
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, request.path);
            tracing::debug!("{} {}", request.method, url);

            let mut builder = self.http.request(request.method.clone(), &url);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(token) = bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            let transport_err = |e: reqwest::Error| ApiError::Transport {
                path: request.path.clone(),
                message: e.to_string(),
            };

            let resp = builder.send().await.map_err(transport_err)?;
            let status = resp.status().as_u16();
            let body = resp.bytes().await.map_err(transport_err)?.to_vec();

            Ok(ApiResponse { status, body })
        })
    }
}
