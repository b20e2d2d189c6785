//! Errors surfaced by the HTTP client

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-success HTTP status. `body` is the parsed JSON body, or
    /// `Value::Null` when the body was empty or not JSON.
    #[error("HTTP {status} for {path}")]
    Status {
        status: u16,
        path: String,
        body: Value,
    },

    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("failed to parse response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no refresh token available")]
    NoRefreshToken,

    /// The silent refresh failed; tokens have been cleared.
    #[error("token refresh failed: {0}")]
    Refresh(#[source] Box<ApiError>),

    #[error("token storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-supplied error body, if any.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Status { body, .. } if !body.is_null() => Some(body),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
