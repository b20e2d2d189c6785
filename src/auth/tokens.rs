//! Token storage and management

#[cfg(test)]
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Access/refresh pair issued on login and registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Token store trait for different storage backends.
///
/// Stores are shared between the HTTP client and the session manager,
/// so mutation goes through `&self`.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    /// Replace both tokens.
    fn save(&self, pair: &TokenPair) -> anyhow::Result<()>;
    /// Replace only the access token (after a refresh).
    fn set_access_token(&self, token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;

    /// Both tokens, if a full pair is stored.
    fn load(&self) -> Option<TokenPair> {
        Some(TokenPair {
            access: self.access_token()?,
            refresh: self.refresh_token()?,
        })
    }
}

/// Process-local store. Nothing survives a restart.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    access: Mutex<Option<String>>,
    refresh: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(access: &str, refresh: &str) -> Self {
        Self {
            access: Mutex::new(Some(access.to_string())),
            refresh: Mutex::new(Some(refresh.to_string())),
        }
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.access.lock().ok()?.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.refresh.lock().ok()?.clone()
    }

    fn save(&self, pair: &TokenPair) -> anyhow::Result<()> {
        *lock(&self.access)? = Some(pair.access.clone());
        *lock(&self.refresh)? = Some(pair.refresh.clone());
        Ok(())
    }

    fn set_access_token(&self, token: &str) -> anyhow::Result<()> {
        *lock(&self.access)? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *lock(&self.access)? = None;
        *lock(&self.refresh)? = None;
        Ok(())
    }
}

#[cfg(test)]
fn lock<T>(m: &Mutex<T>) -> anyhow::Result<std::sync::MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| anyhow::anyhow!("token store lock poisoned"))
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying it.
///
/// Display only: the server is the sole judge of token validity.
pub fn token_expiry(token: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    chrono::DateTime::from_timestamp(claims.exp?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_pair_lifecycle() {
        let store = MemoryTokenStore::new();
        assert!(store.load().is_none());

        let pair = TokenPair {
            access: "a1".into(),
            refresh: "r1".into(),
        };
        store.save(&pair).unwrap();
        assert_eq!(store.load(), Some(pair));

        store.set_access_token("a2").unwrap();
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));

        store.clear().unwrap();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_token_expiry_from_jwt() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":1700000000,"user_id":3}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", payload);
        let exp = token_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_token_expiry_opaque_token() {
        assert!(token_expiry("not-a-jwt").is_none());
        assert!(token_expiry("a.%%%.c").is_none());
    }
}
