//! Session manager
//!
//! Owns the `Session` record. The authenticated flag is derived from the
//! presence of a user, so the two can never disagree.

use std::sync::Arc;

use super::TokenPair;
use crate::api::{messages, ApiClient, ApiError};
use crate::models::{Credentials, ProfileUpdate, Registration, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Loading,
    Authenticated,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    user: Option<User>,
    is_loading: bool,
    error: Option<String>,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_loading {
            SessionStatus::Loading
        } else if self.user.is_some() {
            SessionStatus::Authenticated
        } else if self.error.is_some() {
            SessionStatus::Error
        } else {
            SessionStatus::Anonymous
        }
    }
}

/// Failed login, registration or profile update, with a displayable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

pub struct SessionManager {
    api: Arc<ApiClient>,
    session: Session,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Restore the session from a persisted access token, if any.
    pub async fn bootstrap(&mut self) {
        if self.api.tokens().access_token().is_none() {
            tracing::debug!("No stored access token, starting anonymous");
            return;
        }

        self.session.is_loading = true;
        match self.api.current_user().await {
            Ok(user) => {
                tracing::info!("Session restored for {}", user.email);
                self.session.user = Some(user);
            }
            Err(e) if e.is_unauthorized() => {
                tracing::info!("Stored session has expired");
                self.clear_tokens();
                self.session.user = None;
            }
            Err(e) => {
                tracing::warn!("Stored session could not be restored: {}", e);
                self.clear_tokens();
                self.session.user = None;
            }
        }
        self.session.is_loading = false;
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        self.session.is_loading = true;
        let result = self.api.login(credentials).await;
        self.session.is_loading = false;

        let resp = result.map_err(|e| self.fail(&e, messages::LOGIN, "Login failed"))?;
        self.establish(resp.user, &resp.tokens, "Login failed")
    }

    pub async fn register(&mut self, registration: &Registration) -> Result<(), AuthError> {
        self.session.is_loading = true;
        let result = self.api.register(registration).await;
        self.session.is_loading = false;

        let resp =
            result.map_err(|e| self.fail(&e, messages::REGISTER, "Registration failed"))?;
        self.establish(resp.user, &resp.tokens, "Registration failed")
    }

    /// Drop the session locally. The server is not consulted.
    pub fn logout(&mut self) {
        self.clear_tokens();
        self.session = Session::default();
        tracing::info!("Logged out");
    }

    /// Reset after the HTTP client gave up on refreshing. Tokens are
    /// already gone at this point.
    pub fn expire(&mut self) {
        tracing::warn!("Session expired, please log in again");
        self.session = Session::default();
    }

    pub async fn update_profile(&mut self, changes: &ProfileUpdate) -> Result<(), AuthError> {
        let result = self.api.update_profile(changes).await;
        let user =
            result.map_err(|e| self.fail(&e, messages::PROFILE, "Failed to update profile"))?;
        self.session.user = Some(user);
        self.session.error = None;
        Ok(())
    }

    fn establish(
        &mut self,
        user: User,
        tokens: &TokenPair,
        fallback: &str,
    ) -> Result<(), AuthError> {
        if let Err(e) = self.api.tokens().save(tokens) {
            tracing::error!("Failed to persist tokens: {:#}", e);
            return Err(self.fail(&ApiError::Storage(e), &[], fallback));
        }
        tracing::info!("Authenticated as {}", user.email);
        self.session.user = Some(user);
        self.session.error = None;
        Ok(())
    }

    fn fail(
        &mut self,
        err: &ApiError,
        extractors: &[messages::Extractor],
        fallback: &str,
    ) -> AuthError {
        tracing::debug!("Authentication request failed: {}", err);
        let message = messages::resolve(err, extractors, fallback);
        self.session.error = Some(message.clone());
        AuthError { message }
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.api.tokens().clear() {
            tracing::error!("Failed to clear tokens: {:#}", e);
        }
    }
}
