//! Authentication and profile endpoints (`/auth/...`)

use super::transport::ApiRequest;
use super::{ApiClient, ApiError};
use crate::models::{
    AuthResponse, Credentials, ProfileResponse, ProfileUpdate, Registration, User,
};

impl ApiClient {
    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.send_json(ApiRequest::post("/auth/register/").json(registration)?)
            .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.send_json(ApiRequest::post("/auth/login/").json(credentials)?)
            .await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.send_json(ApiRequest::get("/auth/profile/")).await
    }

    pub async fn update_profile(&self, changes: &ProfileUpdate) -> Result<User, ApiError> {
        let resp: ProfileResponse = self
            .send_json(ApiRequest::patch("/auth/profile/").json(changes)?)
            .await?;
        Ok(resp.user)
    }
}
