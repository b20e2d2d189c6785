//! User-related models

use serde::{Deserialize, Serialize};

use crate::auth::TokenPair;

/// User profile as returned by `/auth/profile/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

impl User {
    /// Name for display, falling back to the email address.
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.full_name {
            if !name.trim().is_empty() {
                return name.trim().to_string();
            }
        }
        let joined = format!("{} {}", self.first_name, self.last_name);
        if joined.trim().is_empty() {
            self.email.clone()
        } else {
            joined.trim().to_string()
        }
    }
}

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration request body
#[derive(Debug, Clone, Default, Serialize)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Partial profile update; only the set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone_number.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}

/// Body of a successful login or registration
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

/// Body of a successful profile update
#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}
