//! Human-readable messages from server error bodies
//!
//! Error bodies carry messages under field names (`{"email": ["..."]}`,
//! `{"detail": "..."}`). Each flow lists the extractors it trusts, in
//! priority order, and falls back to a fixed message.

use serde_json::Value;

use super::ApiError;

pub type Extractor = fn(&Value) -> Option<String>;

pub const LOGIN: &[Extractor] = &[non_field_errors, detail];
pub const REGISTER: &[Extractor] = &[email, password, password_confirm];
pub const PROFILE: &[Extractor] = &[non_field_errors, detail];
pub const ORDER: &[Extractor] = &[error, detail];

/// First message found by `extractors`, or `fallback`.
pub fn resolve(err: &ApiError, extractors: &[Extractor], fallback: &str) -> String {
    err.body()
        .and_then(|body| extractors.iter().find_map(|extract| extract(body)))
        .unwrap_or_else(|| fallback.to_string())
}

/// A field holding either a string or a list whose first entry is a string.
pub fn field_message(body: &Value, field: &str) -> Option<String> {
    let text = match body.get(field)? {
        Value::String(s) => s.as_str(),
        Value::Array(items) => items.first()?.as_str()?,
        _ => return None,
    };
    (!text.is_empty()).then(|| text.to_string())
}

fn non_field_errors(body: &Value) -> Option<String> {
    field_message(body, "non_field_errors")
}

fn detail(body: &Value) -> Option<String> {
    field_message(body, "detail")
}

fn email(body: &Value) -> Option<String> {
    field_message(body, "email")
}

fn password(body: &Value) -> Option<String> {
    field_message(body, "password")
}

fn password_confirm(body: &Value) -> Option<String> {
    field_message(body, "password_confirm")
}

fn error(body: &Value) -> Option<String> {
    field_message(body, "error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(body: Value) -> ApiError {
        ApiError::Status {
            status: 400,
            path: "/x/".into(),
            body,
        }
    }

    #[test]
    fn test_priority_order() {
        let err = status(json!({
            "password_confirm": ["Password confirmation doesn't match password."],
            "password": ["This password is too short."],
        }));
        assert_eq!(
            resolve(&err, REGISTER, "Registration failed"),
            "This password is too short."
        );
    }

    #[test]
    fn test_string_and_list_fields() {
        let err = status(json!({"detail": "No active account"}));
        assert_eq!(resolve(&err, LOGIN, "Login failed"), "No active account");

        let err = status(json!({"non_field_errors": ["Invalid email or password."]}));
        assert_eq!(
            resolve(&err, LOGIN, "Login failed"),
            "Invalid email or password."
        );
    }

    #[test]
    fn test_fallback() {
        let err = status(json!({"email": []}));
        assert_eq!(resolve(&err, REGISTER, "Registration failed"), "Registration failed");

        let err = ApiError::Transport {
            path: "/auth/login/".into(),
            message: "connection refused".into(),
        };
        assert_eq!(resolve(&err, LOGIN, "Login failed"), "Login failed");
    }
}
