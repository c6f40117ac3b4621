//! Shared request/response DTOs.

use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::profile::Preferences;

/// Parse a JSON request body. An empty body reads as `{}`.
///
/// Used instead of the `Json` extractor so malformed bodies come back as
/// `InvalidInput` JSON rather than a plain-text rejection.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"{}")
            .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {e}")));
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {e}")))
}

/// Unwrap a `Query` extraction, reporting failure as `InvalidInput`.
pub fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| AppError::InvalidInput(e.body_text()))
}

/// A required, non-empty string field that may arrive as any JSON value.
pub fn required_string(value: Option<serde_json::Value>, error: &str) -> Result<String, AppError> {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(AppError::InvalidInput(error.to_string())),
    }
}

/// POST /session/page request body.
#[derive(Debug, Default, Deserialize)]
pub struct LogPageRequest {
    #[serde(default)]
    pub page: Option<serde_json::Value>,
}

/// POST /session/action request body.
#[derive(Debug, Default, Deserialize)]
pub struct LogActionRequest {
    #[serde(default)]
    pub action: Option<serde_json::Value>,
}

/// `?page=&limit=` on the session read endpoints. Validated later.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// POST /preferences request body.
#[derive(Debug, Deserialize)]
pub struct SavePreferencesRequest {
    #[serde(flatten)]
    pub preferences: Preferences,
    #[serde(default)]
    pub email: Option<String>,
}

/// Identity hint for GET /preferences, from query or body.
#[derive(Debug, Default, Deserialize)]
pub struct EmailHint {
    #[serde(default)]
    pub email: Option<String>,
}

/// POST /auth/register request body.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/login request body.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One page of a session's (or a profile mirror's) page log.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub start_time: DateTime<Utc>,
    /// Whole seconds since `start_time`.
    pub session_duration: i64,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages_visited: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub preferences: Preferences,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub message: String,
}

/// GET /health response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub session_backend: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_body_is_empty_object() {
        let req: LogPageRequest = parse_body(&Bytes::new()).unwrap();
        assert!(req.page.is_none());
    }

    #[test]
    fn test_malformed_body_is_invalid_input() {
        let err = parse_body::<LogPageRequest>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_required_string() {
        let msg = "Invalid 'page' parameter.";
        assert_eq!(required_string(Some(json!("/home")), msg).unwrap(), "/home");
        assert!(required_string(None, msg).is_err());
        assert!(required_string(Some(json!(5)), msg).is_err());
        assert!(required_string(Some(json!("")), msg).is_err());
    }

    #[test]
    fn test_save_preferences_request_defaults_and_email() {
        let req: SavePreferencesRequest =
            serde_json::from_value(json!({"theme": "dark", "email": "u@x.com"})).unwrap();
        assert_eq!(req.preferences.theme, "dark");
        assert_eq!(req.preferences.language, "en");
        assert_eq!(req.email.as_deref(), Some("u@x.com"));
    }

    #[test]
    fn test_session_view_serialization() {
        let view = SessionView {
            start_time: DateTime::from_timestamp(0, 0).unwrap(),
            session_duration: 12,
            total: 3,
            page: 1,
            limit: 2,
            pages_visited: vec!["/a".into(), "/b".into()],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["sessionDuration"], 12);
        assert_eq!(json["pagesVisited"][1], "/b");
        assert!(json.get("startTime").is_some());
    }

    #[test]
    fn test_preferences_response_skips_missing_message() {
        let resp = PreferencesResponse {
            message: None,
            preferences: Preferences::default(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("message").is_none());
        assert_eq!(json["preferences"]["theme"], "light");
    }
}
