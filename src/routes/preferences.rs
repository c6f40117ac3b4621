//! POST /preferences, GET /preferences

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::AppState;
use crate::error::AppError;
use crate::preferences::{
    PREFERENCES_COOKIE, PreferenceTarget, decode_preferences_cookie, load_from_profile,
    make_preferences_cookie, save_to_profile,
};
use crate::session::extract::cookie_value;
use crate::types::{EmailHint, PreferencesResponse, SavePreferencesRequest, parse_body, parse_query};

pub async fn save_preferences(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: SavePreferencesRequest = parse_body(&body)?;

    match PreferenceTarget::from_hint(req.email.as_deref()) {
        PreferenceTarget::Profile(email) => {
            save_to_profile(state.profiles.as_ref(), &email, &req.preferences).await?;
            Ok(axum::Json(PreferencesResponse {
                message: Some("Preferences saved successfully".into()),
                preferences: req.preferences,
            })
            .into_response())
        }
        PreferenceTarget::Cookie => {
            let cookie = make_preferences_cookie(&req.preferences, state.config.production)?;
            Ok((
                [(header::SET_COOKIE, cookie)],
                axum::Json(PreferencesResponse {
                    message: Some("Preferences saved in cookies".into()),
                    preferences: req.preferences,
                }),
            )
                .into_response())
        }
    }
}

/// The email hint may come from the query string or a JSON body.
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<EmailHint>, QueryRejection>,
    body: Bytes,
) -> Result<axum::Json<PreferencesResponse>, AppError> {
    let from_query = parse_query(query)?.email;
    let email = match from_query {
        Some(email) => Some(email),
        None => parse_body::<EmailHint>(&body)?.email,
    };

    let preferences = match PreferenceTarget::from_hint(email.as_deref()) {
        PreferenceTarget::Profile(email) => load_from_profile(state.profiles.as_ref(), &email).await?,
        PreferenceTarget::Cookie => cookie_value(&headers, PREFERENCES_COOKIE)
            .and_then(decode_preferences_cookie)
            .ok_or_else(|| AppError::NotFound("No preferences found in cookies".into()))?,
    };

    Ok(axum::Json(PreferencesResponse {
        message: None,
        preferences,
    }))
}
