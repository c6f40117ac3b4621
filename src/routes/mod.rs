//! HTTP route handlers.

pub mod auth;
pub mod health;
pub mod preferences;
pub mod session;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::AppState;
use crate::session::SessionRecord;
use crate::session::cookie::make_set_cookie;

/// JSON body plus a refreshed session cookie for `record`.
pub(crate) fn with_session_cookie<T: Serialize>(
    state: &AppState,
    record: &SessionRecord,
    body: T,
) -> Response {
    let cookie = make_set_cookie(
        &state.config.session_secret,
        record.id(),
        state.sessions.max_age(),
        state.config.production,
    );
    ([(header::SET_COOKIE, cookie)], axum::Json(body)).into_response()
}
