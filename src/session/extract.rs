//! Session cookie extractor and raw cookie lookup.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::sync::Arc;

use super::cookie::{COOKIE_NAME, parse_cookie, verify_cookie};
use crate::AppState;

/// Verified session id from the signed cookie, if any.
///
/// Missing, unsigned and tampered cookies all come out as `None`.
#[derive(Debug, Clone, Default)]
pub struct SessionCookie(pub Option<String>);

impl SessionCookie {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl FromRequestParts<Arc<AppState>> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let id = cookie_value(&parts.headers, COOKIE_NAME)
            .and_then(|v| verify_cookie(state.config.session_secret.as_bytes(), v));
        Ok(SessionCookie(id))
    }
}

/// Raw value of a named cookie from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| parse_cookie(h, name))
}
