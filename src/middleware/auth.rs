//! Bearer-token extractors.
//!
//! `Authorization: Bearer <jwt>` is checked against the credential
//! service. Session routes accept it optionally, to bind a guest session
//! once or to identify the caller of `/session/user-session`.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use std::convert::Infallible;
use std::sync::Arc;

use crate::AppState;
use crate::credentials::Claims;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verified claims when a valid bearer token is present.
///
/// An invalid token is logged and treated as absent.
#[derive(Debug, Clone, Default)]
pub struct OptionalBearer(pub Option<Claims>);

impl FromRequestParts<Arc<AppState>> for OptionalBearer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(OptionalBearer(None));
        };
        match state.credentials.verify_token(token) {
            Ok(claims) => Ok(OptionalBearer(Some(claims))),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid bearer token");
                Ok(OptionalBearer(None))
            }
        }
    }
}
