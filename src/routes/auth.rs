//! POST /auth/register, POST /auth/login

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::with_session_cookie;
use crate::AppState;
use crate::audit::{self, Activity, Outcome};
use crate::error::{AppError, CredentialFailure};
use crate::profile::{ProfileStore, UserProfile};
use crate::session::SessionRecord;
use crate::session::extract::SessionCookie;
use crate::session::reconcile::reconcile;
use crate::types::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest, parse_body};

pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: RegisterRequest = parse_body(&body)?;
    let email = req.email.trim().to_string();
    if req.username.trim().is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "username, email and password are required".into(),
        ));
    }

    let hasher = state.clone();
    let password = req.password;
    let digest = tokio::task::spawn_blocking(move || hasher.credentials.hash(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let profile = UserProfile::new(req.username.trim().to_string(), email.clone(), digest);
    if !state.profiles.insert(&profile).await? {
        audit::event(
            Activity::Register,
            Outcome::Failure,
            Some(&email),
            None,
            "Email already registered",
        );
        return Err(AppError::Conflict("User already exists".into()));
    }

    audit::event(
        Activity::Register,
        Outcome::Success,
        Some(&email),
        None,
        "User registered",
    );
    Ok((
        StatusCode::CREATED,
        axum::Json(MessageResponse::new("User registered successfully")),
    )
        .into_response())
}

/// Verify credentials, issue a token and reconcile the caller's session.
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: LoginRequest = parse_body(&body)?;
    let email = req.email.trim().to_string();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput("email and password are required".into()));
    }

    let Some(profile) = state.profiles.find(&email).await? else {
        audit::event(Activity::Logon, Outcome::Failure, Some(&email), None, "User not found");
        return Err(AppError::InvalidCredential(CredentialFailure::UserNotFound));
    };

    let verifier = state.clone();
    let password = req.password;
    let digest = profile.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verifier.credentials.verify(&password, &digest))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {e}")))?;
    if !valid {
        audit::event(
            Activity::Logon,
            Outcome::Failure,
            Some(&email),
            None,
            "Password incorrect",
        );
        return Err(AppError::InvalidCredential(CredentialFailure::PasswordIncorrect));
    }

    let token = state
        .credentials
        .issue_token(&profile.email, &profile.username)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // A session bound to someone else is not carried over.
    let current = match state.sessions.resolve(cookie.id()).await? {
        Some(record) if record.identity().is_some_and(|id| id != profile.email) => {
            state.sessions.destroy(record.id()).await?;
            SessionRecord::new()
        }
        Some(record) => record,
        None => SessionRecord::new(),
    };
    let record = reconcile(&state.sessions, &state.profiles, current, &profile).await?;

    audit::event(
        Activity::Logon,
        Outcome::Success,
        Some(&profile.email),
        Some(record.id()),
        "Logged in, session synced",
    );
    Ok(with_session_cookie(
        &state,
        &record,
        LoginResponse {
            token,
            message: "Logged in successfully. Session synced.".into(),
        },
    ))
}
