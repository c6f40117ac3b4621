//! Session lifecycle routes: /session, /session/page, /session/action,
//! /session/user-session.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::with_session_cookie;
use crate::AppState;
use crate::audit::{self, Activity, Outcome};
use crate::error::AppError;
use crate::middleware::auth::OptionalBearer;
use crate::profile::ProfileStore;
use crate::session::cookie::make_delete_cookie;
use crate::session::extract::SessionCookie;
use crate::session::manager::PageRequest;
use crate::session::reconcile::bind_bearer;
use crate::session::{ActionEntry, SessionRecord, run_detached};
use crate::types::{
    LogActionRequest, LogPageRequest, MessageResponse, PageQuery, SessionView, parse_body,
    parse_query, required_string,
};

fn session_view(start_time: DateTime<Utc>, pages: &[String], request: PageRequest) -> SessionView {
    SessionView {
        start_time,
        session_duration: (Utc::now() - start_time).num_seconds().max(0),
        total: pages.len(),
        page: request.page,
        limit: request.limit,
        pages_visited: request.slice(pages).to_vec(),
    }
}

/// POST /session: start a fresh session, replacing any current one.
pub async fn init_session(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
    OptionalBearer(claims): OptionalBearer,
) -> Result<Response, AppError> {
    // Bind before initializing so only the identity carries over, never
    // the profile's persisted history.
    let previous = match state.sessions.resolve(cookie.id()).await? {
        Some(record) => Some(record),
        None if claims.is_some() => Some(SessionRecord::new()),
        None => None,
    };
    let previous = match previous {
        Some(record) => {
            Some(bind_bearer(&state.sessions, &state.profiles, record, claims.as_ref()).await?)
        }
        None => None,
    };
    let record = state.sessions.initialize(previous).await?;

    audit::event(
        Activity::SessionStart,
        Outcome::Success,
        record.identity(),
        Some(record.id()),
        "Session initialized",
    );
    Ok(with_session_cookie(
        &state,
        &record,
        MessageResponse::new("Session initialized!"),
    ))
}

/// GET /session?page&limit
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
    OptionalBearer(claims): OptionalBearer,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = parse_query(query)?;
    let request = PageRequest::parse(query.page.as_deref(), query.limit.as_deref())?;

    let record = state.sessions.read(cookie.id()).await?;
    let record = bind_bearer(&state.sessions, &state.profiles, record, claims.as_ref()).await?;
    let start_time = record.start_time().ok_or(AppError::NoActiveSession)?;

    let view = session_view(start_time, record.pages_visited(), request);
    Ok(with_session_cookie(&state, &record, view))
}

/// POST /session/page `{page}`
pub async fn log_page(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
    OptionalBearer(claims): OptionalBearer,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: LogPageRequest = parse_body(&body)?;
    let page = required_string(req.page, "Invalid 'page' parameter.")?;

    let record = state.sessions.resolve_or_new(cookie.id()).await?;
    let record = bind_bearer(&state.sessions, &state.profiles, record, claims.as_ref()).await?;
    let record = state.sessions.append_page(record, page.clone()).await?;

    if let Some(email) = record.identity() {
        let profiles = state.profiles.clone();
        let email = email.to_string();
        let mirrored = page.clone();
        run_detached(async move { profiles.push_page(&email, &mirrored).await }).await?;
    }

    tracing::debug!(session_id = %record.id(), page = %page, "page logged");
    Ok(with_session_cookie(
        &state,
        &record,
        MessageResponse::new(format!("Page '{page}' added to session.")),
    ))
}

/// POST /session/action `{action}`
pub async fn log_action(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
    OptionalBearer(claims): OptionalBearer,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: LogActionRequest = parse_body(&body)?;
    let label = required_string(req.action, "Invalid 'action' parameter.")?;
    let entry = ActionEntry {
        label: label.clone(),
        timestamp: Utc::now(),
    };

    let record = state.sessions.resolve_or_new(cookie.id()).await?;
    let record = bind_bearer(&state.sessions, &state.profiles, record, claims.as_ref()).await?;
    let record = state.sessions.append_action(record, entry.clone()).await?;

    if let Some(email) = record.identity() {
        let profiles = state.profiles.clone();
        let email = email.to_string();
        run_detached(async move { profiles.push_action(&email, &entry).await }).await?;
    }

    Ok(with_session_cookie(
        &state,
        &record,
        MessageResponse::new(format!("Action '{label}' added to session.")),
    ))
}

/// DELETE /session
pub async fn destroy_session(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
) -> Result<Response, AppError> {
    if let Some(id) = cookie.id() {
        state.sessions.destroy(id).await?;
        audit::event(
            Activity::Logoff,
            Outcome::Success,
            None,
            Some(id),
            "Session destroyed",
        );
    }

    let clear = make_delete_cookie(state.config.production);
    Ok((
        [(header::SET_COOKIE, clear)],
        axum::Json(MessageResponse::new("Session destroyed.")),
    )
        .into_response())
}

/// GET /session/user-session?page&limit
///
/// Reads the profile's persisted mirror, not the live session. The caller
/// is identified by bearer token, or by a session already bound at login.
pub async fn user_session(
    State(state): State<Arc<AppState>>,
    cookie: SessionCookie,
    OptionalBearer(claims): OptionalBearer,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<axum::Json<SessionView>, AppError> {
    let query = parse_query(query)?;
    let request = PageRequest::parse(query.page.as_deref(), query.limit.as_deref())?;

    let email = match claims {
        Some(claims) => claims.sub,
        None => state
            .sessions
            .resolve(cookie.id())
            .await?
            .and_then(|r| r.identity().map(str::to_string))
            .ok_or_else(|| AppError::Unauthorized("Access denied".into()))?,
    };

    let profile = state
        .profiles
        .find(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let mirror = profile
        .session_data
        .ok_or_else(|| AppError::NotFound("No session data for user".into()))?;

    Ok(axum::Json(session_view(
        mirror.start_time,
        &mirror.pages_visited,
        request,
    )))
}
