//! Login reconciliation: bind a session to a user and settle whose
//! history wins.
//!
//! Precedence is by source, not a union: if the profile already carries a
//! persisted mirror, its start time and logs replace whatever the guest
//! session accumulated. The session's own history is used only when the
//! profile has none yet (first login), and is then written to the profile.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::manager::SessionManager;
use super::{SessionRecord, SessionStore, run_detached};
use crate::audit::{self, Activity, Outcome};
use crate::credentials::Claims;
use crate::error::AppError;
use crate::profile::{ProfileStore, SessionMirror, UserProfile};

/// Apply the precedence rule to `record` in place.
///
/// Returns the mirror to create on the profile when it had none.
pub fn merge_history(
    record: &mut SessionRecord,
    persisted: Option<&SessionMirror>,
    now: DateTime<Utc>,
) -> Option<SessionMirror> {
    match persisted {
        Some(mirror) => {
            record.restore_history(
                mirror.start_time,
                mirror.pages_visited.clone(),
                mirror.actions.clone(),
            );
            None
        }
        None => {
            record.ensure_started(now);
            Some(SessionMirror {
                start_time: record.start_time().unwrap_or(now),
                pages_visited: record.pages_visited().to_vec(),
                actions: record.actions().to_vec(),
            })
        }
    }
}

/// Bind `record` to `profile`'s user, merge, and persist to both stores.
///
/// A record already bound to this user is returned untouched: the merge
/// runs once per session. The caller handles records bound to someone else.
pub async fn reconcile<S, P>(
    sessions: &SessionManager<S>,
    profiles: &Arc<P>,
    mut record: SessionRecord,
    profile: &UserProfile,
) -> Result<SessionRecord, AppError>
where
    S: SessionStore + 'static,
    P: ProfileStore + 'static,
{
    if record.identity() == Some(profile.email.as_str()) {
        return Ok(record);
    }
    if !record.bind_identity(&profile.email) {
        return Err(AppError::Internal(format!(
            "session {} is bound to another user",
            record.id()
        )));
    }

    let new_mirror = merge_history(&mut record, profile.session_data.as_ref(), Utc::now());

    sessions.save(&record).await?;
    if let Some(mirror) = new_mirror {
        let profiles = profiles.clone();
        let email = profile.email.clone();
        run_detached(async move { profiles.init_session_data(&email, &mirror).await }).await?;
    }

    audit::event(
        Activity::SessionBind,
        Outcome::Success,
        Some(&profile.email),
        Some(record.id()),
        "Session bound to user",
    );
    Ok(record)
}

/// Bind a guest session from a verified bearer token, once.
///
/// Without claims, with an already-bound session, or when the token's
/// user has no profile, the record comes back unchanged.
pub async fn bind_bearer<S, P>(
    sessions: &SessionManager<S>,
    profiles: &Arc<P>,
    record: SessionRecord,
    claims: Option<&Claims>,
) -> Result<SessionRecord, AppError>
where
    S: SessionStore + 'static,
    P: ProfileStore + 'static,
{
    let Some(claims) = claims else {
        return Ok(record);
    };

    match record.identity() {
        Some(email) if email == claims.sub => return Ok(record),
        Some(email) => {
            tracing::warn!(
                session_id = %record.id(),
                bound = %email,
                token_user = %claims.sub,
                "bearer token does not match session identity; ignoring token"
            );
            return Ok(record);
        }
        None => {}
    }

    match profiles.find(&claims.sub).await? {
        Some(profile) => reconcile(sessions, profiles, record, &profile).await,
        None => {
            tracing::warn!(user = %claims.sub, "valid token for unknown profile");
            Ok(record)
        }
    }
}
