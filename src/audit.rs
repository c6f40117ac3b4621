//! Structured audit events for account and session lifecycle.
//!
//! Each event is one JSON line emitted via `tracing` under target `audit`,
//! loosely following the OCSF authentication class layout. Never panics.

use chrono::Utc;
use serde_json::json;

pub const CLASS_ACCOUNT_CHANGE: u32 = 3001;
pub const CLASS_AUTHENTICATION: u32 = 3002;

/// What happened, as OCSF activity id + name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Register,
    Logon,
    Logoff,
    SessionStart,
    SessionBind,
}

impl Activity {
    fn class_uid(self) -> u32 {
        match self {
            Activity::Register => CLASS_ACCOUNT_CHANGE,
            _ => CLASS_AUTHENTICATION,
        }
    }

    fn id(self) -> u32 {
        match self {
            Activity::Register => 1,
            Activity::Logon => 1,
            Activity::Logoff => 2,
            Activity::SessionStart | Activity::SessionBind => 99,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Activity::Register => "Create",
            Activity::Logon => "Logon",
            Activity::Logoff => "Logoff",
            Activity::SessionStart => "Session Start",
            Activity::SessionBind => "Session Bind",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    fn status(self) -> (u32, &'static str, u32) {
        match self {
            Outcome::Success => (1, "Success", 1),
            Outcome::Failure => (2, "Failure", 3),
        }
    }
}

fn build(
    activity: Activity,
    outcome: Outcome,
    user: Option<&str>,
    session_id: Option<&str>,
    message: &str,
) -> serde_json::Value {
    let (status_id, status, severity_id) = outcome.status();
    let mut event = json!({
        "class_uid": activity.class_uid(),
        "activity_id": activity.id(),
        "activity_name": activity.name(),
        "status_id": status_id,
        "status": status,
        "severity_id": severity_id,
        "time": Utc::now().timestamp_millis(),
        "metadata": {
            "product": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        },
        "message": message,
    });
    if let Some(email) = user {
        event["actor"] = json!({ "user": { "email_addr": email, "type": "User" } });
    }
    if let Some(id) = session_id {
        event["session"] = json!({ "uid": id });
    }
    event
}

/// Emit one audit event.
pub fn event(
    activity: Activity,
    outcome: Outcome,
    user: Option<&str>,
    session_id: Option<&str>,
    message: &str,
) {
    let event = build(activity, outcome, user, session_id, message);
    if let Ok(json) = serde_json::to_string(&event) {
        tracing::info!(target: "audit", "{}", json);
    }
}
