//! Preference resolution: profile store for identified callers, a client
//! cookie for guests.
//!
//! The two paths never mix. An email on the request selects the profile
//! path, and a missing profile is an error rather than a fall back to the
//! cookie.

use crate::error::AppError;
use crate::profile::{Preferences, ProfileStore};

pub const PREFERENCES_COOKIE: &str = "preferences";

/// Where this request's preferences live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceTarget {
    Profile(String),
    Cookie,
}

impl PreferenceTarget {
    /// An absent or empty email means guest.
    pub fn from_hint(email: Option<&str>) -> Self {
        match email.map(str::trim) {
            Some(email) if !email.is_empty() => PreferenceTarget::Profile(email.to_string()),
            _ => PreferenceTarget::Cookie,
        }
    }
}

pub async fn load_from_profile<P: ProfileStore>(
    profiles: &P,
    email: &str,
) -> Result<Preferences, AppError> {
    profiles
        .find(email)
        .await?
        .map(|p| p.preferences)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn save_to_profile<P: ProfileStore>(
    profiles: &P,
    email: &str,
    preferences: &Preferences,
) -> Result<(), AppError> {
    if profiles.update_preferences(email, preferences).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("User not found".into()))
    }
}

/// `Set-Cookie` value holding URL-encoded JSON preferences.
pub fn make_preferences_cookie(preferences: &Preferences, secure: bool) -> Result<String, AppError> {
    let json = serde_json::to_string(preferences)
        .map_err(|e| AppError::Internal(format!("encode preferences: {e}")))?;
    let mut parts = vec![
        format!("{PREFERENCES_COOKIE}={}", urlencoding::encode(&json)),
        "Path=/".to_string(),
        "HttpOnly".to_string(),
        "SameSite=Strict".to_string(),
    ];
    if secure {
        parts.push("Secure".to_string());
    }
    Ok(parts.join("; "))
}

/// Decode a cookie value. Garbage reads as no preferences.
pub fn decode_preferences_cookie(raw: &str) -> Option<Preferences> {
    let json = urlencoding::decode(raw).ok()?;
    serde_json::from_str(&json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::UserProfile;
    use crate::profile::memory::InMemoryProfileStore;
    use crate::session::cookie::parse_cookie;

    fn dark() -> Preferences {
        Preferences {
            theme: "dark".into(),
            ..Preferences::default()
        }
    }

    #[test]
    fn test_target_from_hint() {
        assert_eq!(
            PreferenceTarget::from_hint(Some("u@x.com")),
            PreferenceTarget::Profile("u@x.com".into())
        );
        assert_eq!(PreferenceTarget::from_hint(Some("  ")), PreferenceTarget::Cookie);
        assert_eq!(PreferenceTarget::from_hint(None), PreferenceTarget::Cookie);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = make_preferences_cookie(&dark(), false).unwrap();
        assert!(cookie.starts_with("preferences="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(!cookie.contains("Secure"));
        assert!(make_preferences_cookie(&dark(), true).unwrap().contains("Secure"));
    }

    #[test]
    fn test_cookie_value_decodes() {
        let cookie = make_preferences_cookie(&dark(), false).unwrap();
        let value = parse_cookie(cookie.split(';').next().unwrap(), PREFERENCES_COOKIE).unwrap();
        assert_eq!(decode_preferences_cookie(value), Some(dark()));
    }

    #[test]
    fn test_garbage_cookie_is_none() {
        assert_eq!(decode_preferences_cookie("%7Bnope"), None);
        assert_eq!(decode_preferences_cookie(""), None);
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let store = InMemoryProfileStore::new();
        store
            .insert(&UserProfile::new("u".into(), "u@x.com".into(), "h".into()))
            .await
            .unwrap();

        save_to_profile(&store, "u@x.com", &dark()).await.unwrap();
        assert_eq!(load_from_profile(&store, "u@x.com").await.unwrap(), dark());
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let store = InMemoryProfileStore::new();
        assert!(matches!(
            load_from_profile(&store, "ghost@x.com").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            save_to_profile(&store, "ghost@x.com", &dark()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
