//! In-memory profile store for development and testing.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{Preferences, ProfileStore, SessionMirror, UserProfile};
use crate::error::StoreError;
use crate::session::ActionEntry;

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, UserProfile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for InMemoryProfileStore {
    async fn find(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.get(email).map(|p| p.value().clone()))
    }

    async fn insert(&self, profile: &UserProfile) -> Result<bool, StoreError> {
        match self.profiles.entry(profile.email.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(true)
            }
        }
    }

    async fn update_preferences(
        &self,
        email: &str,
        preferences: &Preferences,
    ) -> Result<bool, StoreError> {
        Ok(match self.profiles.get_mut(email) {
            Some(mut profile) => {
                profile.preferences = preferences.clone();
                true
            }
            None => false,
        })
    }

    async fn init_session_data(&self, email: &str, mirror: &SessionMirror) -> Result<(), StoreError> {
        if let Some(mut profile) = self.profiles.get_mut(email)
            && profile.session_data.is_none()
        {
            profile.session_data = Some(mirror.clone());
        }
        Ok(())
    }

    async fn push_page(&self, email: &str, page: &str) -> Result<(), StoreError> {
        if let Some(mut profile) = self.profiles.get_mut(email)
            && let Some(mirror) = profile.session_data.as_mut()
        {
            mirror.pages_visited.push(page.to_string());
        }
        Ok(())
    }

    async fn push_action(&self, email: &str, action: &ActionEntry) -> Result<(), StoreError> {
        if let Some(mut profile) = self.profiles.get_mut(email)
            && let Some(mirror) = profile.session_data.as_mut()
        {
            mirror.actions.push(action.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(email: &str) -> UserProfile {
        UserProfile::new("user".into(), email.into(), "digest".into())
    }

    fn mirror(pages: &[&str]) -> SessionMirror {
        SessionMirror {
            start_time: Utc::now(),
            pages_visited: pages.iter().map(|p| p.to_string()).collect(),
            actions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryProfileStore::new();
        assert!(store.insert(&profile("a@x.com")).await.unwrap());
        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
        assert!(store.find("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryProfileStore::new();
        assert!(store.insert(&profile("a@x.com")).await.unwrap());
        assert!(!store.insert(&profile("a@x.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_preferences() {
        let store = InMemoryProfileStore::new();
        store.insert(&profile("a@x.com")).await.unwrap();

        let prefs = Preferences {
            theme: "dark".into(),
            ..Preferences::default()
        };
        assert!(store.update_preferences("a@x.com", &prefs).await.unwrap());
        assert!(!store.update_preferences("nobody@x.com", &prefs).await.unwrap());

        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.preferences.theme, "dark");
    }

    #[tokio::test]
    async fn test_init_session_data_never_overwrites() {
        let store = InMemoryProfileStore::new();
        store.insert(&profile("a@x.com")).await.unwrap();

        store.init_session_data("a@x.com", &mirror(&["a", "b"])).await.unwrap();
        store.init_session_data("a@x.com", &mirror(&["x"])).await.unwrap();

        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.session_data.unwrap().pages_visited, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_push_appends() {
        let store = InMemoryProfileStore::new();
        store.insert(&profile("a@x.com")).await.unwrap();
        store.init_session_data("a@x.com", &mirror(&["a"])).await.unwrap();

        store.push_page("a@x.com", "b").await.unwrap();
        store.push_page("a@x.com", "b").await.unwrap();
        store
            .push_action(
                "a@x.com",
                &ActionEntry {
                    label: "click".into(),
                    timestamp: Utc::now(),
                },
            )
            .await
            .unwrap();

        let data = store.find("a@x.com").await.unwrap().unwrap().session_data.unwrap();
        assert_eq!(data.pages_visited, ["a", "b", "b"]);
        assert_eq!(data.actions.len(), 1);
    }

    #[tokio::test]
    async fn test_push_without_mirror_is_noop() {
        let store = InMemoryProfileStore::new();
        store.insert(&profile("a@x.com")).await.unwrap();
        store.push_page("a@x.com", "b").await.unwrap();
        store.push_page("missing@x.com", "b").await.unwrap();

        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert!(found.session_data.is_none());
    }
}
