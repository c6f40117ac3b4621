//! User profiles: credentials digest, preferences and the durable mirror of
//! session activity.
//!
//! The session subsystem is the only writer of `session_data`. It is
//! created once (first login) and afterwards only grows through pushes.

pub mod dynamodb;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::StoreError;
use crate::session::ActionEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_notifications", alias = "notifications")]
    pub notifications_enabled: bool,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_theme() -> String {
    "light".into()
}

fn default_notifications() -> bool {
    true
}

fn default_language() -> String {
    "en".into()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            notifications_enabled: default_notifications(),
            language: default_language(),
        }
    }
}

/// Persisted copy of an authenticated user's session activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMirror {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub pages_visited: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub session_data: Option<SessionMirror>,
}

impl UserProfile {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            username,
            email,
            password_hash,
            preferences: Preferences::default(),
            session_data: None,
        }
    }
}

/// User-profile persistence, keyed by email.
///
/// Writes against a missing profile are no-ops reported through the
/// return value where the caller needs to know.
pub trait ProfileStore: Send + Sync {
    fn find(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>, StoreError>> + Send;

    /// `Ok(false)` if a profile with this email already exists.
    fn insert(&self, profile: &UserProfile)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// `Ok(false)` if there is no such profile.
    fn update_preferences(
        &self,
        email: &str,
        preferences: &Preferences,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Create `session_data` if it is absent. Never overwrites.
    fn init_session_data(
        &self,
        email: &str,
        mirror: &SessionMirror,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn push_page(&self, email: &str, page: &str)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn push_action(
        &self,
        email: &str,
        action: &ActionEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub enum AnyProfileStore {
    Memory(memory::InMemoryProfileStore),
    DynamoDb(dynamodb::DynamoDbProfileStore),
}

impl ProfileStore for AnyProfileStore {
    async fn find(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        match self {
            AnyProfileStore::Memory(s) => s.find(email).await,
            AnyProfileStore::DynamoDb(s) => s.find(email).await,
        }
    }

    async fn insert(&self, profile: &UserProfile) -> Result<bool, StoreError> {
        match self {
            AnyProfileStore::Memory(s) => s.insert(profile).await,
            AnyProfileStore::DynamoDb(s) => s.insert(profile).await,
        }
    }

    async fn update_preferences(
        &self,
        email: &str,
        preferences: &Preferences,
    ) -> Result<bool, StoreError> {
        match self {
            AnyProfileStore::Memory(s) => s.update_preferences(email, preferences).await,
            AnyProfileStore::DynamoDb(s) => s.update_preferences(email, preferences).await,
        }
    }

    async fn init_session_data(&self, email: &str, mirror: &SessionMirror) -> Result<(), StoreError> {
        match self {
            AnyProfileStore::Memory(s) => s.init_session_data(email, mirror).await,
            AnyProfileStore::DynamoDb(s) => s.init_session_data(email, mirror).await,
        }
    }

    async fn push_page(&self, email: &str, page: &str) -> Result<(), StoreError> {
        match self {
            AnyProfileStore::Memory(s) => s.push_page(email, page).await,
            AnyProfileStore::DynamoDb(s) => s.push_page(email, page).await,
        }
    }

    async fn push_action(&self, email: &str, action: &ActionEntry) -> Result<(), StoreError> {
        match self {
            AnyProfileStore::Memory(s) => s.push_action(email, action).await,
            AnyProfileStore::DynamoDb(s) => s.push_action(email, action).await,
        }
    }
}
