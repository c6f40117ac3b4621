//! Server-side session tracking.
//!
//! `SessionStore` is the pluggable backend contract (memory, DynamoDB,
//! Redis). `SessionManager` owns the lifecycle on top of it and
//! `reconcile` binds a guest session to a user at login.

pub mod cookie;
pub mod dynamodb;
pub mod extract;
pub mod manager;
pub mod memory;
pub mod reconcile;
pub mod redis;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// TTL applied when the caller does not specify one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

pub fn effective_ttl(ttl: Option<Duration>) -> Duration {
    ttl.unwrap_or(DEFAULT_TTL)
}

/// One entry of the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

/// Canonical in-memory shape of a session.
///
/// The logs only ever grow through `push_page` / `push_action`. The one
/// exception is `restore_history`, which runs only when a session is first
/// bound to an identity (login or bearer reconciliation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pages_visited: Vec<String>,
    #[serde(default)]
    actions: Vec<ActionEntry>,
}

impl SessionRecord {
    /// A record with a fresh id and no start time: exists in the store but
    /// reads as `NoActiveSession` until initialized.
    pub fn new() -> Self {
        Self::with_id(generate_session_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identity: None,
            start_time: None,
            pages_visited: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// A fresh, initialized record with empty logs.
    pub fn started(now: DateTime<Utc>) -> Self {
        let mut record = Self::new();
        record.start_time = Some(now);
        record
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn pages_visited(&self) -> &[String] {
        &self.pages_visited
    }

    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    pub fn is_active(&self) -> bool {
        self.start_time.is_some()
    }

    /// Bind the session to a user. Returns `false` (and changes nothing) if
    /// it is already bound to someone else.
    pub fn bind_identity(&mut self, email: &str) -> bool {
        match &self.identity {
            Some(existing) => existing == email,
            None => {
                self.identity = Some(email.to_string());
                true
            }
        }
    }

    pub fn push_page(&mut self, page: impl Into<String>) {
        self.pages_visited.push(page.into());
    }

    pub fn push_action(&mut self, action: ActionEntry) {
        self.actions.push(action);
    }

    pub(crate) fn ensure_started(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
    }

    pub(crate) fn restore_history(
        &mut self,
        start_time: DateTime<Utc>,
        pages_visited: Vec<String>,
        actions: Vec<ActionEntry>,
    ) {
        self.start_time = Some(start_time);
        self.pages_visited = pages_visited;
        self.actions = actions;
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// 32 random bytes, base64url without padding.
pub fn generate_session_id() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Pluggable session storage backend.
///
/// `set` writes the whole record in one operation; a concurrent `get` sees
/// either the old or the new record. Expired entries read as `Ok(None)`.
/// Backend failures are `Err`, never `Ok(None)`.
pub trait SessionStore: Send + Sync {
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Store the record; `ttl = None` means `DEFAULT_TTL`.
    fn set(
        &self,
        id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn destroy(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Push the expiry forward. A missing entry is not an error.
    fn touch(
        &self,
        id: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Store selected at startup.
///
/// `SessionStore` uses RPITIT and is not object-safe, so dispatch is by enum.
pub enum AnyStore {
    Memory(memory::InMemoryStore),
    DynamoDb(dynamodb::DynamoDbStore),
    Redis(redis::RedisStore),
}

impl AnyStore {
    pub fn kind(&self) -> &'static str {
        match self {
            AnyStore::Memory(_) => "memory",
            AnyStore::DynamoDb(_) => "dynamodb",
            AnyStore::Redis(_) => "redis",
        }
    }
}

impl SessionStore for AnyStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.get(id).await,
            AnyStore::DynamoDb(s) => s.get(id).await,
            AnyStore::Redis(s) => s.get(id).await,
        }
    }

    async fn set(
        &self,
        id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.set(id, record, ttl).await,
            AnyStore::DynamoDb(s) => s.set(id, record, ttl).await,
            AnyStore::Redis(s) => s.set(id, record, ttl).await,
        }
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.destroy(id).await,
            AnyStore::DynamoDb(s) => s.destroy(id).await,
            AnyStore::Redis(s) => s.destroy(id).await,
        }
    }

    async fn touch(&self, id: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.touch(id, ttl).await,
            AnyStore::DynamoDb(s) => s.touch(id, ttl).await,
            AnyStore::Redis(s) => s.touch(id, ttl).await,
        }
    }
}

/// Run a store write on its own task and wait for it.
///
/// If the caller's future is dropped (client went away) the write still
/// runs to completion.
pub(crate) async fn run_detached<F, T>(write: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|e| StoreError::Unavailable(format!("write task aborted: {e}")))?
}
