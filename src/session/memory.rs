//! In-memory session store for development and testing.
//!
//! Uses `DashMap` for concurrent access without external locks. Entries
//! hold the serialized record plus an absolute deadline; expiry is checked
//! lazily on access.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{SessionRecord, SessionStore, effective_ttl};
use crate::error::StoreError;

struct Entry {
    blob: String,
    expires_at: Instant,
}

/// Process-local session store.
///
/// Sessions are lost on restart and not shared across processes.
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held (including expired ones not yet swept).
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl SessionStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let now = Instant::now();
        let blob = match self.entries.get(id) {
            Some(entry) if entry.expires_at > now => entry.blob.clone(),
            Some(entry) => {
                drop(entry); // Release the read lock before removing
                self.entries.remove_if(id, |_, e| e.expires_at <= now);
                return Ok(None);
            }
            None => return Ok(None),
        };

        Ok(Some(serde_json::from_str(&blob)?))
    }

    async fn set(
        &self,
        id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(record)?;
        self.entries.insert(
            id.to_string(),
            Entry {
                blob,
                expires_at: Instant::now() + effective_ttl(ttl),
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.entries.remove(id);
        Ok(())
    }

    async fn touch(&self, id: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(id)
            && entry.expires_at > now
        {
            entry.expires_at = now + effective_ttl(ttl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> SessionRecord {
        let mut r = SessionRecord::with_id(id);
        r.ensure_started(Utc::now());
        r
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();
        let mut r = record("s1");
        r.push_page("/home");

        store.set("s1", &r, None).await.unwrap();
        let loaded = store.get("s1").await.unwrap().unwrap();

        assert_eq!(loaded, r);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = InMemoryStore::new();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy() {
        let store = InMemoryStore::new();
        store.set("s1", &record("s1"), None).await.unwrap();
        assert!(store.get("s1").await.unwrap().is_some());

        store.destroy("s1").await.unwrap();
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy_nonexistent_is_noop() {
        let store = InMemoryStore::new();
        store.destroy("nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = InMemoryStore::new();
        store
            .set("s1", &record("s1"), Some(Duration::from_millis(20)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("s1").await.unwrap().is_none());
        // Expired entry is swept on access
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_touch_extends_expiry() {
        let store = InMemoryStore::new();
        store
            .set("s1", &record("s1"), Some(Duration::from_millis(60)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.touch("s1", Some(Duration::from_secs(60))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.get("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_does_not_revive_expired() {
        let store = InMemoryStore::new();
        store
            .set("s1", &record("s1"), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        store.touch("s1", Some(Duration::from_secs(60))).await.unwrap();
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_record() {
        let store = InMemoryStore::new();
        let mut r = record("s1");
        r.push_page("/a");
        store.set("s1", &r, None).await.unwrap();

        r.push_page("/b");
        store.set("s1", &r, None).await.unwrap();

        let loaded = store.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.pages_visited(), ["/a", "/b"]);
    }

    #[tokio::test]
    async fn test_sessions_isolated() {
        let store = InMemoryStore::new();
        let mut a = record("a");
        a.push_page("/alice");
        let mut b = record("b");
        b.push_page("/bob");

        store.set("a", &a, None).await.unwrap();
        store.set("b", &b, None).await.unwrap();

        store.destroy("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(
            store.get("b").await.unwrap().unwrap().pages_visited(),
            ["/bob"]
        );
    }
}
