//! Session lifecycle: creation, activity logging, paginated reads,
//! expiry observation and destruction.
//!
//! Records are passed in and handed back by value; every persistence step
//! is an explicit `set` on the store. Store failures are converted to
//! `AppError` here and go no further.
//!
//! Concurrent requests on the same session are not serialized: each does
//! read-modify-write of the whole record, so the last write wins.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::{ActionEntry, SessionRecord, SessionStore, effective_ttl, run_detached};
use crate::error::AppError;

pub const DEFAULT_PAGE_LIMIT: usize = 10;

pub struct SessionManager<S> {
    store: Arc<S>,
    ttl: Option<Duration>,
}

impl<S: SessionStore + 'static> SessionManager<S> {
    pub fn new(store: Arc<S>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Max-age applied to every write, also used for the cookie.
    pub fn max_age(&self) -> Duration {
        effective_ttl(self.ttl)
    }

    /// Look up a session. Missing, expired or never-issued ids are `None`.
    pub async fn resolve(&self, id: Option<&str>) -> Result<Option<SessionRecord>, AppError> {
        match id {
            Some(id) => Ok(self.store.get(id).await?),
            None => Ok(None),
        }
    }

    /// The caller's session, or a fresh uninitialized record if there is none.
    pub async fn resolve_or_new(&self, id: Option<&str>) -> Result<SessionRecord, AppError> {
        Ok(self.resolve(id).await?.unwrap_or_default())
    }

    /// Start a new session: fresh id, `start_time = now`, empty logs.
    ///
    /// Any previous session is destroyed; its identity binding carries over.
    pub async fn initialize(&self, previous: Option<SessionRecord>) -> Result<SessionRecord, AppError> {
        let mut record = SessionRecord::started(Utc::now());
        if let Some(previous) = previous {
            if let Some(email) = previous.identity() {
                record.bind_identity(email);
            }
            self.destroy(previous.id()).await?;
        }
        self.save(&record).await?;
        tracing::info!(session_id = %record.id(), "session initialized");
        Ok(record)
    }

    /// Read an active session, sliding its expiry forward.
    pub async fn read(&self, id: Option<&str>) -> Result<SessionRecord, AppError> {
        let record = self
            .resolve(id)
            .await?
            .filter(SessionRecord::is_active)
            .ok_or(AppError::NoActiveSession)?;
        self.store.touch(record.id(), self.ttl).await?;
        Ok(record)
    }

    /// Append a page. Duplicates are kept.
    pub async fn append_page(
        &self,
        mut record: SessionRecord,
        page: String,
    ) -> Result<SessionRecord, AppError> {
        record.push_page(page);
        self.save(&record).await?;
        Ok(record)
    }

    pub async fn append_action(
        &self,
        mut record: SessionRecord,
        action: ActionEntry,
    ) -> Result<SessionRecord, AppError> {
        record.push_action(action);
        self.save(&record).await?;
        Ok(record)
    }

    /// Write the whole record back. Completes even if the request is dropped.
    pub async fn save(&self, record: &SessionRecord) -> Result<(), AppError> {
        let store = self.store.clone();
        let record = record.clone();
        let ttl = self.ttl;
        run_detached(async move { store.set(record.id(), &record, ttl).await }).await?;
        Ok(())
    }

    /// Remove the session. Later access with the same id is Uninitialized.
    pub async fn destroy(&self, id: &str) -> Result<(), AppError> {
        let store = self.store.clone();
        let id = id.to_string();
        run_detached(async move { store.destroy(&id).await }).await?;
        Ok(())
    }
}

/// Validated `page` / `limit` query pair, both 1-based and at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            page: parse_positive("page", page, 1)?,
            limit: parse_positive("limit", limit, DEFAULT_PAGE_LIMIT)?,
        })
    }

    /// The `[(page-1)*limit, page*limit)` slice; empty when out of range.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page - 1).saturating_mul(self.limit);
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

fn parse_positive(name: &str, raw: Option<&str>, default: usize) -> Result<usize, AppError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(AppError::InvalidInput(format!(
                "'{name}' must be a positive integer."
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::InMemoryStore;

    fn manager() -> SessionManager<InMemoryStore> {
        SessionManager::new(Arc::new(InMemoryStore::new()), None)
    }

    #[tokio::test]
    async fn test_read_uninitialized_is_no_active_session() {
        let m = manager();
        assert!(matches!(m.read(None).await, Err(AppError::NoActiveSession)));
        assert!(matches!(
            m.read(Some("never-issued")).await,
            Err(AppError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_initialize_then_read() {
        let m = manager();
        let record = m.initialize(None).await.unwrap();
        let read = m.read(Some(record.id())).await.unwrap();
        assert_eq!(read, record);
        assert!(read.start_time().is_some());
        assert!(read.pages_visited().is_empty());
    }

    #[tokio::test]
    async fn test_record_without_start_time_reads_as_no_active_session() {
        let m = manager();
        let record = m.resolve_or_new(None).await.unwrap();
        let record = m.append_page(record, "/home".into()).await.unwrap();
        assert!(matches!(
            m.read(Some(record.id())).await,
            Err(AppError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_append_persists_in_order_with_duplicates() {
        let m = manager();
        let record = m.initialize(None).await.unwrap();
        let record = m.append_page(record, "/a".into()).await.unwrap();
        let record = m.append_page(record, "/b".into()).await.unwrap();
        let record = m.append_page(record, "/a".into()).await.unwrap();

        let read = m.read(Some(record.id())).await.unwrap();
        assert_eq!(read.pages_visited(), ["/a", "/b", "/a"]);
    }

    #[tokio::test]
    async fn test_append_action() {
        let m = manager();
        let record = m.initialize(None).await.unwrap();
        let action = ActionEntry {
            label: "clicked-buy".into(),
            timestamp: Utc::now(),
        };
        let record = m.append_action(record, action.clone()).await.unwrap();
        let read = m.read(Some(record.id())).await.unwrap();
        assert_eq!(read.actions(), [action]);
    }

    #[tokio::test]
    async fn test_destroy_then_read() {
        let m = manager();
        let record = m.initialize(None).await.unwrap();
        m.destroy(record.id()).await.unwrap();
        assert!(matches!(
            m.read(Some(record.id())).await,
            Err(AppError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_reinitialize_replaces_session_and_keeps_identity() {
        let m = manager();
        let mut first = m.initialize(None).await.unwrap();
        first.bind_identity("u@x.com");
        let first = m.append_page(first, "/old".into()).await.unwrap();

        let second = m.initialize(Some(first.clone())).await.unwrap();
        assert_ne!(second.id(), first.id());
        assert_eq!(second.identity(), Some("u@x.com"));
        assert!(second.pages_visited().is_empty());
        assert!(m.resolve(Some(first.id())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry_reads_as_uninitialized() {
        let m = SessionManager::new(
            Arc::new(InMemoryStore::new()),
            Some(Duration::from_millis(30)),
        );
        let record = m.initialize(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(matches!(
            m.read(Some(record.id())).await,
            Err(AppError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_read_slides_expiry() {
        let m = SessionManager::new(
            Arc::new(InMemoryStore::new()),
            Some(Duration::from_millis(80)),
        );
        let record = m.initialize(None).await.unwrap();
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            m.read(Some(record.id())).await.unwrap();
        }
    }

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::parse(None, None).unwrap();
        assert_eq!(req, PageRequest { page: 1, limit: 10 });
    }

    #[test]
    fn test_page_request_rejects_zero_and_garbage() {
        assert!(PageRequest::parse(Some("0"), None).is_err());
        assert!(PageRequest::parse(None, Some("0")).is_err());
        assert!(PageRequest::parse(Some("-1"), None).is_err());
        assert!(PageRequest::parse(Some("two"), None).is_err());
    }

    #[test]
    fn test_slice_covers_all_items_once() {
        let items: Vec<u32> = (0..23).collect();
        let limit = 5;
        let mut seen = Vec::new();
        let mut non_empty = 0;
        for page in 1..=10 {
            let chunk = PageRequest { page, limit }.slice(&items);
            if !chunk.is_empty() {
                non_empty += 1;
            }
            seen.extend_from_slice(chunk);
        }
        assert_eq!(non_empty, items.len().div_ceil(limit));
        assert_eq!(seen, items);
    }

    #[test]
    fn test_slice_out_of_range_is_empty() {
        let items = ["a", "b"];
        assert!(PageRequest { page: 2, limit: 2 }.slice(&items).is_empty());
        assert!(
            PageRequest {
                page: usize::MAX,
                limit: usize::MAX
            }
            .slice(&items)
            .is_empty()
        );
    }
}
