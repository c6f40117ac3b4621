//! Redis session store (key-value cache backend).
//!
//! Expiry is delegated to Redis: `SET key value PX ttl` on write and
//! `PEXPIRE` on touch. Nothing here tracks deadlines.
//!
//! The connection manager is created eagerly at boot via `connect`. If the
//! server is unreachable then, the failure is logged by the caller and
//! each later operation makes a single connect attempt of its own.

use ::redis::AsyncCommands;
use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{SessionRecord, SessionStore, effective_ttl};
use crate::error::StoreError;

const KEY_PREFIX: &str = "sess:";

pub struct RedisStore {
    client: ::redis::Client,
    conn: OnceCell<ConnectionManager>,
}

fn unavailable(e: ::redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn session_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn ttl_millis(ttl: Option<Duration>) -> u64 {
    // PX 0 is rejected by Redis
    (effective_ttl(ttl).as_millis() as u64).max(1)
}

impl RedisStore {
    /// Parse the URL. Does not touch the network.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    /// Establish the shared connection.
    pub async fn connect(&self) -> Result<(), StoreError> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.conn
            .get_or_try_init(|| async {
                // One attempt; reconnect backoff is the manager's business after that.
                let config = ConnectionManagerConfig::new().set_number_of_retries(0);
                ConnectionManager::new_with_config(self.client.clone(), config)
                    .await
                    .map_err(unavailable)
            })
            .await
            .cloned()
    }
}

impl SessionStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let blob: Option<String> = conn.get(session_key(id)).await.map_err(unavailable)?;
        match blob {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .pset_ex(session_key(id), blob, ttl_millis(ttl))
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(session_key(id)).await.map_err(unavailable)?;
        Ok(())
    }

    async fn touch(&self, id: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        // false when the key is gone; nothing to do then
        let _: bool = conn
            .pexpire(session_key(id), ttl_millis(ttl) as i64)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
