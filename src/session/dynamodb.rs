//! DynamoDB session store (document database backend).
//!
//! Table schema:
//! - `session_id` (S): partition key
//! - `data` (S): JSON-encoded `SessionRecord`
//! - `expires_at` (N): Unix millis, checked on every read
//! - `ttl` (N): Unix seconds, for DynamoDB's native expiry sweep
//!
//! DynamoDB deletes expired items lazily (up to days later), so reads must
//! not trust item presence alone.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{SessionRecord, SessionStore, effective_ttl};
use crate::error::StoreError;

pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn key(id: &str) -> AttributeValue {
        AttributeValue::S(id.to_string())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Build the full item written by `set`.
fn session_item(
    id: &str,
    blob: String,
    now_ms: u64,
    ttl: Duration,
) -> HashMap<String, AttributeValue> {
    let expires_at = now_ms + ttl.as_millis() as u64;
    HashMap::from([
        ("session_id".to_string(), AttributeValue::S(id.to_string())),
        ("data".to_string(), AttributeValue::S(blob)),
        ("expires_at".to_string(), AttributeValue::N(expires_at.to_string())),
        (
            "ttl".to_string(),
            AttributeValue::N(expires_at.div_ceil(1000).to_string()),
        ),
    ])
}

/// An item without a readable `expires_at` counts as expired.
fn is_expired(item: &HashMap<String, AttributeValue>, now_ms: u64) -> bool {
    item.get("expires_at")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<u64>().ok())
        .is_none_or(|expires_at| expires_at <= now_ms)
}

impl SessionStore for DynamoDbStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("session_id", Self::key(id))
            .consistent_read(true)
            .send()
            .await
            .map_err(unavailable)?;

        let Some(item) = result.item() else {
            return Ok(None);
        };

        if is_expired(item, now_millis()) {
            return Ok(None);
        }

        let blob = item
            .get("data")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| StoreError::Unavailable(format!("session {id} has no data")))?;
        Ok(Some(serde_json::from_str(blob)?))
    }

    async fn set(
        &self,
        id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(record)?;
        let item = session_item(id, blob, now_millis(), effective_ttl(ttl));

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("session_id", Self::key(id))
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn touch(&self, id: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = now_millis();
        let expires_at = now + effective_ttl(ttl).as_millis() as u64;

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("session_id", Self::key(id))
            .update_expression("SET expires_at = :e, #ttl = :t")
            .condition_expression("attribute_exists(session_id) AND expires_at > :now")
            .expression_attribute_names("#ttl", "ttl")
            .expression_attribute_values(":e", AttributeValue::N(expires_at.to_string()))
            .expression_attribute_values(
                ":t",
                AttributeValue::N(expires_at.div_ceil(1000).to_string()),
            )
            .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    // Missing or already expired
                    Ok(())
                } else {
                    Err(unavailable(service_err))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_item_layout() {
        let item = session_item("sid-1", "{}".into(), 1_000_000, Duration::from_secs(1800));
        assert_eq!(item["session_id"].as_s().unwrap(), "sid-1");
        assert_eq!(item["data"].as_s().unwrap(), "{}");
        assert_eq!(item["expires_at"].as_n().unwrap(), "2800000");
        assert_eq!(item["ttl"].as_n().unwrap(), "2800");
    }

    #[test]
    fn test_ttl_seconds_round_up() {
        let item = session_item("s", "{}".into(), 1_500, Duration::from_millis(1));
        assert_eq!(item["ttl"].as_n().unwrap(), "2");
    }

    #[test]
    fn test_is_expired() {
        let item = session_item("s", "{}".into(), 1_000, Duration::from_secs(1));
        assert!(!is_expired(&item, 1_999));
        assert!(is_expired(&item, 2_000));
        assert!(is_expired(&item, 5_000));
    }

    #[test]
    fn test_missing_expiry_counts_as_expired() {
        let item = HashMap::from([(
            "session_id".to_string(),
            AttributeValue::S("s".into()),
        )]);
        assert!(is_expired(&item, 0));
    }
}
