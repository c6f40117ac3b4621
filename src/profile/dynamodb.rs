//! DynamoDB profile store.
//!
//! One item per user, partition key `email` (S). Preferences and the
//! session mirror are native maps so pushes can use `list_append` instead
//! of a read-modify-write of the whole item.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{Preferences, ProfileStore, SessionMirror, UserProfile};
use crate::error::StoreError;
use crate::session::ActionEntry;

type Item = HashMap<String, AttributeValue>;

pub struct DynamoDbProfileStore {
    client: Client,
    table_name: String,
}

impl DynamoDbProfileStore {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn key(email: &str) -> AttributeValue {
        AttributeValue::S(email.to_string())
    }

    /// Append one element to a list inside `session_data`, if the mirror exists.
    async fn append_to_mirror(
        &self,
        email: &str,
        field: &str,
        value: AttributeValue,
    ) -> Result<(), StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("email", Self::key(email))
            .update_expression("SET session_data.#f = list_append(session_data.#f, :v)")
            .condition_expression("attribute_exists(session_data)")
            .expression_attribute_names("#f", field)
            .expression_attribute_values(":v", AttributeValue::L(vec![value]))
            .send()
            .await
            .map_err(|e| e.into_service_error());
        condition_held(result).map(|_| ())
    }
}

/// Collapse a conditional-check failure into `Ok(false)`.
fn condition_held<R, E>(result: Result<R, E>) -> Result<bool, StoreError>
where
    E: ConditionalError + std::fmt::Display,
{
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_condition_failure() => Ok(false),
        Err(e) => Err(unavailable(e)),
    }
}

/// Service errors that can report a failed `ConditionExpression`.
trait ConditionalError {
    fn is_condition_failure(&self) -> bool;
}

impl ConditionalError for aws_sdk_dynamodb::operation::put_item::PutItemError {
    fn is_condition_failure(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

impl ConditionalError for aws_sdk_dynamodb::operation::update_item::UpdateItemError {
    fn is_condition_failure(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn malformed(field: &str) -> StoreError {
    StoreError::Unavailable(format!("malformed profile item: {field}"))
}

fn preferences_attr(prefs: &Preferences) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        ("theme".to_string(), AttributeValue::S(prefs.theme.clone())),
        (
            "notifications_enabled".to_string(),
            AttributeValue::Bool(prefs.notifications_enabled),
        ),
        ("language".to_string(), AttributeValue::S(prefs.language.clone())),
    ]))
}

fn action_attr(action: &ActionEntry) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        ("label".to_string(), AttributeValue::S(action.label.clone())),
        (
            "timestamp".to_string(),
            AttributeValue::S(action.timestamp.to_rfc3339()),
        ),
    ]))
}

fn mirror_attr(mirror: &SessionMirror) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        (
            "start_time".to_string(),
            AttributeValue::S(mirror.start_time.to_rfc3339()),
        ),
        (
            "pages_visited".to_string(),
            AttributeValue::L(
                mirror
                    .pages_visited
                    .iter()
                    .map(|p| AttributeValue::S(p.clone()))
                    .collect(),
            ),
        ),
        (
            "actions".to_string(),
            AttributeValue::L(mirror.actions.iter().map(action_attr).collect()),
        ),
    ]))
}

fn profile_to_item(profile: &UserProfile) -> Item {
    let mut item = HashMap::from([
        ("email".to_string(), AttributeValue::S(profile.email.clone())),
        ("username".to_string(), AttributeValue::S(profile.username.clone())),
        (
            "password_hash".to_string(),
            AttributeValue::S(profile.password_hash.clone()),
        ),
        ("preferences".to_string(), preferences_attr(&profile.preferences)),
    ]);
    if let Some(mirror) = &profile.session_data {
        item.insert("session_data".to_string(), mirror_attr(mirror));
    }
    item
}

fn string_field(map: &Item, field: &str) -> Result<String, StoreError> {
    map.get(field)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| malformed(field))
}

fn timestamp_field(map: &Item, field: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw = string_field(map, field)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| malformed(field))
}

fn preferences_from_attr(value: Option<&AttributeValue>) -> Preferences {
    let defaults = Preferences::default();
    let Some(map) = value.and_then(|v| v.as_m().ok()) else {
        return defaults;
    };
    Preferences {
        theme: string_field(map, "theme").unwrap_or(defaults.theme),
        notifications_enabled: map
            .get("notifications_enabled")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(defaults.notifications_enabled),
        language: string_field(map, "language").unwrap_or(defaults.language),
    }
}

fn mirror_from_attr(value: &AttributeValue) -> Result<SessionMirror, StoreError> {
    let map = value.as_m().map_err(|_| malformed("session_data"))?;

    let pages_visited = match map.get("pages_visited") {
        Some(v) => v
            .as_l()
            .map_err(|_| malformed("pages_visited"))?
            .iter()
            .map(|p| p.as_s().cloned().map_err(|_| malformed("pages_visited")))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let actions = match map.get("actions") {
        Some(v) => v
            .as_l()
            .map_err(|_| malformed("actions"))?
            .iter()
            .map(|a| {
                let entry = a.as_m().map_err(|_| malformed("actions"))?;
                Ok(ActionEntry {
                    label: string_field(entry, "label")?,
                    timestamp: timestamp_field(entry, "timestamp")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?,
        None => Vec::new(),
    };

    Ok(SessionMirror {
        start_time: timestamp_field(map, "start_time")?,
        pages_visited,
        actions,
    })
}

fn profile_from_item(item: &Item) -> Result<UserProfile, StoreError> {
    Ok(UserProfile {
        username: string_field(item, "username")?,
        email: string_field(item, "email")?,
        password_hash: string_field(item, "password_hash")?,
        preferences: preferences_from_attr(item.get("preferences")),
        session_data: item.get("session_data").map(mirror_from_attr).transpose()?,
    })
}

impl ProfileStore for DynamoDbProfileStore {
    async fn find(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("email", Self::key(email))
            .consistent_read(true)
            .send()
            .await
            .map_err(unavailable)?;

        result.item().map(profile_from_item).transpose()
    }

    async fn insert(&self, profile: &UserProfile) -> Result<bool, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(profile_to_item(profile)))
            .condition_expression("attribute_not_exists(email)")
            .send()
            .await
            .map_err(|e| e.into_service_error());
        condition_held(result)
    }

    async fn update_preferences(
        &self,
        email: &str,
        preferences: &Preferences,
    ) -> Result<bool, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("email", Self::key(email))
            .update_expression("SET preferences = :p")
            .condition_expression("attribute_exists(email)")
            .expression_attribute_values(":p", preferences_attr(preferences))
            .send()
            .await
            .map_err(|e| e.into_service_error());
        condition_held(result)
    }

    async fn init_session_data(&self, email: &str, mirror: &SessionMirror) -> Result<(), StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("email", Self::key(email))
            .update_expression("SET session_data = :s")
            .condition_expression("attribute_exists(email) AND attribute_not_exists(session_data)")
            .expression_attribute_values(":s", mirror_attr(mirror))
            .send()
            .await
            .map_err(|e| e.into_service_error());
        condition_held(result).map(|_| ())
    }

    async fn push_page(&self, email: &str, page: &str) -> Result<(), StoreError> {
        self.append_to_mirror(email, "pages_visited", AttributeValue::S(page.to_string()))
            .await
    }

    async fn push_action(&self, email: &str, action: &ActionEntry) -> Result<(), StoreError> {
        self.append_to_mirror(email, "actions", action_attr(action))
            .await
    }
}
