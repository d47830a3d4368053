use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::model::{Role, Topic};
use crate::store;

/// Built-in catalogue: (id, name, order_index). All visible by default.
pub const DEFAULT_TOPICS: &[(&str, &str, i64)] = &[
    ("basic-variables", "Basic Variables", 1),
    ("basic-functions", "Basic Functions", 2),
    ("strings", "Strings", 3),
    ("conditionals", "Conditionals", 4),
    ("loops", "Loops", 5),
    ("lists", "Lists", 6),
    ("tuples", "Tuples", 7),
    ("dictionaries", "Dictionaries", 8),
    ("errors", "Errors & Exceptions", 9),
];

pub fn validate_topic_id(id: &str) -> ServiceResult<()> {
    if id.is_empty() {
        return Err(ServiceError::validation("topic id is required"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ServiceError::validation(format!(
            "topic id must use lowercase letters, digits, '-' or '_': {id}"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("topic name is required"));
    }
    Ok(name.to_string())
}

/// Instructors see every topic, everyone else only visible ones.
pub fn list_topics(conn: &Connection, role: Role) -> ServiceResult<Vec<Topic>> {
    Ok(store::topics::list(conn, role != Role::Instructor)?)
}

pub fn get_topic(conn: &Connection, topic_id: &str) -> ServiceResult<Topic> {
    super::require_topic(conn, topic_id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTopic {
    pub id: String,
    pub name: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub order_index: Option<i64>,
}

fn default_visible() -> bool {
    true
}

pub fn create_topic(conn: &Connection, new: &NewTopic) -> ServiceResult<Topic> {
    let id = new.id.trim();
    validate_topic_id(id)?;
    let name = validate_name(&new.name)?;
    let order_index = match new.order_index {
        Some(v) => v,
        None => store::topics::next_order_index(conn)?,
    };
    match store::topics::insert(conn, id, &name, new.is_visible, order_index) {
        Ok(topic) => {
            info!(topic_id = %topic.id, "topic created");
            Ok(topic)
        }
        Err(e) if is_unique_violation(&e) => {
            Err(ServiceError::conflict(format!("topic {id} already exists")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Typed partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_visible: Option<bool>,
    #[serde(default)]
    pub order_index: Option<i64>,
}

pub fn update_topic(conn: &Connection, topic_id: &str, patch: &TopicPatch) -> ServiceResult<Topic> {
    let mut topic = super::require_topic(conn, topic_id)?;
    if let Some(name) = patch.name.as_deref() {
        topic.name = validate_name(name)?;
    }
    if let Some(v) = patch.is_visible {
        topic.is_visible = v;
    }
    if let Some(v) = patch.order_index {
        topic.order_index = v;
    }
    store::topics::save(conn, &topic)?;
    info!(topic_id = %topic.id, "topic updated");
    Ok(topic)
}

pub fn set_visibility(conn: &Connection, topic_id: &str, is_visible: bool) -> ServiceResult<Topic> {
    update_topic(
        conn,
        topic_id,
        &TopicPatch {
            is_visible: Some(is_visible),
            ..TopicPatch::default()
        },
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub refreshed: usize,
}

/// Insert missing catalogue topics; existing ones get their name and order
/// refreshed but keep their visibility.
pub fn seed_defaults(conn: &Connection) -> ServiceResult<SeedSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = SeedSummary::default();
    for (id, name, order_index) in DEFAULT_TOPICS {
        match store::topics::get_by_id(&tx, id)? {
            Some(mut topic) => {
                topic.name = name.to_string();
                topic.order_index = *order_index;
                store::topics::save(&tx, &topic)?;
                summary.refreshed += 1;
            }
            None => {
                store::topics::insert(&tx, id, name, true, *order_index)?;
                summary.inserted += 1;
            }
        }
    }
    tx.commit()?;
    info!(
        inserted = summary.inserted,
        refreshed = summary.refreshed,
        "seeded default topics"
    );
    Ok(summary)
}
